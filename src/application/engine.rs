use crate::domain::{Account, AccountId, Cents, CustomerId, EntryKind, LedgerEntry};
use crate::storage::{AccountRepository, LedgerStore, Session};

use super::AppError;

/// Policy for choosing the source account in owned-accounts transfers.
/// The "first encountered" behavior is a selection strategy, not an
/// ordering guarantee, so it is explicit and swappable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceSelection {
    /// First account in ascending id order whose balance covers the amount.
    #[default]
    FirstSufficient,
    /// Qualifying account with the largest balance (ties broken by id).
    LargestBalance,
}

impl SourceSelection {
    /// Qualifying source candidates in the order this policy tries them.
    /// The destination account is never a candidate.
    fn candidates(&self, accounts: &[Account], amount: Cents, to_id: AccountId) -> Vec<AccountId> {
        let mut qualifying: Vec<&Account> = accounts
            .iter()
            .filter(|account| account.id != to_id && account.has_funds(amount))
            .collect();

        if matches!(self, SourceSelection::LargestBalance) {
            qualifying.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.id.cmp(&b.id)));
        }

        qualifying.iter().map(|account| account.id).collect()
    }
}

/// The double-entry pair recorded by a committed transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub debit: LedgerEntry,
    pub credit: LedgerEntry,
}

/// Orchestrates money movement between accounts. Each call owns one
/// session for its full lifetime; nothing is shared across in-flight
/// transfers except the store itself.
pub struct TransferEngine {
    store: LedgerStore,
    selection: SourceSelection,
}

impl TransferEngine {
    pub fn new(store: LedgerStore) -> Self {
        Self {
            store,
            selection: SourceSelection::default(),
        }
    }

    pub fn with_selection(mut self, selection: SourceSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Move `amount` from one account to another as a single atomic
    /// ledger transaction.
    ///
    /// Write locks are taken in ascending id order regardless of which
    /// account pays, the source balance is re-checked under its lock, both
    /// rows are persisted, and the double-entry pair is appended before
    /// commit. The session is released on every path.
    pub async fn transfer(
        &self,
        from_id: AccountId,
        to_id: AccountId,
        amount: Cents,
    ) -> Result<TransferReceipt, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidArgument(format!(
                "transfer amount must be positive, got {amount}"
            )));
        }
        if from_id == to_id {
            return Err(AppError::InvalidArgument(format!(
                "cannot transfer from account {from_id} to itself"
            )));
        }

        let mut session = self.store.begin().await.map_err(AppError::TransferFailed)?;
        match Self::locked_transfer(&mut session, from_id, to_id, amount).await {
            Ok(receipt) => {
                session.commit().await.map_err(AppError::TransferFailed)?;
                tracing::info!(from_id, to_id, amount, "transfer committed");
                Ok(receipt)
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed after transfer error");
                }
                Err(err)
            }
        }
    }

    /// Owned-accounts variant: pick the source among one customer's
    /// accounts per the configured selection policy, then run the locked
    /// transfer into `to_id`, which must belong to the same customer.
    ///
    /// A candidate that loses its funding between snapshot and lock is
    /// skipped. No qualifying source, for any reason, reports the same
    /// absence: the caller cannot tell "no such account" from
    /// "insufficient funds everywhere".
    pub async fn transfer_between_owned(
        &self,
        customer_id: CustomerId,
        to_id: AccountId,
        amount: Cents,
    ) -> Result<TransferReceipt, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidArgument(format!(
                "transfer amount must be positive, got {amount}"
            )));
        }

        let owned = AccountRepository::by_customer(self.store.pool(), customer_id)
            .await
            .map_err(AppError::TransferFailed)?;

        if !owned.iter().any(|account| account.id == to_id) {
            return Err(AppError::AccountNotFound(format!(
                "{to_id} (no such account owned by customer {customer_id})"
            )));
        }

        for from_id in self.selection.candidates(&owned, amount, to_id) {
            match self.transfer(from_id, to_id, amount).await {
                Err(AppError::InsufficientFunds { .. }) => continue,
                outcome => return outcome,
            }
        }

        Err(AppError::AccountNotFound(format!(
            "no account of customer {customer_id} with balance covering {amount}"
        )))
    }

    /// Lock both rows in ascending id order, re-check funds under the
    /// lock, mutate, persist, and append the entry pair. Commit or
    /// rollback stays with the caller.
    async fn locked_transfer(
        session: &mut Session,
        from_id: AccountId,
        to_id: AccountId,
        amount: Cents,
    ) -> Result<TransferReceipt, AppError> {
        let (first, second) = if from_id < to_id {
            (from_id, to_id)
        } else {
            (to_id, from_id)
        };

        let first_account = session
            .lock_account(first)
            .await
            .map_err(AppError::TransferFailed)?
            .ok_or_else(|| AppError::AccountNotFound(first.to_string()))?;
        let second_account = session
            .lock_account(second)
            .await
            .map_err(AppError::TransferFailed)?
            .ok_or_else(|| AppError::AccountNotFound(second.to_string()))?;

        let (mut from_account, mut to_account) = if first == from_id {
            (first_account, second_account)
        } else {
            (second_account, first_account)
        };

        if !from_account.has_funds(amount) {
            return Err(AppError::InsufficientFunds {
                account_id: from_id,
                balance: from_account.balance,
                required: amount,
            });
        }

        from_account.balance -= amount;
        to_account.balance += amount;

        session
            .update_balance(from_account.id, from_account.balance)
            .await
            .map_err(AppError::TransferFailed)?;
        session
            .update_balance(to_account.id, to_account.balance)
            .await
            .map_err(AppError::TransferFailed)?;

        let debit = session
            .append_entry(from_id, -amount, EntryKind::Transfer)
            .await
            .map_err(AppError::TransferFailed)?;
        let credit = session
            .append_entry(to_id, amount, EntryKind::Transfer)
            .await
            .map_err(AppError::TransferFailed)?;

        Ok(TransferReceipt { debit, credit })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn make_account(id: AccountId, balance: Cents) -> Account {
        Account {
            id,
            customer_id: 1,
            balance,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_first_sufficient_takes_id_order() {
        let accounts = vec![
            make_account(3, 1_000),
            make_account(5, 5_000),
            make_account(9, 2_000),
        ];
        let picked = SourceSelection::FirstSufficient.candidates(&accounts, 1_500, 9);
        assert_eq!(picked, vec![5]);

        let picked = SourceSelection::FirstSufficient.candidates(&accounts, 500, 9);
        assert_eq!(picked, vec![3, 5]);
    }

    #[test]
    fn test_largest_balance_reorders() {
        let accounts = vec![
            make_account(3, 1_000),
            make_account(5, 5_000),
            make_account(9, 2_000),
        ];
        let picked = SourceSelection::LargestBalance.candidates(&accounts, 500, 1);
        assert_eq!(picked, vec![5, 9, 3]);
    }

    #[test]
    fn test_destination_never_selected() {
        let accounts = vec![make_account(3, 5_000), make_account(5, 100)];
        let picked = SourceSelection::FirstSufficient.candidates(&accounts, 1_000, 3);
        assert!(picked.is_empty());
    }
}
