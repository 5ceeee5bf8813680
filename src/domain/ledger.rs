use super::{AccountId, Cents, EntryKind, LedgerEntry};

/// Replay an account's ledger entries into a balance.
/// For a healthy ledger this equals the stored balance: the seeding deposit
/// plus every signed transfer entry.
pub fn replay_balance(entries: &[LedgerEntry]) -> Cents {
    entries.iter().map(|entry| entry.amount).sum()
}

/// Check that two entries form a valid double-entry transfer pair:
/// both TRANSFER kind, additive-inverse amounts, distinct accounts.
pub fn is_transfer_pair(debit: &LedgerEntry, credit: &LedgerEntry) -> bool {
    debit.kind == EntryKind::Transfer
        && credit.kind == EntryKind::Transfer
        && debit.amount < 0
        && debit.amount == -credit.amount
        && debit.account_id != credit.account_id
}

/// Result of verifying the ledger invariants against the live database.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub customer_count: i64,
    pub account_count: i64,
    pub entry_count: i64,
    /// Accounts whose stored balance differs from their replayed ledger.
    pub drifted_accounts: Vec<AccountId>,
    /// Accounts with a negative committed balance.
    pub negative_accounts: Vec<AccountId>,
    /// Net sum of all TRANSFER entries; zero when every pair is complete.
    pub transfer_imbalance: Cents,
    pub orphan_entries: i64,
    pub zero_amount_entries: i64,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues().is_empty()
    }

    /// Human-readable descriptions of every violated invariant.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.drifted_accounts.is_empty() {
            issues.push(format!(
                "{} account(s) whose balance does not match their ledger: {:?}",
                self.drifted_accounts.len(),
                self.drifted_accounts
            ));
        }
        if !self.negative_accounts.is_empty() {
            issues.push(format!(
                "{} account(s) with a negative balance: {:?}",
                self.negative_accounts.len(),
                self.negative_accounts
            ));
        }
        if self.transfer_imbalance != 0 {
            issues.push(format!(
                "transfer entries do not sum to zero (net {})",
                self.transfer_imbalance
            ));
        }
        if self.orphan_entries > 0 {
            issues.push(format!(
                "{} entry(ies) referencing a missing account",
                self.orphan_entries
            ));
        }
        if self.zero_amount_entries > 0 {
            issues.push(format!(
                "{} entry(ies) with a zero amount",
                self.zero_amount_entries
            ));
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn make_entry(account_id: AccountId, amount: Cents, kind: EntryKind) -> LedgerEntry {
        LedgerEntry {
            id: 1,
            account_id,
            amount,
            kind,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_replay_balance_empty() {
        assert_eq!(replay_balance(&[]), 0);
    }

    #[test]
    fn test_replay_balance_deposit_and_transfers() {
        let entries = vec![
            make_entry(1, 10_000, EntryKind::Deposit),
            make_entry(1, -2_500, EntryKind::Transfer),
            make_entry(1, 1_000, EntryKind::Transfer),
        ];
        assert_eq!(replay_balance(&entries), 8_500);
    }

    #[test]
    fn test_transfer_pair_valid() {
        let debit = make_entry(1, -500, EntryKind::Transfer);
        let credit = make_entry(2, 500, EntryKind::Transfer);
        assert!(is_transfer_pair(&debit, &credit));
    }

    #[test]
    fn test_transfer_pair_rejects_mismatched_amounts() {
        let debit = make_entry(1, -500, EntryKind::Transfer);
        let credit = make_entry(2, 400, EntryKind::Transfer);
        assert!(!is_transfer_pair(&debit, &credit));
    }

    #[test]
    fn test_transfer_pair_rejects_same_account() {
        let debit = make_entry(1, -500, EntryKind::Transfer);
        let credit = make_entry(1, 500, EntryKind::Transfer);
        assert!(!is_transfer_pair(&debit, &credit));
    }

    #[test]
    fn test_transfer_pair_rejects_deposits() {
        let debit = make_entry(1, -500, EntryKind::Deposit);
        let credit = make_entry(2, 500, EntryKind::Transfer);
        assert!(!is_transfer_pair(&debit, &credit));
    }

    #[test]
    fn test_report_clean() {
        let report = IntegrityReport {
            customer_count: 2,
            account_count: 3,
            entry_count: 7,
            drifted_accounts: vec![],
            negative_accounts: vec![],
            transfer_imbalance: 0,
            orphan_entries: 0,
            zero_amount_entries: 0,
        };
        assert!(report.is_clean());
        assert!(report.issues().is_empty());
    }

    #[test]
    fn test_report_flags_drift_and_imbalance() {
        let report = IntegrityReport {
            customer_count: 1,
            account_count: 2,
            entry_count: 3,
            drifted_accounts: vec![2],
            negative_accounts: vec![],
            transfer_imbalance: -500,
            orphan_entries: 0,
            zero_amount_entries: 0,
        };
        assert!(!report.is_clean());
        assert_eq!(report.issues().len(), 2);
    }
}
