use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, CustomerId};

/// Identifier assigned by the store on insert.
pub type AccountId = i64;

/// An account row: a balance in minor currency units owned by one customer.
/// The balance is only ever mutated inside a committed ledger transaction,
/// while the account's write lock is held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub customer_id: CustomerId,
    pub balance: Cents,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Whether the current balance covers a debit of `amount`.
    pub fn has_funds(&self, amount: Cents) -> bool {
        self.balance >= amount
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn make_account(balance: Cents) -> Account {
        Account {
            id: 1,
            customer_id: 1,
            balance,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_has_funds() {
        let account = make_account(500);
        assert!(account.has_funds(500));
        assert!(account.has_funds(499));
        assert!(!account.has_funds(501));
    }

    #[test]
    fn test_has_funds_zero_balance() {
        let account = make_account(0);
        assert!(account.has_funds(0));
        assert!(!account.has_funds(1));
    }
}
