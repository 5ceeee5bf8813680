use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Cents};

pub type EntryId = i64;

/// Kind of a ledger entry, stored as its uppercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryKind {
    /// Seeding entry written once at account creation.
    Deposit,
    /// One half of a double-entry transfer pair.
    Transfer,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "DEPOSIT",
            EntryKind::Transfer => "TRANSFER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DEPOSIT" => Some(EntryKind::Deposit),
            "TRANSFER" => Some(EntryKind::Transfer),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable ledger entry: a signed balance movement on one account.
/// Negative amounts are debits, positive amounts are credits. Entries are
/// append-only; no update or delete path exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub amount: Cents,
    pub kind: EntryKind,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }

    pub fn is_credit(&self) -> bool {
        self.amount > 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn make_entry(amount: Cents, kind: EntryKind) -> LedgerEntry {
        LedgerEntry {
            id: 1,
            account_id: 1,
            amount,
            kind,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_entry_kind_roundtrip() {
        for kind in [EntryKind::Deposit, EntryKind::Transfer] {
            let s = kind.as_str();
            let parsed = EntryKind::from_str(s).unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_entry_kind_unknown() {
        assert_eq!(EntryKind::from_str("WITHDRAWAL"), None);
        assert_eq!(EntryKind::from_str("deposit"), None);
        assert_eq!(EntryKind::from_str(""), None);
    }

    #[test]
    fn test_debit_credit_signs() {
        assert!(make_entry(-500, EntryKind::Transfer).is_debit());
        assert!(make_entry(500, EntryKind::Transfer).is_credit());
        assert!(!make_entry(500, EntryKind::Deposit).is_debit());
    }
}
