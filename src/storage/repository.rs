use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::domain::{
    Account, AccountId, Cents, Customer, CustomerId, EntryKind, LedgerEntry,
};

use super::StoreError;

// ========================
// Customer operations
// ========================

/// Typed access to customer rows.
pub struct CustomerRepository;

impl CustomerRepository {
    /// Insert a new customer. A single-row write, atomic on its own.
    pub async fn insert(pool: &SqlitePool, name: &str) -> Result<Customer, StoreError> {
        let created_at = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO customers (name, created_at)
            VALUES (?, ?)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(created_at.to_rfc3339())
        .fetch_one(pool)
        .await?;

        Ok(Customer {
            id: row.get("id"),
            name: name.to_string(),
            created_at,
        })
    }

    /// Get a customer by id.
    pub async fn find(pool: &SqlitePool, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query("SELECT id, name, created_at FROM customers WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row_to_customer(&row)?)),
            None => Ok(None),
        }
    }

    /// List all customers in id order.
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Customer>, StoreError> {
        let rows = sqlx::query("SELECT id, name, created_at FROM customers ORDER BY id")
            .fetch_all(pool)
            .await?;

        rows.iter().map(row_to_customer).collect()
    }
}

// ========================
// Account operations
// ========================

/// Typed read access to account rows. All writes go through a `Session`,
/// which is where the row locks live.
pub struct AccountRepository;

impl AccountRepository {
    /// Get an account by id without taking its write lock.
    pub async fn find(pool: &SqlitePool, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            "SELECT id, customer_id, balance, created_at FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// List all accounts in id order.
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, customer_id, balance, created_at FROM accounts ORDER BY id",
        )
        .fetch_all(pool)
        .await?;

        rows.iter().map(row_to_account).collect()
    }

    /// List one customer's accounts in id order.
    pub async fn by_customer(
        pool: &SqlitePool,
        customer_id: CustomerId,
    ) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, customer_id, balance, created_at
            FROM accounts
            WHERE customer_id = ?
            ORDER BY id
            "#,
        )
        .bind(customer_id)
        .fetch_all(pool)
        .await?;

        rows.iter().map(row_to_account).collect()
    }
}

// ========================
// Ledger entry operations
// ========================

/// Read access to the append-only transaction log. Appending happens
/// through a `Session` so each entry shares its transfer's transaction.
pub struct TransactionLog;

impl TransactionLog {
    /// All entries for one account in append (id) order. An unknown
    /// account yields an empty list.
    pub async fn by_account(
        pool: &SqlitePool,
        account_id: AccountId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, amount, kind, created_at
            FROM entries
            WHERE account_id = ?
            ORDER BY id
            "#,
        )
        .bind(account_id)
        .fetch_all(pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    /// Number of entries recorded for one account.
    pub async fn count_for_account(
        pool: &SqlitePool,
        account_id: AccountId,
    ) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) as count FROM entries WHERE account_id = ?")
            .bind(account_id)
            .fetch_one(pool)
            .await?
            .get("count");
        Ok(count)
    }

    /// Timestamp of the most recent entry for one account, if any.
    pub async fn last_activity(
        pool: &SqlitePool,
        account_id: AccountId,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let last: Option<String> =
            sqlx::query("SELECT MAX(created_at) as last FROM entries WHERE account_id = ?")
                .bind(account_id)
                .fetch_one(pool)
                .await?
                .get("last");

        last.map(|s| parse_timestamp(&s)).transpose()
    }
}

// ========================
// Integrity statistics
// ========================

/// Raw row statistics behind the integrity report.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub customer_count: i64,
    pub account_count: i64,
    pub entry_count: i64,
    pub drifted_accounts: Vec<AccountId>,
    pub negative_accounts: Vec<AccountId>,
    pub transfer_imbalance: Cents,
    pub orphan_entries: i64,
    pub zero_amount_entries: i64,
}

impl IntegrityStats {
    /// Gather statistics for integrity checking.
    pub async fn collect(pool: &SqlitePool) -> Result<Self, StoreError> {
        let customer_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM customers")
            .fetch_one(pool)
            .await?
            .get("count");

        let account_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM accounts")
            .fetch_one(pool)
            .await?
            .get("count");

        let entry_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM entries")
            .fetch_one(pool)
            .await?
            .get("count");

        // Accounts whose stored balance disagrees with their replayed ledger
        let drifted_rows = sqlx::query(
            r#"
            SELECT a.id as id
            FROM accounts a
            LEFT JOIN entries e ON e.account_id = a.id
            GROUP BY a.id
            HAVING a.balance != COALESCE(SUM(e.amount), 0)
            ORDER BY a.id
            "#,
        )
        .fetch_all(pool)
        .await?;
        let drifted_accounts = drifted_rows.iter().map(|row| row.get("id")).collect();

        let negative_rows = sqlx::query("SELECT id FROM accounts WHERE balance < 0 ORDER BY id")
            .fetch_all(pool)
            .await?;
        let negative_accounts = negative_rows.iter().map(|row| row.get("id")).collect();

        // Every committed transfer writes an additive-inverse pair
        let transfer_imbalance: i64 = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) as net FROM entries WHERE kind = 'TRANSFER'",
        )
        .fetch_one(pool)
        .await?
        .get("net");

        // Check for entries referencing a missing account
        let orphan_entries: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM entries e
            WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = e.account_id)
            "#,
        )
        .fetch_one(pool)
        .await?
        .get("count");

        let zero_amount_entries: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM entries WHERE amount = 0")
                .fetch_one(pool)
                .await?
                .get("count");

        Ok(IntegrityStats {
            customer_count,
            account_count,
            entry_count,
            drifted_accounts,
            negative_accounts,
            transfer_imbalance,
            orphan_entries,
            zero_amount_entries,
        })
    }
}

// ========================
// Row mapping
// ========================

pub(crate) fn row_to_customer(row: &SqliteRow) -> Result<Customer, StoreError> {
    let created_at: String = row.get("created_at");
    Ok(Customer {
        id: row.get("id"),
        name: row.get("name"),
        created_at: parse_timestamp(&created_at)?,
    })
}

pub(crate) fn row_to_account(row: &SqliteRow) -> Result<Account, StoreError> {
    let created_at: String = row.get("created_at");
    Ok(Account {
        id: row.get("id"),
        customer_id: row.get("customer_id"),
        balance: row.get("balance"),
        created_at: parse_timestamp(&created_at)?,
    })
}

pub(crate) fn row_to_entry(row: &SqliteRow) -> Result<LedgerEntry, StoreError> {
    let kind: String = row.get("kind");
    let created_at: String = row.get("created_at");
    Ok(LedgerEntry {
        id: row.get("id"),
        account_id: row.get("account_id"),
        amount: row.get("amount"),
        kind: EntryKind::from_str(&kind)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown entry kind: {kind}")))?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StoreError::InvalidData(format!("invalid timestamp '{value}': {err}")))
}
