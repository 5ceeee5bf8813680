use std::time::Duration;

use chrono::Utc;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use thiserror::Error;

use crate::domain::{Account, AccountId, Cents, CustomerId, EntryKind, LedgerEntry};

use super::locks::{AccountLockGuard, AccountLocks};
use super::repository::row_to_account;
use super::MIGRATION_001_INITIAL;

/// Errors surfaced by the ledger store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("write lock not held for account {0}")]
    LockNotHeld(AccountId),

    #[error("session already finished")]
    SessionFinished,

    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

/// Durable storage for customers, accounts, and ledger entries: a SQLite
/// pool plus the per-account write-lock registry. Clones share both, so
/// every session created from any clone observes the same row locks.
#[derive(Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
    locks: AccountLocks,
}

impl LedgerStore {
    /// Open an existing database at the given path.
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        let options = Self::connect_options(path);
        Self::open(options).await
    }

    /// Open (creating if missing) a database at the given path and run
    /// migrations.
    pub async fn init(path: &str) -> Result<Self, StoreError> {
        let options = Self::connect_options(path).create_if_missing(true);
        let store = Self::open(options).await?;
        store.migrate().await?;
        Ok(store)
    }

    fn connect_options(path: &str) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true)
    }

    async fn open(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;
        tracing::debug!("ledger store connected");
        Ok(Self {
            pool,
            locks: AccountLocks::new(),
        })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(MIGRATION_001_INITIAL).execute(&self.pool).await?;
        Ok(())
    }

    /// Pool handle for plain, lock-free reads.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a logical transaction. The session owns one pooled connection
    /// until commit or rollback; the store transaction itself opens lazily
    /// at the session's first write, after row locks have been taken.
    pub async fn begin(&self) -> Result<Session, StoreError> {
        let conn = self.pool.acquire().await?;
        Ok(Session {
            conn: Some(conn),
            locks: self.locks.clone(),
            guards: Vec::new(),
            in_tx: false,
        })
    }
}

/// A unit of work: one pooled connection, the row locks acquired through
/// it, and at most one store transaction. Write locks are acquired before
/// the first store write, which keeps the store's single-writer slot the
/// last resource any session waits on.
///
/// Commit and rollback consume the session, releasing every row lock and
/// returning the connection to the pool. A dropped session closes its
/// connection instead, discarding any open transaction.
pub struct Session {
    conn: Option<PoolConnection<Sqlite>>,
    locks: AccountLocks,
    guards: Vec<AccountLockGuard>,
    in_tx: bool,
}

impl Session {
    /// Acquire the write lock on an account row, then read its latest
    /// committed state. Blocks while another session holds the lock.
    /// Returns `None` for an unknown id.
    pub async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        if !self.holds_lock(id) {
            let guard = self.locks.acquire(id).await;
            self.guards.push(guard);
        }

        let conn = self.conn()?;
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, balance, created_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// Whether this session holds the write lock for the given account.
    pub fn holds_lock(&self, id: AccountId) -> bool {
        self.guards.iter().any(|guard| guard.account_id() == id)
    }

    /// Insert a new account row inside the session transaction.
    pub async fn insert_account(
        &mut self,
        customer_id: CustomerId,
        balance: Cents,
    ) -> Result<Account, StoreError> {
        self.ensure_begun().await?;
        let created_at = Utc::now();

        let conn = self.conn()?;
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (customer_id, balance, created_at)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(customer_id)
        .bind(balance)
        .bind(created_at.to_rfc3339())
        .fetch_one(&mut *conn)
        .await?;

        Ok(Account {
            id: row.get("id"),
            customer_id,
            balance,
            created_at,
        })
    }

    /// Persist a mutated balance. Refused unless this session holds the
    /// account's write lock; the lock is what makes the caller's earlier
    /// read-check trustworthy.
    pub async fn update_balance(&mut self, id: AccountId, balance: Cents) -> Result<(), StoreError> {
        if !self.holds_lock(id) {
            return Err(StoreError::LockNotHeld(id));
        }
        self.ensure_begun().await?;

        let conn = self.conn()?;
        let result = sqlx::query("UPDATE accounts SET balance = ? WHERE id = ?")
            .bind(balance)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvalidData(format!(
                "account {id} missing during balance update"
            )));
        }
        Ok(())
    }

    /// Append one immutable ledger entry inside the session transaction.
    pub async fn append_entry(
        &mut self,
        account_id: AccountId,
        amount: Cents,
        kind: EntryKind,
    ) -> Result<LedgerEntry, StoreError> {
        self.ensure_begun().await?;
        let created_at = Utc::now();

        let conn = self.conn()?;
        let row = sqlx::query(
            r#"
            INSERT INTO entries (account_id, amount, kind, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .bind(kind.as_str())
        .bind(created_at.to_rfc3339())
        .fetch_one(&mut *conn)
        .await?;

        Ok(LedgerEntry {
            id: row.get("id"),
            account_id,
            amount,
            kind,
            created_at,
        })
    }

    /// Commit the store transaction, release all row locks, and return the
    /// connection to the pool. A session that never wrote commits nothing.
    pub async fn commit(mut self) -> Result<(), StoreError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        if !self.in_tx {
            return Ok(());
        }
        self.in_tx = false;

        match sqlx::query("COMMIT").execute(&mut *conn).await {
            Ok(_) => Ok(()),
            Err(err) => {
                // Leave nothing half-open: try to roll back, and if even
                // that fails close the connection rather than pool it.
                if sqlx::query("ROLLBACK").execute(&mut *conn).await.is_err() {
                    drop(conn.detach());
                }
                Err(err.into())
            }
        }
    }

    /// Roll back the store transaction (if one was opened), release all row
    /// locks, and return the connection to the pool.
    pub async fn rollback(mut self) -> Result<(), StoreError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        if !self.in_tx {
            return Ok(());
        }
        self.in_tx = false;

        match sqlx::query("ROLLBACK").execute(&mut *conn).await {
            Ok(_) => Ok(()),
            Err(err) => {
                drop(conn.detach());
                Err(err.into())
            }
        }
    }

    /// Open the store transaction on first write. Row locks are always
    /// taken before this point, so a session never holds the store's write
    /// slot while waiting on a row lock.
    async fn ensure_begun(&mut self) -> Result<(), StoreError> {
        if self.in_tx {
            return Ok(());
        }
        let conn = self.conn()?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        self.in_tx = true;
        Ok(())
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection, StoreError> {
        match self.conn.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(StoreError::SessionFinished),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.in_tx {
                // Unfinished transaction: close the connection so SQLite
                // rolls it back; never pool a mid-transaction connection.
                drop(conn.detach());
            }
        }
    }
}
