use chrono::{DateTime, Utc};

use crate::domain::{
    Account, AccountId, Cents, Customer, CustomerId, EntryKind, IntegrityReport, LedgerEntry,
};
use crate::storage::{
    AccountRepository, CustomerRepository, IntegrityStats, LedgerStore, Session, StoreError,
    TransactionLog,
};

use super::{AppError, SourceSelection, TransferEngine, TransferReceipt};

/// Application service providing the account lifecycle, the customer
/// directory, and queries, with transfers delegated to the engine. This is
/// the primary interface for any client (CLI, API, TUI, etc.).
pub struct AccountService {
    store: LedgerStore,
    engine: TransferEngine,
}

/// Detailed account information
pub struct AccountInfo {
    pub account: Account,
    pub customer: Customer,
    pub entry_count: i64,
    pub last_activity: Option<DateTime<Utc>>,
}

impl AccountService {
    /// Create a new service over an open store.
    pub fn new(store: LedgerStore) -> Self {
        let engine = TransferEngine::new(store.clone());
        Self { store, engine }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let store = LedgerStore::init(database_path).await?;
        Ok(Self::new(store))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let store = LedgerStore::connect(database_path).await?;
        Ok(Self::new(store))
    }

    /// Replace the source selection policy used by owned-accounts transfers.
    pub fn with_selection(mut self, selection: SourceSelection) -> Self {
        self.engine = TransferEngine::new(self.store.clone()).with_selection(selection);
        self
    }

    // ========================
    // Customer directory
    // ========================

    /// Create a new customer.
    pub async fn create_customer(&self, name: &str) -> Result<Customer, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidArgument(
                "customer name cannot be empty".to_string(),
            ));
        }

        let customer = CustomerRepository::insert(self.store.pool(), name).await?;
        tracing::info!(customer_id = customer.id, "customer created");
        Ok(customer)
    }

    /// Get a customer by id.
    pub async fn customer(&self, id: CustomerId) -> Result<Customer, AppError> {
        CustomerRepository::find(self.store.pool(), id)
            .await?
            .ok_or(AppError::CustomerNotFound(id))
    }

    /// List all customers.
    pub async fn customers(&self) -> Result<Vec<Customer>, AppError> {
        Ok(CustomerRepository::list(self.store.pool()).await?)
    }

    // ========================
    // Account lifecycle
    // ========================

    /// Create an account for an existing customer, seeded with an initial
    /// deposit. The account row and its DEPOSIT entry commit atomically as
    /// one unit; a zero deposit writes no entry.
    pub async fn create_account(
        &self,
        customer_id: CustomerId,
        initial_deposit: Cents,
    ) -> Result<Account, AppError> {
        if initial_deposit < 0 {
            return Err(AppError::InvalidArgument(format!(
                "initial deposit cannot be negative, got {initial_deposit}"
            )));
        }

        self.customer(customer_id).await?;

        let mut session = self.store.begin().await?;
        match Self::seed_account(&mut session, customer_id, initial_deposit).await {
            Ok(account) => {
                session.commit().await?;
                tracing::info!(
                    account_id = account.id,
                    customer_id,
                    initial_deposit,
                    "account created"
                );
                Ok(account)
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed after account creation error");
                }
                Err(err.into())
            }
        }
    }

    async fn seed_account(
        session: &mut Session,
        customer_id: CustomerId,
        deposit: Cents,
    ) -> Result<Account, StoreError> {
        let account = session.insert_account(customer_id, deposit).await?;
        if deposit > 0 {
            session
                .append_entry(account.id, deposit, EntryKind::Deposit)
                .await?;
        }
        Ok(account)
    }

    /// Get an account by id.
    pub async fn account(&self, id: AccountId) -> Result<Account, AppError> {
        AccountRepository::find(self.store.pool(), id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))
    }

    /// List accounts, optionally restricted to one customer.
    pub async fn accounts(&self, customer_id: Option<CustomerId>) -> Result<Vec<Account>, AppError> {
        let accounts = match customer_id {
            Some(customer_id) => {
                AccountRepository::by_customer(self.store.pool(), customer_id).await?
            }
            None => AccountRepository::list(self.store.pool()).await?,
        };
        Ok(accounts)
    }

    /// Get detailed account information.
    pub async fn account_info(&self, id: AccountId) -> Result<AccountInfo, AppError> {
        let account = self.account(id).await?;
        let customer = self.customer(account.customer_id).await?;
        let entry_count = TransactionLog::count_for_account(self.store.pool(), id).await?;
        let last_activity = TransactionLog::last_activity(self.store.pool(), id).await?;

        Ok(AccountInfo {
            account,
            customer,
            entry_count,
            last_activity,
        })
    }

    /// Current committed balance of an account.
    pub async fn balance(&self, id: AccountId) -> Result<Cents, AppError> {
        Ok(self.account(id).await?.balance)
    }

    /// All ledger entries for an account in append order. An unknown id
    /// yields an empty history rather than an error.
    pub async fn history(&self, id: AccountId) -> Result<Vec<LedgerEntry>, AppError> {
        Ok(TransactionLog::by_account(self.store.pool(), id).await?)
    }

    // ========================
    // Transfers
    // ========================

    /// Move money between two accounts. See `TransferEngine::transfer`.
    pub async fn transfer(
        &self,
        from_id: AccountId,
        to_id: AccountId,
        amount: Cents,
    ) -> Result<TransferReceipt, AppError> {
        self.engine.transfer(from_id, to_id, amount).await
    }

    /// Move money into one of a customer's accounts from another account
    /// the same customer owns. See `TransferEngine::transfer_between_owned`.
    pub async fn transfer_between_owned(
        &self,
        customer_id: CustomerId,
        to_id: AccountId,
        amount: Cents,
    ) -> Result<TransferReceipt, AppError> {
        self.engine
            .transfer_between_owned(customer_id, to_id, amount)
            .await
    }

    // ========================
    // Integrity
    // ========================

    /// Check ledger integrity and return a report.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stats = IntegrityStats::collect(self.store.pool()).await?;

        Ok(IntegrityReport {
            customer_count: stats.customer_count,
            account_count: stats.account_count,
            entry_count: stats.entry_count,
            drifted_accounts: stats.drifted_accounts,
            negative_accounts: stats.negative_accounts,
            transfer_imbalance: stats.transfer_imbalance,
            orphan_entries: stats.orphan_entries,
            zero_amount_entries: stats.zero_amount_entries,
        })
    }
}
