// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use contabile::application::AccountService;
use contabile::domain::{AccountId, Cents, CustomerId};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(AccountService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = AccountService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to register a customer and open one funded account per deposit,
/// returning the customer id and the account ids in creation order
pub async fn customer_with_accounts(
    service: &AccountService,
    name: &str,
    deposits: &[Cents],
) -> Result<(CustomerId, Vec<AccountId>)> {
    let customer = service.create_customer(name).await?;
    let mut accounts = Vec::with_capacity(deposits.len());
    for &deposit in deposits {
        let account = service.create_account(customer.id, deposit).await?;
        accounts.push(account.id);
    }
    Ok((customer.id, accounts))
}

/// Total number of ledger entries across the given accounts
pub async fn total_entries(service: &AccountService, accounts: &[AccountId]) -> Result<usize> {
    let mut total = 0;
    for &id in accounts {
        total += service.history(id).await?.len();
    }
    Ok(total)
}
