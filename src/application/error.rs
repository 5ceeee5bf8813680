use thiserror::Error;

use crate::domain::{AccountId, Cents, CustomerId};
use crate::storage::StoreError;

/// Caller-facing error taxonomy. Every operation returns a discriminated
/// kind; business-rule and not-found failures are raised only after the
/// in-progress transaction (if any) has been rolled back.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    #[error("Insufficient funds in account {account_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Cents,
        required: Cents,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Infrastructure fault inside the transfer path, caught at the
    /// transaction boundary after rollback.
    #[error("Transfer failed: {0}")]
    TransferFailed(#[source] StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}
