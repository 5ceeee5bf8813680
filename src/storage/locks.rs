use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::AccountId;

/// Registry of per-account write locks, shared by every session of one
/// store. Acquiring an account's lock serializes all balance mutations on
/// that row: the second acquirer waits until the first holder's session
/// commits or rolls back, then reads the committed value.
///
/// Locks are process-local. They cover every session created from the same
/// `LedgerStore` and its clones, which is the only write path to the
/// database this store manages.
#[derive(Clone, Default)]
pub struct AccountLocks {
    locks: Arc<Mutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the write lock for one account, waiting for any current
    /// holder. The guard is owned so it can travel with the session that
    /// took it and be released on commit, rollback, or drop.
    pub async fn acquire(&self, id: AccountId) -> AccountLockGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(id).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        AccountLockGuard { id, _guard: guard }
    }
}

/// Held write lock on a single account row. Dropping it releases the lock.
pub struct AccountLockGuard {
    id: AccountId,
    _guard: OwnedMutexGuard<()>,
}

impl AccountLockGuard {
    pub fn account_id(&self) -> AccountId {
        self.id
    }
}
