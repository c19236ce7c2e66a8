use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use alloy::primitives::Address;
use tracing::debug;

use crate::ports::PortError;

/// One active multi-step operation per account. Shared by every flow the
/// application opens.
#[derive(Debug, Clone, Default)]
pub struct AccountLocks {
    held: Arc<Mutex<BTreeMap<Address, String>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(
        &self,
        account: Address,
        operation: &str,
    ) -> Result<AccountLockGuard, PortError> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(active) = held.get(&account) {
            return Err(PortError::Conflict(format!(
                "ACCOUNT_OPERATION_IN_PROGRESS: {active}"
            )));
        }
        held.insert(account, operation.to_owned());
        debug!(%account, operation, "account lock acquired");
        Ok(AccountLockGuard {
            account,
            held: Arc::clone(&self.held),
        })
    }

    pub fn holder(&self, account: Address) -> Option<String> {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&account)
            .cloned()
    }

    pub fn is_locked(&self, account: Address) -> bool {
        self.holder(account).is_some()
    }
}

/// Releases the account when dropped.
#[derive(Debug)]
pub struct AccountLockGuard {
    account: Address,
    held: Arc<Mutex<BTreeMap<Address, String>>>,
}

impl AccountLockGuard {
    pub fn account(&self) -> Address {
        self.account
    }
}

impl Drop for AccountLockGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.account);
        debug!(account = %self.account, "account lock released");
    }
}
