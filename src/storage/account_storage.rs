use crate::models::{Account, AccountSummary};
use crate::storage::Storage;
use crate::types::AccountId;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory account table.
///
/// `load` hands the account over to its actor (the entry is removed) and the
/// actor saves it back when it stops, so a live account is owned by exactly
/// one task at a time.
pub struct AccountStorage {
    cache: Arc<DashMap<AccountId, Account>>
}

impl AccountStorage {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(DashMap::new())
        }
    }

    /// Persisted accounts ordered by id.
    pub fn snapshot(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.cache.iter().map(|item| item.value().clone()).collect();
        accounts.sort_by_key(|account| account.account_id);
        accounts
    }
}

impl Default for AccountStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for AccountStorage {
    fn load(&self, account_id: AccountId) -> Option<Account> {
        self.cache.remove(&account_id).map(|(_, account)| account)
    }

    fn save(&self, account_id: AccountId, account: Account) {
        self.cache.insert(account_id, account);
    }

    fn contains(&self, account_id: AccountId) -> bool {
        self.cache.contains_key(&account_id)
    }

    fn summaries(&self) -> Vec<AccountSummary> {
        self.snapshot().iter().map(Account::summary).collect()
    }
}
