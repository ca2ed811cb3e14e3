mod account_storage;
mod errors;
mod transaction_storage;

use crate::models::{Account, AccountSummary, DateRange, FailureReason, Transaction, TransactionDraft, TransactionStatus};
use crate::types::{AccountId, TransactionId};

pub use account_storage::AccountStorage;
pub use errors::StoreError;
pub use transaction_storage::TransactionStorage;

/// Where account actors hydrate from and persist to.
pub trait Storage: Send + Sync + 'static {
    fn load(&self, account_id: AccountId) -> Option<Account>;
    fn save(&self, account_id: AccountId, account: Account);
    fn contains(&self, account_id: AccountId) -> bool;

    /// Every account currently at rest in storage.
    fn summaries(&self) -> Vec<AccountSummary>;
}

/// Durable record of every transaction attempt.
///
/// Only the orchestrator writes to the store. Reads are safe from anywhere.
pub trait TransactionStore: Send + Sync + 'static {
    /// Persists a pending record under the draft's reference, or under a
    /// freshly generated one when the draft carries none.
    fn create(&self, draft: TransactionDraft) -> Result<Transaction, StoreError>;

    /// Moves a pending record to a terminal status, exactly once.
    fn finalize(&self, transaction_id: TransactionId, status: TransactionStatus, reason: Option<FailureReason>) -> Result<Transaction, StoreError>;

    fn find_by_id(&self, transaction_id: TransactionId) -> Result<Option<Transaction>, StoreError>;
    fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>, StoreError>;

    /// Transactions where the account is the source or the local destination, newest first.
    fn find_by_account(&self, account_id: AccountId) -> Result<Vec<Transaction>, StoreError>;
    fn find_by_account_and_date_range(&self, account_id: AccountId, range: &DateRange) -> Result<Vec<Transaction>, StoreError>;
    fn find_by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>, StoreError>;
}
