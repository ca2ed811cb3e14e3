//! Account Ledger
//!
//! Balance-mutation primitives with per-account atomicity. The ledger knows
//! nothing about transactions beyond the key under which a posting is journaled.

mod account_ledger;

use async_trait::async_trait;

use crate::models::{AccountSummary, EntryKey, LedgerError};
use crate::types::{AccountId, Monetary};

pub use account_ledger::AccountLedger;

/// The operations the orchestrator needs from a ledger.
///
/// Postings are idempotent per `(account, key)`: repeating a posting that was
/// already applied acknowledges it without changing the balance again.
#[async_trait]
pub trait Ledger: Send + Sync + 'static {
    /// Increases the balance of an active account.
    async fn credit(&self, account_id: AccountId, amount: Monetary, key: EntryKey) -> Result<AccountSummary, LedgerError>;

    /// Decreases the balance of an active account, failing with
    /// `InsufficientBalance` instead of going below zero.
    async fn debit(&self, account_id: AccountId, amount: Monetary, key: EntryKey) -> Result<AccountSummary, LedgerError>;

    async fn get_account(&self, account_id: AccountId) -> Result<AccountSummary, LedgerError>;

    /// The amount journaled under `key`, `None` if that posting never applied.
    async fn find_entry(&self, account_id: AccountId, key: EntryKey) -> Result<Option<Monetary>, LedgerError>;
}
