mod account;
mod errors;
mod transaction;

use std::fmt;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, TransactionId};

pub use account::{Account, AccountProfile, AccountSummary, Posting};
pub use errors::{LedgerError, ValidationError};
pub use transaction::{DateRange, Transaction, TransactionDraft, TransactionRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer
}

/// Lifecycle of a transaction record.
///
/// `Pending` is the only non-terminal state. `NeedsReconciliation` is terminal
/// for the orchestrator but unresolved: an operator has to settle it by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    NeedsReconciliation
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Suspended,
    Closed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Savings,
    Checking,
    Business
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Debit,
    Credit,
    Compensation
}

/// Identifies one posting against one account.
///
/// A transaction posts at most one entry of each kind per account, so the pair
/// is enough for the ledger to recognise a replayed posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    pub transaction_id: TransactionId,
    pub kind: EntryKind
}

impl EntryKey {
    pub fn new(transaction_id: TransactionId, kind: EntryKind) -> Self {
        Self { transaction_id, kind }
    }
}

/// Where a transfer sends its funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// An account held by this ledger, credited locally.
    Account(AccountId),
    /// An IBAN outside this ledger, credited by external settlement.
    External(String)
}

impl Destination {
    pub fn local_account(&self) -> Option<AccountId> {
        match self {
            Destination::Account(account_id) => Some(*account_id),
            Destination::External(_) => None
        }
    }
}

impl Display for Destination {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Account(account_id) => write!(formatter, "{account_id}"),
            Destination::External(iban) => formatter.write_str(iban)
        }
    }
}

/// Why a transaction did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    InsufficientBalance { account_id: AccountId },
    AccountNotFound { account_id: AccountId },
    AccountNotActive { account_id: AccountId },
    BalanceOverflow { account_id: AccountId },
    /// The ledger kept failing and the journal shows the posting never applied.
    LedgerUnavailable { account_id: AccountId },
    /// A posting timed out and could not be verified either way.
    OutcomeUnknown { account_id: AccountId, kind: EntryKind },
    /// A transfer credit failed and the source could not be refunded.
    CompensationFailed { account_id: AccountId },
    Rejected { account_id: AccountId, detail: String }
}

impl Display for FailureReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::InsufficientBalance { account_id } => write!(formatter, "InsufficientBalance({account_id})"),
            FailureReason::AccountNotFound { account_id } => write!(formatter, "AccountNotFound({account_id})"),
            FailureReason::AccountNotActive { account_id } => write!(formatter, "AccountNotActive({account_id})"),
            FailureReason::BalanceOverflow { account_id } => write!(formatter, "BalanceOverflow({account_id})"),
            FailureReason::LedgerUnavailable { account_id } => write!(formatter, "LedgerUnavailable({account_id})"),
            FailureReason::OutcomeUnknown { account_id, kind } => write!(formatter, "OutcomeUnknown({account_id}:{kind:?})"),
            FailureReason::CompensationFailed { account_id } => write!(formatter, "CompensationFailed({account_id})"),
            FailureReason::Rejected { account_id, detail } => write!(formatter, "Rejected({account_id}): {detail}")
        }
    }
}
