use crate::models::{Account, AccountStatus, FailureReason, TransactionType};
use crate::types::{AccountId, Monetary};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account [{account_id}] was not found")]
    AccountNotFound {
        account_id: AccountId
    },
    #[error("Account [{account_id}] already exists")]
    AccountExists {
        account_id: AccountId
    },
    #[error("Account [{account_id}] is not active: [{status:?}]")]
    AccountNotActive {
        account_id: AccountId,
        status: AccountStatus
    },
    #[error("Insufficient balance in account [{account_id}]: [{balance}] available, [{requested}] requested")]
    InsufficientBalance {
        account_id: AccountId,
        balance: Monetary,
        requested: Monetary
    },
    #[error("Amount [{amount}] must be positive for account [{account_id}]")]
    InvalidAmount {
        account_id: AccountId,
        amount: Monetary
    },
    #[error("Numeric overflow occurred for account [{account_id}]")]
    Overflow {
        account_id: AccountId
    },
    #[error("Account [{account_id}] cannot be closed with a balance of [{balance}]")]
    NonZeroBalance {
        account_id: AccountId,
        balance: Monetary
    },
    #[error("Account [{account_id}] cannot move from [{from:?}] to [{to:?}]")]
    InvalidStatusTransition {
        account_id: AccountId,
        from: AccountStatus,
        to: AccountStatus
    },
    #[error("No free account number found for account [{account_id}] after {attempts} attempts")]
    NumberSpaceExhausted {
        account_id: AccountId,
        attempts: usize
    },
    #[error("Ledger call for account [{account_id}] timed out")]
    Timeout {
        account_id: AccountId
    },
    #[error("Ledger is unavailable for account [{account_id}]: {reason}")]
    Unavailable {
        account_id: AccountId,
        reason: String
    }
}

impl LedgerError {
    //NOTE: Every account error carries the account id (and often its balance or status), building
    //      them straight from the account keeps the call sites in `Account` short.

    pub fn not_active(account: &Account) -> Self {
        Self::AccountNotActive { account_id: account.account_id, status: account.status }
    }

    pub fn insufficient_balance(account: &Account, requested: Monetary) -> Self {
        Self::InsufficientBalance {
            account_id: account.account_id,
            balance: account.balance,
            requested
        }
    }

    pub fn invalid_amount(account: &Account, amount: Monetary) -> Self {
        Self::InvalidAmount { account_id: account.account_id, amount }
    }

    pub fn overflow(account: &Account) -> Self {
        Self::Overflow { account_id: account.account_id }
    }

    pub fn non_zero_balance(account: &Account) -> Self {
        Self::NonZeroBalance { account_id: account.account_id, balance: account.balance }
    }

    pub fn invalid_transition(account: &Account, to: AccountStatus) -> Self {
        Self::InvalidStatusTransition { account_id: account.account_id, from: account.status, to }
    }

    pub fn unavailable(account_id: AccountId, reason: impl Into<String>) -> Self {
        Self::Unavailable { account_id, reason: reason.into() }
    }

    /// Transient errors leave the outcome of a posting unknown.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable { .. })
    }

    /// The reason recorded on a transaction that failed with this error.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::AccountNotFound { account_id } => FailureReason::AccountNotFound { account_id: *account_id },
            Self::AccountNotActive { account_id, .. } => FailureReason::AccountNotActive { account_id: *account_id },
            Self::InsufficientBalance { account_id, .. } => FailureReason::InsufficientBalance { account_id: *account_id },
            Self::Overflow { account_id } => FailureReason::BalanceOverflow { account_id: *account_id },
            //NOTE: Only reached once the journal shows the posting never landed
            Self::Timeout { account_id } | Self::Unavailable { account_id, .. } => FailureReason::LedgerUnavailable { account_id: *account_id },
            Self::InvalidAmount { account_id, .. }
            | Self::AccountExists { account_id }
            | Self::NumberSpaceExhausted { account_id, .. }
            | Self::NonZeroBalance { account_id, .. }
            | Self::InvalidStatusTransition { account_id, .. } => FailureReason::Rejected {
                account_id: *account_id,
                detail: self.to_string()
            }
        }
    }
}

/// Rejections raised before a transaction record is created.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amount must be strictly positive, got [{0}]")]
    NonPositiveAmount(Monetary),
    #[error("A transfer needs a destination account or IBAN")]
    MissingDestination,
    #[error("A transfer takes a destination account or an IBAN, not both")]
    AmbiguousDestination,
    #[error("A [{0:?}] does not take a destination")]
    UnexpectedDestination(TransactionType),
    #[error("Source and destination are the same account [{0}]")]
    SameAccount(AccountId),
    #[error("Invalid IBAN [{0}]")]
    InvalidIban(String),
    #[error("Description is longer than {max} characters")]
    DescriptionTooLong {
        max: usize
    },
    #[error("Date range starts after it ends")]
    InvalidDateRange
}
