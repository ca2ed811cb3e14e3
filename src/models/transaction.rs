use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::errors::ValidationError;
use crate::models::{Destination, FailureReason, TransactionStatus, TransactionType};
use crate::types::{AccountId, Monetary, TransactionId, TransactionReference};

const MAX_DESCRIPTION_LENGTH: usize = 500;

/// A request to move funds, as handed over by the calling layer.
///
/// Nothing in here has been checked yet, [`TransactionRequest::validate`]
/// turns it into a [`TransactionDraft`] or rejects it before any record exists.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRequest {
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub source_account_id: AccountId,
    pub destination_account_id: Option<AccountId>,
    pub destination_iban: Option<String>,
    pub amount: Monetary,
    pub description: Option<String>,
    /// Idempotency key supplied by the caller, one is generated when absent.
    pub reference: Option<TransactionReference>
}

impl TransactionRequest {
    pub fn deposit(account_id: AccountId, amount: Monetary) -> Self {
        Self::new(TransactionType::Deposit, account_id, amount)
    }

    pub fn withdrawal(account_id: AccountId, amount: Monetary) -> Self {
        Self::new(TransactionType::Withdrawal, account_id, amount)
    }

    pub fn transfer(source_account_id: AccountId, destination_account_id: AccountId, amount: Monetary) -> Self {
        Self {
            destination_account_id: Some(destination_account_id),
            ..Self::new(TransactionType::Transfer, source_account_id, amount)
        }
    }

    pub fn external_transfer(source_account_id: AccountId, iban: impl Into<String>, amount: Monetary) -> Self {
        Self {
            destination_iban: Some(iban.into()),
            ..Self::new(TransactionType::Transfer, source_account_id, amount)
        }
    }

    pub fn with_reference(mut self, reference: TransactionReference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn new(transaction_type: TransactionType, source_account_id: AccountId, amount: Monetary) -> Self {
        Self {
            transaction_type,
            source_account_id,
            destination_account_id: None,
            destination_iban: None,
            amount,
            description: None,
            reference: None
        }
    }

    /// Checks the request shape and normalises the destination.
    ///
    /// # Errors
    /// Returns `ValidationError` if:
    /// - The amount is zero or negative.
    /// - A transfer has no destination, or both an account and an IBAN.
    /// - A deposit or withdrawal names a destination.
    /// - A transfer targets its own source account.
    /// - The IBAN is malformed or the description is too long.
    pub fn validate(self) -> Result<TransactionDraft, ValidationError> {
        if !self.amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount(self.amount));
        }

        if let Some(description) = &self.description
            && description.chars().count() > MAX_DESCRIPTION_LENGTH
        {
            return Err(ValidationError::DescriptionTooLong { max: MAX_DESCRIPTION_LENGTH });
        }

        let destination = match (self.transaction_type, self.destination_account_id, self.destination_iban) {
            (TransactionType::Transfer, Some(_), Some(_)) => return Err(ValidationError::AmbiguousDestination),
            (TransactionType::Transfer, None, None) => return Err(ValidationError::MissingDestination),
            (TransactionType::Transfer, Some(account_id), None) => {
                if account_id == self.source_account_id {
                    return Err(ValidationError::SameAccount(account_id));
                }
                Some(Destination::Account(account_id))
            }
            (TransactionType::Transfer, None, Some(iban)) => Some(Destination::External(normalize_iban(&iban)?)),
            (_, None, None) => None,
            (transaction_type, _, _) => return Err(ValidationError::UnexpectedDestination(transaction_type))
        };

        Ok(TransactionDraft {
            transaction_type: self.transaction_type,
            source_account_id: self.source_account_id,
            destination,
            amount: self.amount,
            description: self.description,
            reference: self.reference
        })
    }
}

/// A validated request, ready to be stored as a pending transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub transaction_type: TransactionType,
    pub source_account_id: AccountId,
    pub destination: Option<Destination>,
    pub amount: Monetary,
    pub description: Option<String>,
    pub reference: Option<TransactionReference>
}

/// A stored transaction attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    /// System-generated sequence number.
    pub transaction_id: TransactionId,
    /// Globally unique reference, also the idempotency key.
    pub reference: TransactionReference,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub source_account_id: AccountId,
    pub destination: Option<Destination>,
    pub amount: Monetary,
    pub description: Option<String>,
    pub status: TransactionStatus,
    pub failure_reason: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>
}

impl Transaction {
    pub fn pending(transaction_id: TransactionId, reference: TransactionReference, draft: TransactionDraft) -> Self {
        Self {
            transaction_id,
            reference,
            transaction_type: draft.transaction_type,
            source_account_id: draft.source_account_id,
            destination: draft.destination,
            amount: draft.amount,
            description: draft.description,
            status: TransactionStatus::Pending,
            failure_reason: None,
            created_at: Utc::now(),
            completed_at: None
        }
    }

    /// Whether the account is either party of this transaction.
    pub fn involves(&self, account_id: AccountId) -> bool {
        self.source_account_id == account_id
            || self.destination.as_ref().and_then(Destination::local_account) == Some(account_id)
    }

    /// Whether a resubmitted draft describes the same movement of funds.
    ///
    /// The description is free text and is not compared.
    pub fn matches(&self, draft: &TransactionDraft) -> bool {
        self.transaction_type == draft.transaction_type
            && self.source_account_id == draft.source_account_id
            && self.destination == draft.destination
            && self.amount == draft.amount
    }
}

/// Inclusive window over transaction creation times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvalidDateRange);
        }

        Ok(Self { start, end })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

fn normalize_iban(raw: &str) -> Result<String, ValidationError> {
    let iban: String = raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let bytes = iban.as_bytes();
    let well_formed = (15..=34).contains(&bytes.len())
        && bytes.iter().all(u8::is_ascii_alphanumeric)
        && bytes[..2].iter().all(u8::is_ascii_alphabetic)
        && bytes[2..4].iter().all(u8::is_ascii_digit);

    if !well_formed {
        return Err(ValidationError::InvalidIban(raw.to_string()));
    }

    Ok(iban)
}
