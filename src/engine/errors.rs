use crate::models::ValidationError;
use crate::storage::StoreError;
use crate::types::TransactionReference;
use thiserror::Error;

/// Why a request produced no transaction outcome.
///
/// Business failures are not errors here: they come back as a `FAILED`
/// transaction carrying its reason.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Reference [{reference}] already belongs to a different transaction")]
    ReferenceConflict {
        reference: TransactionReference
    },
    #[error("Transaction [{reference}] is still in progress")]
    InProgress {
        reference: TransactionReference
    },
    #[error("Transaction [{0}] was not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError)
}
