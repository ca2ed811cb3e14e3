use crate::models::TransactionStatus;
use crate::types::{TransactionId, TransactionReference};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Reference [{reference}] is already taken")]
    DuplicateReference {
        reference: TransactionReference
    },
    #[error("No free reference found after {attempts} attempts")]
    ReferenceSpaceExhausted {
        attempts: usize
    },
    #[error("Transaction [{transaction_id}] was not found")]
    NotFound {
        transaction_id: TransactionId
    },
    #[error("Transaction [{transaction_id}] is already final: [{status:?}]")]
    AlreadyFinalized {
        transaction_id: TransactionId,
        status: TransactionStatus
    },
    #[error("Transaction [{transaction_id}] cannot be finalized as [{status:?}]")]
    NotTerminal {
        transaction_id: TransactionId,
        status: TransactionStatus
    },
    #[error("Transaction store is unavailable: {0}")]
    Unavailable(String)
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
