use crate::types::errors::ReferenceError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const GENERATED_PREFIX: &str = "TXN-";
const GENERATED_BITS: u32 = 48;
const MAX_LENGTH: usize = 64;

/// Human-facing unique key of a transaction, doubling as its idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionReference(String);

impl TransactionReference {
    /// Draws a random candidate such as `TXN-1A2B3C4D5E6F`.
    ///
    /// The candidate carries 48 bits of entropy. Uniqueness is not checked
    /// here, the transaction store retests each candidate before use.
    pub fn generate() -> Self {
        let value: u64 = rand::thread_rng().gen_range(0..(1u64 << GENERATED_BITS));
        TransactionReference(format!("{GENERATED_PREFIX}{value:012X}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TransactionReference {
    type Err = ReferenceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();

        if value.is_empty() {
            return Err(ReferenceError::Empty);
        }

        if value.len() > MAX_LENGTH {
            return Err(ReferenceError::TooLong { max: MAX_LENGTH });
        }

        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(ReferenceError::InvalidCharacters(value.to_string()));
        }

        Ok(TransactionReference(value.to_string()))
    }
}

impl TryFrom<String> for TransactionReference {
    type Error = ReferenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TransactionReference::from_str(&value)
    }
}

impl From<TransactionReference> for String {
    fn from(reference: TransactionReference) -> Self {
        reference.0
    }
}

impl Display for TransactionReference {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}
