use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MonetaryError {
    #[error("Monetary error: {0}")]
    InvalidFormat(String),
    #[error("Monetary error: [{0}] has more than two decimal places")]
    TooPrecise(String)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("Reference must not be empty")]
    Empty,
    #[error("Reference is longer than {max} characters")]
    TooLong {
        max: usize
    },
    #[error("Reference [{0}] may only contain ASCII letters, digits, '-' and '_'")]
    InvalidCharacters(String)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Account number [{0}] must be 'WB' followed by ten digits")]
pub struct AccountNumberError(pub String);
