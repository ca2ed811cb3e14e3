mod account_number;
mod errors;
mod monetary;
mod reference;
#[cfg(test)]
mod tests;

pub use account_number::AccountNumber;
pub use errors::{AccountNumberError, MonetaryError, ReferenceError};
pub use monetary::Monetary;
pub use reference::TransactionReference;

pub type AccountId = u64;
/// Identifies the client holding an account.
pub type OwnerId = u64;
pub type TransactionId = u64;
