use crate::types::errors::AccountNumberError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const PREFIX: &str = "WB";
const DIGITS: usize = 10;
const SERIAL_LIMIT: u64 = 10_000_000_000;

/// Customer-facing account number such as `WB0004815162`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Formats `serial` as an account number, keeping its last ten digits.
    pub fn new(serial: u64) -> Self {
        AccountNumber(format!("{PREFIX}{:0width$}", serial % SERIAL_LIMIT, width = DIGITS))
    }

    /// Draws a random candidate. The ledger retests it for uniqueness before use.
    pub fn generate() -> Self {
        Self::new(rand::thread_rng().gen_range(0..SERIAL_LIMIT))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccountNumber {
    type Err = AccountNumberError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_ascii_uppercase();

        let valid = value.strip_prefix(PREFIX)
            .is_some_and(|digits| digits.len() == DIGITS && digits.chars().all(|c| c.is_ascii_digit()));

        if !valid {
            return Err(AccountNumberError(value));
        }

        Ok(AccountNumber(value))
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = AccountNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AccountNumber::from_str(&value)
    }
}

impl From<AccountNumber> for String {
    fn from(number: AccountNumber) -> Self {
        number.0
    }
}

impl Display for AccountNumber {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}
