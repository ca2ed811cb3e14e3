use crate::types::errors::MonetaryError;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const DECIMAL_PLACES: u32 = 2;

/// A fixed-point amount of money with exactly two decimal places.
///
/// Values with more precision than a cent are rejected rather than rounded,
/// so an amount read from input is always the amount that gets posted.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Monetary(Decimal);

impl Monetary {
    pub fn zero() -> Self {
        Monetary(Decimal::new(0, DECIMAL_PLACES))
    }

    /// Builds a monetary value from a decimal, normalising it to two places.
    ///
    /// # Errors
    /// Returns `MonetaryError::TooPrecise` when the value carries a non-zero
    /// digit beyond the second decimal place.
    pub fn from_decimal(value: Decimal) -> Result<Self, MonetaryError> {
        if value.normalize().scale() > DECIMAL_PLACES {
            return Err(MonetaryError::TooPrecise(value.to_string()));
        }

        let mut value = value;
        value.rescale(DECIMAL_PLACES);

        Ok(Monetary(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Monetary) -> Option<Monetary> {
        self.0.checked_add(rhs.0).map(Monetary)
    }

    pub fn checked_sub(self, rhs: Monetary) -> Option<Monetary> {
        self.0.checked_sub(rhs.0).map(Monetary)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl Default for Monetary {
    fn default() -> Self {
        Monetary::zero()
    }
}

impl TryFrom<Decimal> for Monetary {
    type Error = MonetaryError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Monetary::from_decimal(value)
    }
}

impl Display for Monetary {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for Monetary {
    type Err = MonetaryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();

        if value.is_empty() {
            return Err(MonetaryError::InvalidFormat("Value is an empty string".to_string()));
        }

        let decimal = Decimal::from_str(value).map_err(|error| {
            MonetaryError::InvalidFormat(format!("Value [{value}] is not a decimal: {error}"))
        })?;

        Monetary::from_decimal(decimal)
    }
}

impl Serialize for Monetary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Monetary {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Monetary::from_str(&value).map_err(de::Error::custom)
    }
}
