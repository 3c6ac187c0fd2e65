use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ValueObject};

/// A strictly positive number of units.
///
/// Bounded by `i64::MAX` so it always converts into a signed ledger delta.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Quantity(u64);

impl Quantity {
    pub fn new(value: u64) -> DomainResult<Self> {
        if value == 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        if value > i64::MAX as u64 {
            return Err(DomainError::validation("quantity is out of range"));
        }
        Ok(Self(value))
    }

    /// Accepts request-level integers, rejecting zero and negatives.
    pub fn from_signed(value: i64) -> DomainResult<Self> {
        if value <= 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        Ok(Self(value as u64))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn as_delta(self) -> i64 {
        self.0 as i64
    }
}

impl ValueObject for Quantity {}

impl TryFrom<u64> for Quantity {
    type Error = DomainError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_are_rejected() {
        assert!(Quantity::new(0).is_err());
        assert!(Quantity::from_signed(0).is_err());
        assert!(Quantity::from_signed(-5).is_err());
        assert_eq!(Quantity::from_signed(5).unwrap().get(), 5);
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("3").unwrap().get(), 3);
    }
}
