use crate::error::{EngineError, EngineErrorKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 3-letter ISO 4217 currency code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency([u8; 3]);

impl Currency {
    pub fn new(code: &str) -> Self {
        let bytes = code.as_bytes();
        debug_assert_eq!(bytes.len(), 3, "currency codes are exactly 3 letters");
        let mut buf = [0u8; 3];
        buf.copy_from_slice(&bytes[..3.min(bytes.len())]);
        Self(buf)
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::new("USD")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monetary amount tagged with its currency.
///
/// Arithmetic between `Money` values of differing currencies is a deterministic
/// [`EngineErrorKind::MixedCurrency`] error rather than a silent same-currency sum — see
/// Open Question 9.2 in `DESIGN.md`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, EngineError> {
        if self.currency != other.currency {
            return Err(EngineErrorKind::MixedCurrency.into());
        }
        Ok(Money::new(self.amount + other.amount, self.currency))
    }
}
