//! Money types
//!
//! Domain primitives for Rupiah amounts. A `Price` is validated at
//! construction, so a zero, negative or fractional list price cannot reach
//! the settlement path. Charged prices and commissions derived from it stay
//! plain `Decimal`s rounded with `round_to_currency`.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Rupiah has no minor unit in circulation
pub const CURRENCY_DECIMALS: u32 = 0;

/// Upper bound for a single wash price (100 million IDR)
const MAX_PRICE: i64 = 100_000_000;

/// Round to the currency's smallest unit, half away from zero.
///
/// Amounts in this crate are never negative, so this is round-half-up.
pub fn round_to_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Errors that can occur when creating a Price
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Price must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Amount has too many decimal places (max {CURRENCY_DECIMALS}, got {0})")]
    TooManyDecimals(u32),

    #[error("Price exceeds maximum allowed value ({MAX_PRICE})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl From<MoneyError> for DomainError {
    fn from(err: MoneyError) -> Self {
        DomainError::Validation(err.to_string())
    }
}

/// A validated list price for one wash.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Whole Rupiah only
/// - At most 100 million
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use motowash::domain::Price;
///
/// let price = Price::new(Decimal::new(50_000, 0)).unwrap();
/// assert_eq!(price.value(), Decimal::new(50_000, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Create a new Price with validation.
    ///
    /// # Errors
    /// - `MoneyError::NotPositive` if value <= 0
    /// - `MoneyError::TooManyDecimals` if the value has a fractional Rupiah part
    /// - `MoneyError::Overflow` if value > 100 million
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value <= Decimal::ZERO {
            return Err(MoneyError::NotPositive(value));
        }

        let scale = value.normalize().scale();
        if scale > CURRENCY_DECIMALS {
            return Err(MoneyError::TooManyDecimals(scale));
        }

        if value > Decimal::from(MAX_PRICE) {
            return Err(MoneyError::Overflow);
        }

        Ok(Self(value.normalize()))
    }

    /// Create a Price from whole Rupiah.
    pub fn from_integer(value: i64) -> Result<Self, MoneyError> {
        Self::new(Decimal::from(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| MoneyError::ParseError(e.to_string()))?;
        Price::new(decimal)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Price::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}
