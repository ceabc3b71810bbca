//! Commission calculation
//!
//! Operators earn a percentage of every wash they perform. A loyalty free wash
//! charges the customer nothing but still pays the operator on the original
//! list price.

use rust_decimal::Decimal;

use super::money::round_to_currency;
use super::DomainError;

/// Pure commission arithmetic
pub struct CommissionCalculator;

impl CommissionCalculator {
    /// Price the commission is computed from
    pub fn base_price(price: Decimal, original_price: Decimal, is_free_wash: bool) -> Decimal {
        if is_free_wash {
            original_price
        } else {
            price
        }
    }

    /// Commission for one wash, rounded half-up to whole Rupiah.
    ///
    /// # Errors
    /// `DomainError::Validation` for a negative price, negative original price,
    /// or a rate outside 0..=100.
    pub fn compute(
        price: Decimal,
        original_price: Decimal,
        is_free_wash: bool,
        commission_rate_percent: Decimal,
    ) -> Result<Decimal, DomainError> {
        if price < Decimal::ZERO {
            return Err(DomainError::validation(format!("price must not be negative (got {price})")));
        }
        if original_price < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "original price must not be negative (got {original_price})"
            )));
        }
        if commission_rate_percent < Decimal::ZERO || commission_rate_percent > Decimal::ONE_HUNDRED {
            return Err(DomainError::validation(format!(
                "commission rate must be between 0 and 100 (got {commission_rate_percent})"
            )));
        }

        let base = Self::base_price(price, original_price, is_free_wash);
        Ok(round_to_currency(base * commission_rate_percent / Decimal::ONE_HUNDRED))
    }
}
