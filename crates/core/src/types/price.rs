//! Non-negative monetary amounts in the store's single currency.
//!
//! Arithmetic runs on [`Decimal`] so cart totals never drift the way binary
//! floats do. Display and the gateway's minor-unit conversion both round to
//! two decimal places, half away from zero.

use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Price`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// Amount below zero.
    #[error("price cannot be negative")]
    Negative,
    /// Text that is not a decimal number.
    #[error("invalid price: {0}")]
    Invalid(String),
    /// Amount too large to express in minor units.
    #[error("price out of range")]
    OutOfRange,
}

/// A non-negative amount of money.
///
/// ```
/// use bazaar_core::Price;
///
/// let unit: Price = "9.99".parse().unwrap();
/// let total: Price = [unit.times(2), "5".parse().unwrap()].into_iter().sum();
/// assert_eq!(total.to_string(), "24.98");
/// assert_eq!(total.minor_units().unwrap(), 2498);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Zero in the store currency.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for amounts below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        Ok(Self(amount))
    }

    /// Build a price from an amount in minor units (cents).
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for negative amounts.
    pub fn from_minor_units(cents: i64) -> Result<Self, PriceError> {
        Self::new(Decimal::new(cents, 2))
    }

    /// The raw, unrounded amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// The amount rounded to cents, scaled to exactly two decimal places.
    #[must_use]
    pub fn rounded(&self) -> Decimal {
        let mut value = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        value.rescale(2);
        value
    }

    /// This price multiplied by a line quantity.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// The rounded amount in minor units, as payment gateways expect it.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::OutOfRange`] if the amount does not fit in `i64`.
    pub fn minor_units(&self) -> Result<i64, PriceError> {
        let cents = self.rounded() * Decimal::ONE_HUNDRED;
        i64::try_from(cents.trunc()).map_err(|_| PriceError::OutOfRange)
    }

    /// Whether the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rounded())
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim()).map_err(|_| PriceError::Invalid(s.to_owned()))?;
        Self::new(amount)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl std::ops::Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, price| acc + price)
    }
}
