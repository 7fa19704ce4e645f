//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are exact decimals in the store's single currency. There is no
//! currency conversion anywhere in the cart, so the type carries an amount
//! only.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A non-currency-converted monetary amount.
///
/// Serialized as a bare decimal (a string on output, while both strings and
/// JSON numbers are accepted on input). Use [`as_number`] where readers
/// expect a JSON number.
///
/// Arithmetic saturates at the bounds of [`Decimal`] instead of panicking.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// A zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an amount in cents (e.g. `4500` is `45.00`).
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(Decimal::from(quantity)))
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        format!("${:.2}", self.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim().trim_start_matches('$')).map(Self)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// Serde adapter that writes a [`Price`] as a JSON number.
///
/// For stored values shared with clients that read prices numerically.
/// Reading accepts numbers and strings, like [`Price`] itself.
pub mod as_number {
    use rust_decimal::prelude::ToPrimitive;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Price;

    /// # Errors
    ///
    /// Fails if the amount has no `f64` representation.
    pub fn serialize<S: Serializer>(price: &Price, serializer: S) -> Result<S::Ok, S::Error> {
        let value = price
            .0
            .to_f64()
            .ok_or_else(|| S::Error::custom(format!("price {} out of range", price.0)))?;
        serializer.serialize_f64(value)
    }

    /// # Errors
    ///
    /// Fails if the value is neither a decimal number nor a decimal string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Price, D::Error> {
        Price::deserialize(deserializer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_times() {
        assert_eq!(Price::from_cents(1050).times(3), Price::from_cents(3150));
        assert_eq!(Price::from_cents(1050).times(0), Price::ZERO);
    }

    #[test]
    fn test_times_saturates_on_overflow() {
        let huge: Price = "10000000000000000000000000".parse().unwrap();
        assert_eq!(huge.times(100_000), Price::new(Decimal::MAX));
        assert_eq!(Price::new(-huge.amount()).times(100_000), Price::new(Decimal::MIN));
    }

    #[test]
    fn test_sum_saturates_on_overflow() {
        let total: Price = [Price::new(Decimal::MAX), Price::from_cents(100)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::new(Decimal::MAX));
    }

    #[test]
    fn test_sum_of_empty_is_zero() {
        let total: Price = std::iter::empty().sum();
        assert_eq!(total, Price::ZERO);
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::from_cents(4500).display(), "$45.00");
        assert_eq!("19.5".parse::<Price>().unwrap().display(), "$19.50");
    }

    #[test]
    fn test_parse_accepts_dollar_prefix() {
        assert_eq!("$68.00".parse::<Price>().unwrap(), Price::from_cents(6800));
        assert!("sixty".parse::<Price>().is_err());
    }

    #[test]
    fn test_deserialize_number_and_string() {
        let from_number: Price = serde_json::from_str("45.5").unwrap();
        let from_string: Price = serde_json::from_str("\"45.50\"").unwrap();
        assert_eq!(from_number, from_string);
    }

    #[derive(Serialize, Deserialize)]
    struct Line {
        #[serde(with = "as_number")]
        price: Price,
    }

    #[test]
    fn test_as_number_writes_json_numbers() {
        let line = Line {
            price: Price::from_cents(4550),
        };
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["price"], 45.5);

        let line: Line = serde_json::from_str(&json.to_string()).unwrap();
        assert_eq!(line.price, Price::from_cents(4550));
        let line: Line = serde_json::from_str(r#"{"price":"19.99"}"#).unwrap();
        assert_eq!(line.price, Price::from_cents(1999));
    }
}
