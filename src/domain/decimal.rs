//! Lossless decimal money type backed by rust_decimal.
//!
//! All amounts in the system flow through this wrapper: canonical string
//! round-trips for SQLite TEXT columns, and cent rounding for commission math.

use rust_decimal::{Decimal as RustDecimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lossless decimal amount for financial calculations.
///
/// Backed by rust_decimal to avoid floating-point drift.
/// Serializes to JSON number (not string) by default.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Format as a canonical string (no exponent notation, no trailing zeros).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Round to 2 decimal places, midpoint away from zero.
    ///
    /// This is the rounding applied to every persisted money amount.
    pub fn round_cents(&self) -> Self {
        Decimal(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// `self × rate / 100`, rounded to cents.
    ///
    /// Commission amounts are persisted at cent precision. Rounding each
    /// component (rather than only the total) keeps the ledger balanced:
    /// debit == sum(credits) to the cent.
    pub fn percent(&self, rate: Decimal) -> Self {
        Decimal(self.0 * rate.0 / RustDecimal::ONE_HUNDRED).round_cents()
    }

    pub fn from_i64(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }

    /// Absolute difference between two amounts.
    pub fn abs_diff(&self, other: Decimal) -> Decimal {
        Decimal((self.0 - other.0).abs())
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_roundtrip() {
        for s in ["123.456", "0.01", "1000000", "-42.5", "0"] {
            let d = Decimal::from_str_canonical(s).expect("parse failed");
            let reparsed = Decimal::from_str_canonical(&d.to_canonical_string()).unwrap();
            assert_eq!(d, reparsed, "roundtrip failed for {}", s);
        }
    }

    #[test]
    fn test_round_cents_midpoint_away_from_zero() {
        let d = Decimal::from_str_canonical("10.005").unwrap();
        assert_eq!(d.round_cents().to_canonical_string(), "10.01");

        let d = Decimal::from_str_canonical("-10.005").unwrap();
        assert_eq!(d.round_cents().to_canonical_string(), "-10.01");

        let d = Decimal::from_str_canonical("10.004").unwrap();
        assert_eq!(d.round_cents().to_canonical_string(), "10");
    }

    #[test]
    fn test_percent() {
        let amount = Decimal::from_i64(1000);
        let rate = Decimal::from_str_canonical("2.5").unwrap();
        assert_eq!(amount.percent(rate).to_canonical_string(), "25");

        let rate = Decimal::from_str_canonical("1").unwrap();
        assert_eq!(amount.percent(rate).to_canonical_string(), "10");
    }

    #[test]
    fn test_percent_rounds_to_cents() {
        // 333.33 × 2.5% = 8.33325 -> 8.33
        let amount = Decimal::from_str_canonical("333.33").unwrap();
        let rate = Decimal::from_str_canonical("2.5").unwrap();
        assert_eq!(amount.percent(rate).to_canonical_string(), "8.33");
    }

    #[test]
    fn test_is_positive() {
        assert!(Decimal::from_i64(1).is_positive());
        assert!(!Decimal::zero().is_positive());
        assert!(!Decimal::from_i64(-1).is_positive());
    }

    #[test]
    fn test_abs_diff() {
        let a = Decimal::from_str_canonical("10.02").unwrap();
        let b = Decimal::from_i64(10);
        assert_eq!(a.abs_diff(b).to_canonical_string(), "0.02");
        assert_eq!(b.abs_diff(a).to_canonical_string(), "0.02");
    }

    #[test]
    fn test_json_serializes_as_number() {
        let d = Decimal::from_str_canonical("123.45").unwrap();
        let json = serde_json::to_value(d).unwrap();
        assert!(json.is_number());
        assert_eq!(json.to_string(), "123.45");
    }
}
