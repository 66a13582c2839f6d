//! Fixed-point money amounts.

use std::iter::Sum;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Money amount in the store currency.
///
/// Backed by a `Decimal` so that prices persist as `NUMERIC` and totals are
/// exact. Serializes as a decimal string (`"30.00"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Wraps a decimal amount.
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Creates an amount from minor units (cents).
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the underlying decimal amount.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is below zero.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money(self.0 * Decimal::from(quantity))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rounded = self.0.abs().round_dp(2);
        if self.is_negative() {
            write!(f, "-${rounded:.2}")
        } else {
            write!(f, "${rounded:.2}")
        }
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_cents_keeps_two_decimal_places() {
        let money = Money::from_cents(1234);
        assert_eq!(money.amount(), Decimal::new(1234, 2));
        assert_eq!(money.to_string(), "$12.34");
    }

    #[test]
    fn display_pads_and_signs() {
        assert_eq!(Money::from_cents(100).to_string(), "$1.00");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn multiply_and_sum_are_exact() {
        let price = Money::from_cents(1999);
        assert_eq!(price.multiply(3), Money::from_cents(5997));

        let total: Money = [Money::from_cents(10), Money::from_cents(20)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(30));
    }

    #[test]
    fn equality_ignores_scale() {
        assert_eq!(Money::new(Decimal::new(30, 0)), Money::from_cents(3000));
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_string(&Money::from_cents(3000)).unwrap();
        assert_eq!(json, "\"30.00\"");

        let parsed: Money = serde_json::from_str("\"10.50\"").unwrap();
        assert_eq!(parsed, Money::from_cents(1050));
    }

    #[test]
    fn sign_checks() {
        assert!(Money::zero().is_zero());
        assert!(!Money::zero().is_negative());
        assert!(Money::from_cents(-1).is_negative());
    }
}
