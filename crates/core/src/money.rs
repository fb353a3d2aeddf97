use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Signed ledger amount. Arithmetic is exact; nothing is rounded until it is
/// displayed or baked into a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn new(decimal: Decimal) -> Self {
        Money(decimal)
    }

    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, 2))
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn decimal(self) -> Decimal {
        self.0
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    pub fn min(self, other: Self) -> Self {
        if other < self {
            other
        } else {
            self
        }
    }

    /// Rounded to cents, for display and key building.
    pub fn rounded(self) -> Self {
        Money(self.0.round_dp(2))
    }

    /// `|self - other| <= tolerance`.
    pub fn is_within(self, other: Money, tolerance: Money) -> bool {
        (self.0 - other.0).abs() <= tolerance.0
    }

    /// Strictly above the tolerance; anything at or below it counts as settled.
    pub fn exceeds(self, tolerance: Money) -> bool {
        self.0 > tolerance.0
    }

    /// `self / other`, or `None` when `other` is zero.
    pub fn ratio(self, other: Money) -> Option<Decimal> {
        if other.0.is_zero() {
            None
        } else {
            Some(self.0 / other.0)
        }
    }

    /// Two-decimal rendering with an explicit sign, as used in movement keys.
    pub fn signed_string(self) -> String {
        let r = self.0.round_dp(2);
        if r.is_sign_negative() && !r.is_zero() {
            format!("-{:.2}", r.abs())
        } else {
            format!("+{:.2}", r.abs())
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0.round_dp(2))
    }
}

impl From<Decimal> for Money {
    fn from(decimal: Decimal) -> Self {
        Money(decimal)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |a, b| a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_tolerance_is_inclusive() {
        let tol = Money::from_cents(1);
        assert!(Money::from_cents(10000).is_within(Money::from_cents(10001), tol));
        assert!(!Money::from_cents(10000).is_within(Money::from_cents(10002), tol));
    }

    #[test]
    fn exceeds_is_strict() {
        let tol = Money::from_cents(1);
        assert!(!Money::from_cents(1).exceeds(tol));
        assert!(Money::from_cents(2).exceeds(tol));
        assert!(!Money::from_cents(-500).exceeds(tol));
    }

    #[test]
    fn signed_string_has_explicit_sign() {
        assert_eq!(Money::from_cents(100000).signed_string(), "+1000.00");
        assert_eq!(Money::from_cents(-5050).signed_string(), "-50.50");
        assert_eq!(Money::zero().signed_string(), "+0.00");
    }

    #[test]
    fn ratio_guards_zero() {
        assert_eq!(Money::from_cents(100).ratio(Money::zero()), None);
        assert_eq!(
            Money::from_cents(100).ratio(Money::from_cents(200)),
            Some(Decimal::new(5, 1))
        );
    }

    #[test]
    fn sum_and_negation() {
        let total: Money = [Money::from_cents(300), Money::from_cents(-100)].into_iter().sum();
        assert_eq!(total, Money::from_cents(200));
        assert_eq!(-total, Money::from_cents(-200));
    }

    #[test]
    fn display_rounds_to_cents() {
        assert_eq!(Money::new(Decimal::new(100009, 3)).to_string(), "100.01");
    }
}
