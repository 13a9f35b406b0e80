//! Monetary amounts in minor units.

use core::iter::Sum;
use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// An amount in the smallest currency unit (e.g. cents).
///
/// A cart is single-currency, so `Money` carries no currency code. Arithmetic
/// saturates instead of wrapping; callers that care can check
/// [`Money::is_saturated`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(amount: u64) -> Self {
        Self(amount)
    }

    pub const fn minor_units(self) -> u64 {
        self.0
    }

    /// `self × quantity`, saturating at `u64::MAX`.
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(u64::from(quantity)))
    }

    pub fn saturating_add(self, other: Money) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn is_saturated(self) -> bool {
        self.0 == u64::MAX
    }
}

impl ValueObject for Money {}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Money::saturating_add)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl From<u64> for Money {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_and_sum() {
        let total: Money = [Money::from_minor(250).times(2), Money::from_minor(99)]
            .into_iter()
            .sum();
        assert_eq!(total.minor_units(), 599);
        assert_eq!(total.to_string(), "5.99");
    }

    #[test]
    fn arithmetic_saturates() {
        let big = Money::from_minor(u64::MAX / 2 + 1);
        assert!(big.times(2).is_saturated());
        assert!(big.saturating_add(big).is_saturated());
    }
}
