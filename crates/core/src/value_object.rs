//! Value objects: equality by value, not identity.

use serde::{Deserialize, Serialize};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two `Money`
/// amounts of 200 are the same amount, whereas two items with equal fields but
/// different ids are different items.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// An amount of money in the smallest currency unit (e.g. cents).
///
/// Integer minor units keep sale totals exact. All arithmetic is checked;
/// callers turn `None` into a validation failure.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(amount: u64) -> Self {
        Self(amount)
    }

    pub fn minor_units(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Multiply by a quantity (line total, stock valuation).
    pub fn checked_mul(self, quantity: u64) -> Option<Money> {
        self.0.checked_mul(quantity).map(Money)
    }
}

/// Currency used to render amounts for humans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// ISO currency code (e.g. "EUR").
    pub code: String,
    /// Number of minor-unit digits (2 for cents).
    pub minor_units: u32,
}

impl ValueObject for Currency {}

impl Default for Currency {
    fn default() -> Self {
        Self {
            code: "EUR".to_string(),
            minor_units: 2,
        }
    }
}

impl Currency {
    /// Render `amount` as `"<units>.<fraction> <code>"`.
    pub fn format(&self, amount: Money) -> String {
        let raw = amount.minor_units();
        if self.minor_units == 0 {
            return format!("{raw} {}", self.code);
        }
        let scale = 10u64.saturating_pow(self.minor_units);
        let width = self.minor_units as usize;
        format!(
            "{}.{:0width$} {}",
            raw / scale,
            raw % scale,
            self.code,
            width = width
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_is_compared_by_value() {
        assert_eq!(Money::from_minor(200), Money::from_minor(200));
        assert_ne!(Money::from_minor(200), Money::from_minor(201));
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        assert_eq!(
            Money::from_minor(100).checked_mul(2),
            Some(Money::from_minor(200))
        );
        assert_eq!(Money::from_minor(u64::MAX).checked_mul(2), None);
        assert_eq!(Money::from_minor(u64::MAX).checked_add(Money::from_minor(1)), None);
    }

    #[test]
    fn currency_formats_minor_units() {
        let eur = Currency::default();
        assert_eq!(eur.format(Money::from_minor(150_000)), "1500.00 EUR");
        assert_eq!(eur.format(Money::from_minor(5)), "0.05 EUR");

        let yen = Currency {
            code: "JPY".to_string(),
            minor_units: 0,
        };
        assert_eq!(yen.format(Money::from_minor(1200)), "1200 JPY");
    }

    #[test]
    fn money_serializes_as_plain_integer() {
        let json = serde_json::to_string(&Money::from_minor(4250)).unwrap();
        assert_eq!(json, "4250");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn checked_ops_agree_with_u64(a in any::<u64>(), b in any::<u64>()) {
                prop_assert_eq!(
                    Money::from_minor(a).checked_add(Money::from_minor(b)).map(Money::minor_units),
                    a.checked_add(b)
                );
                prop_assert_eq!(
                    Money::from_minor(a).checked_mul(b).map(Money::minor_units),
                    a.checked_mul(b)
                );
            }

            #[test]
            fn formatted_amount_keeps_every_digit(amount in 0u64..1_000_000_000) {
                let eur = Currency::default();
                let rendered = eur.format(Money::from_minor(amount));
                let digits: String = rendered.chars().filter(char::is_ascii_digit).collect();
                prop_assert_eq!(digits.parse::<u64>().unwrap(), amount);
                prop_assert!(rendered.ends_with(" EUR"));
            }
        }
    }
}
