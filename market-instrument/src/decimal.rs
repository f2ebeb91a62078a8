//! Fixed-scale decimal newtypes for price and quantity fields.
//!
//! Every price/quantity crossing a crate boundary in this engine is exact
//! `rust_decimal::Decimal` arithmetic rescaled to [`DECIMAL_SCALE`] places,
//! never `f64` — avoids the binary-floating-point drift that would otherwise
//! accumulate across thousands of candle updates.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

/// Scale every [`Price`] and [`Quantity`] is rescaled to on construction.
pub const DECIMAL_SCALE: u32 = 8;

macro_rules! decimal_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash, Deserialize, Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(Decimal);

        impl $name {
            pub fn new(value: Decimal) -> Self {
                let mut rescaled = value;
                rescaled.rescale(DECIMAL_SCALE);
                Self(rescaled)
            }

            pub fn zero() -> Self {
                Self::new(Decimal::ZERO)
            }

            pub fn inner(&self) -> Decimal {
                self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.is_zero()
            }
        }

        impl From<Decimal> for $name {
            fn from(value: Decimal) -> Self {
                Self::new(value)
            }
        }

        impl FromStr for $name {
            type Err = rust_decimal::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Decimal::from_str(s).map(Self::new)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self::new(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self::new(self.0 - rhs.0)
            }
        }

        impl Mul for $name {
            type Output = Self;
            fn mul(self, rhs: Self) -> Self {
                Self::new(self.0 * rhs.0)
            }
        }

        impl Div for $name {
            type Output = Self;
            fn div(self, rhs: Self) -> Self {
                Self::new(self.0 / rhs.0)
            }
        }
    };
}

decimal_newtype!(Price);
decimal_newtype!(Quantity);

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rescales_to_fixed_scale() {
        let price = Price::new(dec!(100));
        assert_eq!(price.inner().scale(), DECIMAL_SCALE);
    }

    #[test]
    fn arithmetic_stays_exact() {
        let a = Price::new(dec!(0.1));
        let b = Price::new(dec!(0.2));
        assert_eq!((a + b).inner(), Decimal::new(30000000, DECIMAL_SCALE));
    }

    #[test]
    fn parses_from_str() {
        let qty: Quantity = "1.5".parse().unwrap();
        assert_eq!(qty.inner(), Decimal::new(150000000, DECIMAL_SCALE));
    }
}
