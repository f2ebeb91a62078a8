//! Trade/order side.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Which side of the book a trade or order sits on.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize,
)]
pub enum Side {
    #[display("buy")]
    Buy,
    #[display("sell")]
    Sell,
}

impl Side {
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    /// Flips the side, used when deriving taker/maker perspective from a
    /// trade's reported aggressor side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_flips() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }
}
