//! Trading-pair symbol newtype.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A trading-pair symbol as quoted by the exchange, e.g. `BTCUSDT`.
///
/// Stored uppercase so that provider-specific casing (Binance streams use
/// lowercase stream names) never leaks into keys used by the history store,
/// indicator instances or broadcast filters.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Symbol(SmolStr);

impl Symbol {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(SmolStr::new(raw.as_ref().to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Lowercase form used to build exchange stream names (`btcusdt@kline_1m`).
    pub fn to_lowercase(&self) -> String {
        self.0.to_lowercase()
    }
}

impl<S: AsRef<str>> From<S> for Symbol {
    fn from(raw: S) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_to_uppercase() {
        assert_eq!(Symbol::new("btcusdt").as_str(), "BTCUSDT");
        assert_eq!(Symbol::new("BTCUSDT").to_lowercase(), "btcusdt");
    }
}
