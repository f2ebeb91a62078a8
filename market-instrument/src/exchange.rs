//! Exchange identifiers for the market-data engine.
//!
//! Generalised from a Brazilian-equities-only enumeration into the set of
//! crypto venues this engine actually streams from, keeping the classification
//! helpers (`is_crypto`, `is_test`) and `FromStr`/`Display` shape.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Identifies a trading venue the provider layer can connect to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum ExchangeId {
    /// Binance spot/futures market data.
    Binance,
    /// Coinbase Advanced Trade market data.
    Coinbase,
    /// OKX market data.
    Okx,
    /// Bybit market data.
    Bybit,
    /// BitMEX market data.
    Bitmex,
    /// Kraken market data.
    Kraken,
    /// Huobi / HTX market data.
    Huobi,
    /// KuCoin market data.
    Kucoin,
    /// Gate.io market data.
    GateIo,
    /// Bitfinex market data.
    Bitfinex,
    /// Deterministic in-memory exchange used by tests and examples.
    Mock,
}

impl ExchangeId {
    /// Every venue configured here streams crypto market data; kept for
    /// symmetry with the teacher's classification helpers and for future
    /// non-crypto venues.
    pub fn is_crypto(&self) -> bool {
        !matches!(self, ExchangeId::Mock)
    }

    /// True for the deterministic test/example exchange.
    pub fn is_test(&self) -> bool {
        matches!(self, ExchangeId::Mock)
    }

    /// Canonical upper-case string representation, used in instance keys and
    /// push envelopes.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "BINANCE",
            ExchangeId::Coinbase => "COINBASE",
            ExchangeId::Okx => "OKX",
            ExchangeId::Bybit => "BYBIT",
            ExchangeId::Bitmex => "BITMEX",
            ExchangeId::Kraken => "KRAKEN",
            ExchangeId::Huobi => "HUOBI",
            ExchangeId::Kucoin => "KUCOIN",
            ExchangeId::GateIo => "GATEIO",
            ExchangeId::Bitfinex => "BITFINEX",
            ExchangeId::Mock => "MOCK",
        }
    }
}

impl FromStr for ExchangeId {
    type Err = UnknownExchange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BINANCE" => Ok(ExchangeId::Binance),
            "COINBASE" => Ok(ExchangeId::Coinbase),
            "OKX" => Ok(ExchangeId::Okx),
            "BYBIT" => Ok(ExchangeId::Bybit),
            "BITMEX" => Ok(ExchangeId::Bitmex),
            "KRAKEN" => Ok(ExchangeId::Kraken),
            "HUOBI" | "HTX" => Ok(ExchangeId::Huobi),
            "KUCOIN" => Ok(ExchangeId::Kucoin),
            "GATEIO" | "GATE.IO" => Ok(ExchangeId::GateIo),
            "BITFINEX" => Ok(ExchangeId::Bitfinex),
            "MOCK" => Ok(ExchangeId::Mock),
            other => Err(UnknownExchange(other.to_string())),
        }
    }
}

/// Raised when a configuration or request names an unrecognised exchange.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown exchange: {0}")]
pub struct UnknownExchange(pub String);

impl Display for ExchangeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        s.parse().unwrap_or(ExchangeId::Mock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_crypto_and_test_exchanges() {
        assert!(ExchangeId::Binance.is_crypto());
        assert!(!ExchangeId::Binance.is_test());
        assert!(!ExchangeId::Mock.is_crypto());
        assert!(ExchangeId::Mock.is_test());
    }

    #[test]
    fn round_trips_through_string() {
        assert_eq!(ExchangeId::from_str("binance").unwrap(), ExchangeId::Binance);
        assert_eq!(ExchangeId::Binance.to_string(), "BINANCE");
        assert!(ExchangeId::from_str("not-a-venue").is_err());
    }
}
