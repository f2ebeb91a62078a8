//! Engine-wide configuration: which exchange connectors to run, which symbols/intervals to
//! subscribe to on startup, and the sizing/accounting knobs the rest of the system is built
//! from. Deserializable from TOML so a deployment can ship a config file rather than recompile,
//! mirroring the teacher's `SystemConfig` (`core/src/system/config.rs`).

use market_instrument::{Interval, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One exchange connector to run, and what it should subscribe to once connected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name the provider is registered under, e.g. `"binance"`.
    pub name: String,
    pub symbols: Vec<Symbol>,
    pub intervals: Vec<Interval>,
    /// Whether to also subscribe to the trade and book-ticker streams for every symbol, feeding
    /// the footprint aggregator and tick-driven indicators in addition to candles.
    #[serde(default = "default_true")]
    pub trades: bool,
    #[serde(default = "default_true")]
    pub book_ticker: bool,
}

fn default_true() -> bool {
    true
}

/// Top-level engine configuration. `Default` gives a usable but empty configuration (no
/// providers registered) — a deployment is expected to supply its own provider list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub providers: Vec<ProviderConfig>,

    /// Closed candles retained per (exchange, symbol, interval) key in [`market_history::CandleHistoryStore`].
    pub history_bound: usize,

    /// Bars retained per (exchange, symbol, interval) key in [`market_history::FootprintAggregator`].
    pub footprint_bound_bars: usize,

    /// Rows requested per historical-klines REST backfill call.
    pub backfill_limit: u32,

    /// Starting balance the bot's simulated account is seeded with.
    pub starting_balance: Decimal,

    /// Whether the bot executes risk-approved orders or only logs them (spec §4.7
    /// "analysis-only mode" is the safer default for an unconfigured deployment).
    #[serde(default)]
    pub trading_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            history_bound: market_history::DEFAULT_BOUND,
            footprint_bound_bars: market_history::footprint::DEFAULT_RETAINED_BARS,
            backfill_limit: 500,
            starting_balance: Decimal::new(10_000, 0),
            trading_enabled: false,
        }
    }
}

impl EngineConfig {
    /// Parses a TOML document into an [`EngineConfig`]. Missing fields fall back to
    /// [`EngineConfig::default`] via `#[serde(default)]`.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(ConfigError::Parse)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_providers_and_safe_defaults() {
        let config = EngineConfig::default();
        assert!(config.providers.is_empty());
        assert!(!config.trading_enabled);
        assert_eq!(config.history_bound, market_history::DEFAULT_BOUND);
    }

    #[test]
    fn parses_minimal_toml() {
        let toml = r#"
            trading_enabled = true

            [[providers]]
            name = "binance"
            symbols = ["BTCUSDT", "ETHUSDT"]
            intervals = ["OneMinute"]
        "#;
        let config = EngineConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].name, "binance");
        assert_eq!(config.providers[0].symbols.len(), 2);
        assert!(config.trading_enabled);
        assert!(config.providers[0].trades);
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(EngineConfig::from_toml_str("not valid toml = [").is_err());
    }
}
