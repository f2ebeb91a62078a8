//! The client-facing JSON push envelopes. Every outbound frame is serialized once per event
//! and fanned out to every session whose filters accept it (self-describing, per-type
//! discriminator — see module docs on [`crate::session`] for the fan-out itself).

use indicators::InstanceKey;
use market_instrument::Symbol;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// The order-flow/trading-data kinds a push envelope or a session filter can name. Distinct
/// from [`indicators::contract::DataType`]: that one governs indicator routing (and includes
/// `Kline`); this one is the client-visible discriminator on the wire.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedKind {
    Trade,
    AggregateTrade,
    OrderBook,
    BookTicker,
    /// Closed-candle push on the general trading endpoint. Never used as an order-flow filter
    /// value — the order-flow endpoint's data types are `{Trade, AggregateTrade, OrderBook,
    /// BookTicker}` only.
    Candlestick,
}

/// One outbound frame. Serialized with `#[serde(tag = "type")]` so every variant carries its
/// own `"type"` discriminator on the wire, matching the client protocol verbatim.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "connected")]
    Connected { message: String, #[serde(rename = "supportedTypes")] supported_types: Vec<&'static str> },

    #[serde(rename = "orderFlow")]
    OrderFlow {
        #[serde(rename = "dataType")]
        data_type: FeedKind,
        symbol: Symbol,
        timestamp: i64,
        provider: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        trade: Option<Value>,
        #[serde(rename = "orderBook", skip_serializing_if = "Option::is_none")]
        order_book: Option<Value>,
    },

    #[serde(rename = "tradingData")]
    TradingData {
        #[serde(rename = "dataType")]
        data_type: FeedKind,
        symbol: Symbol,
        #[serde(skip_serializing_if = "Option::is_none")]
        candlestick: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        trade: Option<Value>,
        #[serde(rename = "orderBook", skip_serializing_if = "Option::is_none")]
        order_book: Option<Value>,
    },

    #[serde(rename = "indicatorUpdate")]
    IndicatorUpdate {
        #[serde(rename = "instanceKey")]
        instance_key: String,
        values: HashMap<String, Decimal>,
        #[serde(skip_serializing_if = "Option::is_none")]
        shapes: Option<Value>,
    },

    #[serde(rename = "indicatorTrade")]
    IndicatorTrade {
        #[serde(rename = "instanceKey")]
        instance_key: String,
        values: HashMap<String, Decimal>,
    },

    #[serde(rename = "indicatorOrderBook")]
    IndicatorOrderBook {
        #[serde(rename = "instanceKey")]
        instance_key: String,
        values: HashMap<String, Decimal>,
    },

    #[serde(rename = "replayUpdate")]
    ReplayUpdate {
        state: String,
        #[serde(rename = "currentIndex")]
        current_index: usize,
        #[serde(rename = "totalCandles")]
        total_candles: usize,
        progress: f64,
        speed: f64,
        candle: Value,
        indicators: Value,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

impl Envelope {
    pub fn welcome(supported_types: Vec<&'static str>) -> Self {
        Envelope::Connected {
            message: "connected to market data engine".to_string(),
            supported_types,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Envelope::Error { message: message.into() }
    }

    pub fn indicator_update(key: &InstanceKey, values: HashMap<String, Decimal>, shapes: Option<Value>) -> Self {
        Envelope::IndicatorUpdate { instance_key: key.to_string(), values, shapes }
    }

    /// Renders this envelope to a single JSON text frame. Cheap to call repeatedly: a
    /// [`crate::session::SessionRegistry`] fan-out serializes once and sends the same
    /// `Arc<str>` payload to every accepting session.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"error","message":"serialization failure"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_envelope_carries_type_discriminator() {
        let json = Envelope::welcome(vec!["TRADE", "ORDER_BOOK"]).to_json();
        assert!(json.contains(r#""type":"connected""#));
        assert!(json.contains("supportedTypes"));
    }

    #[test]
    fn error_envelope_round_trips_message() {
        let json = Envelope::error("Unknown action: frobnicate").to_json();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("Unknown action: frobnicate"));
    }
}
