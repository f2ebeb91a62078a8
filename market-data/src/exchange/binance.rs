//! Binance spot/futures connector: request envelope construction, subscription-id correlation,
//! and wire-format parsing for klines, (aggregate) trades, differential depth and book tickers.
//!
//! Wire field names below (`e`, `E`, `s`, `k`, ...) are Binance's own abbreviations, kept as-is
//! rather than translated, matching how every exchange connector in this engine mirrors the
//! venue's documented stream schema.

use super::{Connector, ExchangeMessage};
use crate::event::{BookTicker, Candle, CandleError, Level, OrderBookSnapshot, Trade};
use crate::subscription::{stream_name, SubKind, Subscription, SubscriptionMeta};
use chrono::{DateTime, TimeZone, Utc};
use market_instrument::{ExchangeId, Interval, Price, Quantity, Symbol};
use market_integration::error::SocketError;
use market_integration::protocol::websocket::WsMessage;
use market_integration::subscription::Map as SubMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const WS_BASE_URL: &str = "wss://stream.binance.com:9443/stream";
const REST_BASE_URL: &str = "https://api.binance.com";

#[derive(Debug, Clone, Copy, Default)]
pub struct BinanceConnector;

impl Connector for BinanceConnector {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    fn ws_url(&self) -> &str {
        WS_BASE_URL
    }

    fn subscribe_frames(&self, subs: &[Subscription], next_id: &mut u64) -> SubscriptionMeta {
        let mut params = Vec::with_capacity(subs.len());
        let mut map = SubMap::new();
        for sub in subs {
            let id = stream_name(&sub.symbol, sub.kind);
            params.push(id.as_str().to_string());
            map.insert(id, sub.clone());
        }

        *next_id += 1;
        let request = BinanceSubRequest {
            method: "SUBSCRIBE",
            params,
            id: *next_id,
        };

        let frame = WsMessage::Text(
            serde_json::to_string(&request).expect("BinanceSubRequest always serializes"),
        );
        SubscriptionMeta::new(vec![frame], map)
    }

    fn historical_klines_url(&self, symbol: &Symbol, interval: Interval, limit: u32) -> String {
        format!(
            "{REST_BASE_URL}/api/v3/klines?symbol={}&interval={interval}&limit={}",
            symbol.as_str(),
            limit.min(1000),
        )
    }

    fn historical_klines_range_url(
        &self,
        symbol: &Symbol,
        interval: Interval,
        start_ms: i64,
        end_ms: i64,
    ) -> String {
        format!(
            "{REST_BASE_URL}/api/v3/klines?symbol={}&interval={interval}&startTime={start_ms}&endTime={end_ms}&limit=1000",
            symbol.as_str(),
        )
    }

    fn parse(&self, payload: &str) -> Result<Vec<ExchangeMessage>, SocketError> {
        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|error| SocketError::ParseError(error.to_string()))?;

        // Combined-stream envelopes wrap the real payload under "data"; single-stream
        // connections deliver the payload directly.
        let value = value.get("data").cloned().unwrap_or(value);

        match value.get("id") {
            Some(_) if value.get("e").is_none() => return Ok(vec![ExchangeMessage::SubscriptionAck]),
            _ => {}
        }

        let event_type = value.get("e").and_then(|v| v.as_str());
        match event_type {
            Some("kline") => {
                let event: BinanceCandleEvent = serde_json::from_value(value)
                    .map_err(|error| SocketError::ParseError(error.to_string()))?;
                let symbol = Symbol::new(&event.symbol);
                let candle = event
                    .into_candle()
                    .map_err(|error| SocketError::ParseError(error.to_string()))?;
                Ok(vec![ExchangeMessage::Candle { symbol, candle }])
            }
            Some("aggTrade") | Some("trade") => {
                let event: BinanceTradeEvent = serde_json::from_value(value)
                    .map_err(|error| SocketError::ParseError(error.to_string()))?;
                let symbol = Symbol::new(&event.symbol);
                Ok(vec![ExchangeMessage::Trade { symbol, trade: event.into() }])
            }
            Some("depthUpdate") => {
                let event: BinanceDepthEvent = serde_json::from_value(value)
                    .map_err(|error| SocketError::ParseError(error.to_string()))?;
                let symbol = Symbol::new(&event.symbol);
                Ok(vec![ExchangeMessage::OrderBook { symbol, book: event.into() }])
            }
            None if value.get("u").is_some() && value.get("b").is_some() && value.get("A").is_some() => {
                let event: BinanceBookTickerEvent = serde_json::from_value(value)
                    .map_err(|error| SocketError::ParseError(error.to_string()))?;
                let symbol = Symbol::new(&event.symbol);
                Ok(vec![ExchangeMessage::BookTicker { symbol, ticker: event.into() }])
            }
            _ => Err(SocketError::Unidentifiable),
        }
    }

    fn parse_historical_klines(&self, body: &str, interval: Interval) -> Result<Vec<Candle>, SocketError> {
        let rows: Vec<BinanceRestKline> = serde_json::from_str(body)
            .map_err(|error| SocketError::ParseError(error.to_string()))?;
        rows.into_iter()
            .map(|row| row.into_candle(interval))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| SocketError::ParseError(error.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct BinanceSubRequest {
    method: &'static str,
    params: Vec<String>,
    id: u64,
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
}

/// Individual/aggregate trade stream payload (`e: "trade" | "aggTrade"`).
#[derive(Debug, Clone, Deserialize)]
struct BinanceTradeEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "a")]
    trade_id: u64,
    #[serde(rename = "p")]
    price: Price,
    #[serde(rename = "q")]
    quantity: Quantity,
    #[serde(rename = "T")]
    trade_time: i64,
    #[serde(rename = "m")]
    buyer_is_maker: bool,
    #[serde(rename = "f")]
    first_trade_id: Option<u64>,
    #[serde(rename = "l")]
    last_trade_id: Option<u64>,
}

impl From<BinanceTradeEvent> for Trade {
    fn from(event: BinanceTradeEvent) -> Self {
        let quote_quantity = Quantity::new(event.price.inner() * event.quantity.inner());
        let aggregate_range = match (event.first_trade_id, event.last_trade_id) {
            (Some(first), Some(last)) if first != last => Some((first, last)),
            _ => None,
        };
        Trade {
            id: event.trade_id,
            price: event.price,
            quantity: event.quantity,
            quote_quantity,
            time: millis_to_datetime(event.trade_time),
            buyer_is_maker: event.buyer_is_maker,
            aggregate_range,
        }
    }
}

/// Kline/candlestick stream payload (`e: "kline"`).
#[derive(Debug, Clone, Deserialize)]
struct BinanceCandleEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "k")]
    kline: BinanceCandleData,
}

#[derive(Debug, Clone, Deserialize)]
struct BinanceCandleData {
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "T")]
    close_time: i64,
    #[serde(rename = "i")]
    interval: String,
    #[serde(rename = "o")]
    open: Price,
    #[serde(rename = "h")]
    high: Price,
    #[serde(rename = "l")]
    low: Price,
    #[serde(rename = "c")]
    close: Price,
    #[serde(rename = "v")]
    base_volume: Quantity,
    #[serde(rename = "q")]
    quote_volume: Quantity,
    #[serde(rename = "n")]
    trade_count: u64,
    #[serde(rename = "x")]
    closed: bool,
}

impl BinanceCandleEvent {
    fn into_candle(self) -> Result<Candle, CandleError> {
        let kline = self.kline;
        let interval = Interval::from_str(&kline.interval).unwrap_or(Interval::OneMinute);
        Candle::new(
            interval,
            millis_to_datetime(kline.open_time),
            millis_to_datetime(kline.close_time),
            kline.open,
            kline.high,
            kline.low,
            kline.close,
            kline.base_volume,
            kline.quote_volume,
            kline.trade_count,
            kline.closed,
        )
    }
}

/// Differential depth stream payload (`e: "depthUpdate"`).
#[derive(Debug, Clone, Deserialize)]
struct BinanceDepthEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "E")]
    event_time: i64,
    #[serde(rename = "u")]
    last_update_id: u64,
    #[serde(rename = "b")]
    bids: Vec<BinanceLevel>,
    #[serde(rename = "a")]
    asks: Vec<BinanceLevel>,
}

impl From<BinanceDepthEvent> for OrderBookSnapshot {
    fn from(event: BinanceDepthEvent) -> Self {
        OrderBookSnapshot {
            update_id: event.last_update_id,
            time: millis_to_datetime(event.event_time),
            bids: event.bids.into_iter().map(Into::into).collect(),
            asks: event.asks.into_iter().map(Into::into).collect(),
        }
    }
}

/// Book-ticker stream payload — carries no `e` discriminator on Binance's wire format.
#[derive(Debug, Clone, Deserialize)]
struct BinanceBookTickerEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "b")]
    best_bid_price: Price,
    #[serde(rename = "B")]
    best_bid_quantity: Quantity,
    #[serde(rename = "a")]
    best_ask_price: Price,
    #[serde(rename = "A")]
    best_ask_quantity: Quantity,
}

impl From<BinanceBookTickerEvent> for BookTicker {
    fn from(event: BinanceBookTickerEvent) -> Self {
        BookTicker {
            best_bid_price: event.best_bid_price,
            best_bid_quantity: event.best_bid_quantity,
            best_ask_price: event.best_ask_price,
            best_ask_quantity: event.best_ask_quantity,
        }
    }
}

/// A `[price, quantity]` pair as Binance represents depth levels on the wire.
#[derive(Debug, Clone, Deserialize)]
struct BinanceLevel(Price, Quantity);

impl From<BinanceLevel> for Level {
    fn from(level: BinanceLevel) -> Self {
        Level { price: level.0, quantity: level.1 }
    }
}

/// One row of the REST `/api/v3/klines` response array:
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume, trades, ...]`.
#[derive(Debug, Clone, Deserialize)]
struct BinanceRestKline(
    i64,
    #[serde(deserialize_with = "decimal_from_str")] Price,
    #[serde(deserialize_with = "decimal_from_str")] Price,
    #[serde(deserialize_with = "decimal_from_str")] Price,
    #[serde(deserialize_with = "decimal_from_str")] Price,
    #[serde(deserialize_with = "decimal_from_str")] Quantity,
    i64,
    #[serde(deserialize_with = "decimal_from_str")] Quantity,
    u64,
    serde_json::Value,
    serde_json::Value,
    serde_json::Value,
);

fn decimal_from_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: From<rust_decimal::Decimal>,
{
    let raw = String::deserialize(deserializer)?;
    rust_decimal::Decimal::from_str(&raw)
        .map(T::from)
        .map_err(serde::de::Error::custom)
}

impl BinanceRestKline {
    fn into_candle(self, interval: Interval) -> Result<Candle, CandleError> {
        Candle::new(
            interval,
            millis_to_datetime(self.0),
            millis_to_datetime(self.6),
            self.1,
            self.2,
            self.3,
            self.4,
            self.5,
            self.7,
            self.8,
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kline_event() {
        let payload = r#"{
            "e":"kline","E":123456789,"s":"BTCUSDT",
            "k":{"t":1,"T":60000,"s":"BTCUSDT","i":"1m","f":1,"L":5,
                 "o":"100.00","c":"101.00","h":"102.00","l":"99.00",
                 "v":"10.0","n":5,"x":true,"q":"1000.0","V":"5.0","qv":"500.0"}
        }"#;
        let connector = BinanceConnector;
        let messages = connector.parse(payload).unwrap();
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            ExchangeMessage::Candle { symbol, candle } => {
                assert_eq!(symbol.as_str(), "BTCUSDT");
                assert!(candle.closed);
            }
            other => panic!("expected Candle, got {other:?}"),
        }
    }

    #[test]
    fn parses_subscription_ack() {
        let connector = BinanceConnector;
        let messages = connector.parse(r#"{"result":null,"id":1}"#).unwrap();
        assert_eq!(messages, vec![ExchangeMessage::SubscriptionAck]);
    }

    #[test]
    fn rejects_unrecognised_payload() {
        let connector = BinanceConnector;
        assert!(connector.parse(r#"{"foo":"bar"}"#).is_err());
    }

    #[test]
    fn parses_rest_klines() {
        let body = r#"[[1,"100.0","102.0","99.0","101.0","10.0",60000,"1000.0",5,"0","0","0"]]"#;
        let connector = BinanceConnector;
        let candles = connector.parse_historical_klines(body, Interval::OneMinute).unwrap();
        assert_eq!(candles.len(), 1);
        assert!(candles[0].closed);
    }
}
