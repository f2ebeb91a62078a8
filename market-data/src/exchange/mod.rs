//! Exchange-specific connectors: each implements [`Connector`] to turn [`Subscription`]s into
//! outbound frames and raw WebSocket/REST payloads into normalized [`crate::event`] types.

use crate::event::{BookTicker, Candle, OrderBookSnapshot, Trade};
use crate::subscription::{Subscription, SubscriptionMeta};
use market_instrument::{ExchangeId, Interval, Symbol};
use market_integration::error::SocketError;

pub mod binance;

/// One normalized event a connector can yield from an inbound WebSocket frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeMessage {
    Candle { symbol: Symbol, candle: Candle },
    Trade { symbol: Symbol, trade: Trade },
    OrderBook { symbol: Symbol, book: OrderBookSnapshot },
    BookTicker { symbol: Symbol, ticker: BookTicker },
    /// Reply to a subscribe/unsubscribe request, carrying no market data.
    SubscriptionAck,
}

/// Exchange-specific wire format translation, implemented once per venue.
pub trait Connector {
    /// Identity of the venue this connector talks to.
    fn id(&self) -> ExchangeId;

    /// Base WebSocket URL to connect to before any subscriptions are sent.
    fn ws_url(&self) -> &str;

    /// Builds the outbound subscribe frames and [`SubscriptionId`](market_integration::subscription::SubscriptionId)
    /// correlation map for a batch of subscriptions, using `next_id` to assign each request a
    /// monotonically increasing id.
    fn subscribe_frames(&self, subs: &[Subscription], next_id: &mut u64) -> SubscriptionMeta;

    /// Builds the REST URL for a historical-klines request bounded by `limit`.
    fn historical_klines_url(&self, symbol: &Symbol, interval: Interval, limit: u32) -> String;

    /// Builds the REST URL for a historical-klines request bounded by a start/end time range
    /// (both epoch milliseconds).
    fn historical_klines_range_url(
        &self,
        symbol: &Symbol,
        interval: Interval,
        start_ms: i64,
        end_ms: i64,
    ) -> String;

    /// Parses one inbound WebSocket text payload into zero or more normalized messages.
    fn parse(&self, payload: &str) -> Result<Vec<ExchangeMessage>, SocketError>;

    /// Parses a REST historical-klines JSON array response into closed candles.
    fn parse_historical_klines(&self, body: &str, interval: Interval) -> Result<Vec<Candle>, SocketError>;
}
