//! Normalized market-data event types. Every exchange connector converts its wire format into
//! these before anything downstream (history store, footprint aggregator, indicator dispatcher)
//! ever sees it — the rest of the engine is exchange-agnostic.

use chrono::{DateTime, Utc};
use market_instrument::{ExchangeId, Interval, Price, Quantity, Symbol};
use serde::{Deserialize, Serialize};

/// Envelope wrapping a normalized payload with the exchange/symbol/time it was observed at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent<T> {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    pub time: DateTime<Utc>,
    pub kind: T,
}

impl<T> MarketEvent<T> {
    pub fn new(exchange: ExchangeId, symbol: Symbol, time: DateTime<Utc>, kind: T) -> Self {
        Self { exchange, symbol, time, kind }
    }
}

/// The normalized payload kinds a [`crate::provider::MarketDataProvider`] forwards to its
/// handler. Every downstream consumer (history store, footprint aggregator, indicator
/// dispatcher, broadcast layer) matches on this rather than on an exchange-specific type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEventKind {
    Candle(Candle),
    Trade(Trade),
    OrderBook(OrderBookSnapshot),
    BookTicker(BookTicker),
}

/// Raised when a [`Candle`] is constructed with an invariant violation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CandleError {
    #[error("open-time {open_time} is not strictly before close-time {close_time}")]
    NonMonotonicTime {
        open_time: DateTime<Utc>,
        close_time: DateTime<Utc>,
    },
    #[error("high/low out of range: low={low} high={high} open={open} close={close}")]
    OutOfRange {
        low: Price,
        high: Price,
        open: Price,
        close: Price,
    },
}

/// A candlestick bar. Emitted repeatedly while open (monotonic high/low/close revisions), with
/// a final emission carrying `closed = true`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub interval: Interval,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub base_volume: Quantity,
    pub quote_volume: Quantity,
    pub trade_count: u64,
    pub closed: bool,
}

impl Candle {
    /// Validates the two invariants spelled out for candles: `open_time < close_time` and
    /// `low <= min(open,close) <= max(open,close) <= high`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        interval: Interval,
        open_time: DateTime<Utc>,
        close_time: DateTime<Utc>,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        base_volume: Quantity,
        quote_volume: Quantity,
        trade_count: u64,
        closed: bool,
    ) -> Result<Self, CandleError> {
        if open_time >= close_time {
            return Err(CandleError::NonMonotonicTime { open_time, close_time });
        }
        let body_low = open.min(close);
        let body_high = open.max(close);
        if low > body_low || body_high > high {
            return Err(CandleError::OutOfRange { low, high, open, close });
        }
        Ok(Self {
            interval,
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            base_volume,
            quote_volume,
            trade_count,
            closed,
        })
    }
}

/// A single executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub price: Price,
    pub quantity: Quantity,
    pub quote_quantity: Quantity,
    pub time: DateTime<Utc>,
    pub buyer_is_maker: bool,
    /// First/last trade id this record aggregates over, for aggregate-trade streams.
    pub aggregate_range: Option<(u64, u64)>,
}

impl Trade {
    /// The taker crossed the spread buying, i.e. the trade was not a passive sell fill.
    pub fn is_aggressive_buy(&self) -> bool {
        !self.buyer_is_maker
    }
}

/// A single price level in an order-book side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: Price,
    pub quantity: Quantity,
}

/// A full or differential order-book snapshot: bids ordered descending by price, asks ordered
/// ascending by price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub update_id: u64,
    pub time: DateTime<Utc>,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<Level> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<Level> {
        self.asks.first().copied()
    }

    pub fn spread(&self) -> Option<Price> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some(ask.price - bid.price)
    }

    /// Sum of quantity across the first `depth` bid levels.
    pub fn cumulative_bid_volume(&self, depth: usize) -> Quantity {
        self.bids
            .iter()
            .take(depth)
            .fold(Quantity::zero(), |acc, level| acc + level.quantity)
    }

    /// Sum of quantity across the first `depth` ask levels.
    pub fn cumulative_ask_volume(&self, depth: usize) -> Quantity {
        self.asks
            .iter()
            .take(depth)
            .fold(Quantity::zero(), |acc, level| acc + level.quantity)
    }
}

/// Best bid/ask snapshot without full depth, as streamed by the exchange's book-ticker feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookTicker {
    pub best_bid_price: Price,
    pub best_bid_quantity: Quantity,
    pub best_ask_price: Price,
    pub best_ask_quantity: Quantity,
}
