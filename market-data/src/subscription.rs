//! Subscription types: what can be subscribed to, and the bookkeeping a provider needs to
//! multiplex many subscriptions over one connection and correlate inbound messages back to them.

use market_instrument::{ExchangeId, Interval, Symbol};
use market_integration::protocol::websocket::WsMessage;
use market_integration::subscription::{Map, SubscriptionId};
use serde::{Deserialize, Serialize};

/// The stream kinds a [`crate::provider::MarketDataProvider`] can subscribe to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum SubKind {
    /// Book-ticker best-bid/best-ask stream.
    Ticker,
    /// Candlestick stream at a given interval.
    Kline(Interval),
    /// Individual trade stream.
    Trade,
    /// Aggregate trade stream.
    AggTrade,
    /// Differential order-book depth stream.
    Depth,
    /// Best-bid/ask-only book-ticker stream (alias kept distinct from [`SubKind::Ticker`] to
    /// mirror the exchange's own `bookTicker` vs `!ticker` stream split).
    BookTicker,
}

/// One subscription request: which exchange, which symbol, which kind.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    pub kind: SubKind,
}

impl Subscription {
    pub fn new(exchange: ExchangeId, symbol: impl Into<Symbol>, kind: SubKind) -> Self {
        Self { exchange, symbol: symbol.into(), kind }
    }
}

/// Everything a provider needs to issue subscribe requests and later recognise the replies:
/// the outbound frames to send, and the [`SubscriptionId`]-to-`Subscription` correlation map.
#[derive(Debug, Clone)]
pub struct SubscriptionMeta {
    pub frames: Vec<WsMessage>,
    pub map: Map<Subscription>,
}

impl SubscriptionMeta {
    pub fn new(frames: Vec<WsMessage>, map: Map<Subscription>) -> Self {
        Self { frames, map }
    }
}

/// Derives the exchange-specific [`SubscriptionId`] (eg/ `"btcusdt@kline_1m"`) for a
/// subscription, used both to build outbound frames and to populate the correlation map.
pub fn stream_name(symbol: &Symbol, kind: SubKind) -> SubscriptionId {
    let lower = symbol.to_lowercase();
    let suffix = match kind {
        SubKind::Ticker => "ticker".to_string(),
        SubKind::Kline(interval) => format!("kline_{interval}"),
        SubKind::Trade => "trade".to_string(),
        SubKind::AggTrade => "aggTrade".to_string(),
        SubKind::Depth => "depth".to_string(),
        SubKind::BookTicker => "bookTicker".to_string(),
    };
    SubscriptionId::new(format!("{lower}@{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_name_matches_exchange_convention() {
        let symbol = Symbol::new("BTCUSDT");
        assert_eq!(
            stream_name(&symbol, SubKind::Kline(Interval::OneMinute)).as_str(),
            "btcusdt@kline_1m"
        );
        assert_eq!(stream_name(&symbol, SubKind::Trade).as_str(), "btcusdt@trade");
    }
}
