//! The strategy contract (spec §4.7): every active strategy receives every normalized event and
//! may emit zero or more candidate orders. Per spec §1 strategy arithmetic itself is out of
//! scope — implementations here exist to exercise the event flow, not to be traded with.

use chrono::{DateTime, Utc};
use market_data::{Candle, MarketEvent, MarketEventKind};
use market_instrument::{ExchangeId, Price, Quantity, Side, Symbol};

/// How an [`OrderIntent`] should be filled against the simulated book.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OrderKind {
    Market,
    Limit,
}

/// A candidate order a [`Strategy`] would like placed, before risk review. Mirrors the
/// teacher's `OrderRequestOpen` shape, narrowed to what a pluggable consumer needs: no
/// exchange-specific routing, since order placement beyond this stub is out of scope (spec §1).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub strategy_id: &'static str,
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: Quantity,
    /// Reference price for a `Limit` intent; ignored for `Market` (filled at the account's last
    /// known price).
    pub price: Price,
    pub time: DateTime<Utc>,
}

/// Interface a pluggable trading strategy implements. Stateless by convention (the teacher's
/// `AlgoStrategy` doc: "same input always produces the same output") — any strategy tracking
/// its own history does so by reading back through its own state, not through the framework.
pub trait Strategy: Send + Sync {
    /// Unique identifier attached to every [`OrderIntent`] this strategy emits.
    fn id(&self) -> &'static str;

    /// Analyzes one normalized event and returns any candidate orders. Most events produce
    /// none; a strategy typically only reacts to closed candles or to trades on symbols it
    /// tracks.
    fn analyze(&self, event: &MarketEvent<MarketEventKind>) -> Vec<OrderIntent>;
}

/// Naive implementation generating no orders. Mirrors the teacher's `DefaultStrategy`
/// ("THIS IS FOR DEMONSTRATION PURPOSES ONLY") — the baseline every real strategy is compared
/// against, and the default when no strategy is configured.
#[derive(Debug, Clone, Default)]
pub struct NoOpStrategy;

impl Strategy for NoOpStrategy {
    fn id(&self) -> &'static str {
        "noop"
    }

    fn analyze(&self, _event: &MarketEvent<MarketEventKind>) -> Vec<OrderIntent> {
        Vec::new()
    }
}

/// Illustrative threshold strategy: on a closed candle, emits a market buy when `close` rises
/// above `upper` and a market sell when it falls below `lower`. Exists purely to exercise the
/// bot → risk → account event flow in tests; not a production trading signal (spec §1/§4.7
/// "strategy semantics are not specified here").
#[derive(Debug, Clone)]
pub struct ThresholdStrategy {
    pub upper: Price,
    pub lower: Price,
    pub quantity: Quantity,
}

impl ThresholdStrategy {
    pub fn new(upper: Price, lower: Price, quantity: Quantity) -> Self {
        Self { upper, lower, quantity }
    }

    fn intent(&self, exchange: ExchangeId, symbol: &Symbol, side: Side, candle: &Candle) -> OrderIntent {
        OrderIntent {
            strategy_id: self.id(),
            exchange,
            symbol: symbol.clone(),
            side,
            kind: OrderKind::Market,
            quantity: self.quantity,
            price: candle.close,
            time: candle.close_time,
        }
    }
}

impl Strategy for ThresholdStrategy {
    fn id(&self) -> &'static str {
        "threshold"
    }

    fn analyze(&self, event: &MarketEvent<MarketEventKind>) -> Vec<OrderIntent> {
        let MarketEventKind::Candle(candle) = &event.kind else {
            return Vec::new();
        };
        if !candle.closed {
            return Vec::new();
        }
        if candle.close.inner() > self.upper.inner() {
            vec![self.intent(event.exchange, &event.symbol, Side::Buy, candle)]
        } else if candle.close.inner() < self.lower.inner() {
            vec![self.intent(event.exchange, &event.symbol, Side::Sell, candle)]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(close: rust_decimal::Decimal, closed: bool) -> Candle {
        let now = Utc::now();
        Candle::new(
            market_instrument::Interval::OneMinute,
            now,
            now + chrono::Duration::minutes(1),
            Price::new(close),
            Price::new(close),
            Price::new(close),
            Price::new(close),
            Quantity::zero(),
            Quantity::zero(),
            0,
            closed,
        )
        .unwrap()
    }

    fn event(kind: MarketEventKind) -> MarketEvent<MarketEventKind> {
        MarketEvent::new(ExchangeId::Mock, Symbol::new("BTCUSDT"), Utc::now(), kind)
    }

    #[test]
    fn noop_strategy_never_emits() {
        let strategy = NoOpStrategy;
        let event = event(MarketEventKind::Candle(candle(dec!(100), true)));
        assert!(strategy.analyze(&event).is_empty());
    }

    #[test]
    fn threshold_strategy_buys_above_upper() {
        let strategy = ThresholdStrategy::new(Price::new(dec!(100)), Price::new(dec!(10)), Quantity::new(dec!(1)));
        let event = event(MarketEventKind::Candle(candle(dec!(150), true)));
        let intents = strategy.analyze(&event);
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].side, Side::Buy);
    }

    #[test]
    fn threshold_strategy_sells_below_lower() {
        let strategy = ThresholdStrategy::new(Price::new(dec!(100)), Price::new(dec!(10)), Quantity::new(dec!(1)));
        let event = event(MarketEventKind::Candle(candle(dec!(5), true)));
        let intents = strategy.analyze(&event);
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].side, Side::Sell);
    }

    #[test]
    fn threshold_strategy_ignores_unclosed_candles() {
        let strategy = ThresholdStrategy::new(Price::new(dec!(100)), Price::new(dec!(10)), Quantity::new(dec!(1)));
        let event = event(MarketEventKind::Candle(candle(dec!(150), false)));
        assert!(strategy.analyze(&event).is_empty());
    }
}
