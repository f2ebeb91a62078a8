//! Routes one normalized market event to every indicator instance that declared a need for it,
//! writing closed candles into the shared history store along the way so a freshly created
//! instance's warm-up window always reflects the latest closed bar.

use crate::instance::{IndicatorResult, InstanceKey, InstanceManager};
use market_data::{MarketEvent, MarketEventKind};
use market_history::{CandleHistoryStore, HistoryKey};
use std::sync::Arc;

/// Fans an inbound [`MarketEvent`] out to the [`InstanceManager`]. Callers are expected to
/// serialize their own calls to [`Dispatcher::dispatch`] per (exchange, symbol, interval) key —
/// the single-writer-per-key discipline the history store already assumes — which is what gives
/// same-instance event ordering its guarantee; instances on different keys are free to be
/// updated concurrently with each other.
pub struct Dispatcher {
    instances: Arc<InstanceManager>,
    history: Arc<CandleHistoryStore>,
}

impl Dispatcher {
    pub fn new(instances: Arc<InstanceManager>, history: Arc<CandleHistoryStore>) -> Self {
        Self { instances, history }
    }

    pub async fn dispatch(&self, event: &MarketEvent<MarketEventKind>) -> Vec<(InstanceKey, IndicatorResult)> {
        match &event.kind {
            MarketEventKind::Candle(candle) => {
                if candle.closed {
                    let key = HistoryKey::new(event.exchange, event.symbol.clone(), candle.interval);
                    self.history.add(&key, *candle);
                }
                self.instances
                    .update_all_with_candle(event.exchange, &event.symbol, candle.interval, candle)
                    .await
            }
            MarketEventKind::Trade(trade) => {
                let mut results = self.instances.update_all_with_trade(event.exchange, &event.symbol, trade).await;
                results.extend(self.instances.update_all_with_tick(event.exchange, &event.symbol, trade.price).await);
                results
            }
            MarketEventKind::OrderBook(book) => {
                self.instances.update_all_with_order_book(event.exchange, &event.symbol, book).await
            }
            MarketEventKind::BookTicker(ticker) => {
                self.instances
                    .update_all_with_tick(event.exchange, &event.symbol, ticker.best_bid_price)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::sma::Sma;
    use crate::registry::IndicatorRegistry;
    use chrono::Utc;
    use market_instrument::{ExchangeId, Interval, Price, Quantity, Symbol};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn candle(open_time: chrono::DateTime<Utc>, close: rust_decimal::Decimal) -> market_data::Candle {
        market_data::Candle::new(
            Interval::OneMinute,
            open_time,
            open_time + chrono::Duration::minutes(1),
            Price::new(close),
            Price::new(close),
            Price::new(close),
            Price::new(close),
            Quantity::zero(),
            Quantity::zero(),
            1,
            true,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn closed_candle_updates_history_and_instances() {
        let history = Arc::new(CandleHistoryStore::new(500));
        let mut registry = IndicatorRegistry::new();
        registry.register(Sma);
        let instances = Arc::new(InstanceManager::new(Arc::new(registry), Arc::clone(&history)));
        let dispatcher = Dispatcher::new(Arc::clone(&instances), Arc::clone(&history));

        let symbol = Symbol::new("BTCUSDT");
        let key = instances
            .create(ExchangeId::Binance, symbol.clone(), Interval::OneMinute, "sma", HashMap::new())
            .unwrap();

        let open_time = Utc::now();
        let event = MarketEvent::new(
            ExchangeId::Binance,
            symbol.clone(),
            open_time,
            MarketEventKind::Candle(candle(open_time, dec!(100))),
        );

        dispatcher.dispatch(&event).await;

        let history_key = HistoryKey::new(ExchangeId::Binance, symbol, Interval::OneMinute);
        assert_eq!(history.len(&history_key), 1);
        assert!(instances.get(&key).unwrap().last_result().is_some());
    }
}
