//! Wires strategies, a risk manager and an account executor into one normalized-event consumer
//! (spec §4.7): every event reaches every active strategy when the bot is enabled; candidate
//! orders pass through the risk manager; approved orders execute only in trading-enabled mode,
//! otherwise they are logged but not executed (spec §4.7/§7).

use crate::account::AccountExecutor;
use crate::risk::{AccountSnapshot, RiskManager};
use crate::strategy::Strategy;
use market_data::{MarketEvent, MarketEventKind};
use market_instrument::{Price, Symbol};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Whether risk-approved orders are actually executed against the account, or only logged.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TradingMode {
    /// Approved orders execute against the account (simulated fills).
    Enabled,
    /// Approved orders are logged, never executed. The default — trading must be explicitly
    /// turned on (spec §4.7 "analysis-only mode").
    AnalysisOnly,
}

/// Consumes every normalized market event, runs it through each configured strategy, and
/// routes candidate orders through risk review and (in [`TradingMode::Enabled`]) execution.
pub struct BotEngine<R: RiskManager, A: AccountExecutor> {
    enabled: AtomicBool,
    mode: TradingMode,
    strategies: Vec<Box<dyn Strategy>>,
    risk: R,
    account: A,
    last_prices: RwLock<HashMap<Symbol, Price>>,
}

impl<R: RiskManager, A: AccountExecutor> BotEngine<R, A> {
    pub fn new(strategies: Vec<Box<dyn Strategy>>, risk: R, account: A, mode: TradingMode) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            mode,
            strategies,
            risk,
            account,
            last_prices: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn account(&self) -> &A {
        &self.account
    }

    fn track_last_price(&self, event: &MarketEvent<MarketEventKind>) {
        let price = match &event.kind {
            MarketEventKind::Candle(candle) => Some(candle.close),
            MarketEventKind::Trade(trade) => Some(trade.price),
            MarketEventKind::BookTicker(ticker) => Some(ticker.best_bid_price),
            MarketEventKind::OrderBook(book) => book.best_bid().map(|level| level.price),
        };
        if let Some(price) = price {
            self.last_prices.write().insert(event.symbol.clone(), price);
        }
    }

    /// Feeds one normalized event through the bot. A no-op when [`Self::set_enabled`] has
    /// turned the bot off (spec §4.7 "if enabled, invokes each active strategy").
    pub fn on_market_event(&self, event: &MarketEvent<MarketEventKind>) {
        self.track_last_price(event);

        if !self.is_enabled() {
            return;
        }

        for strategy in &self.strategies {
            for intent in strategy.analyze(event) {
                self.handle_intent(intent);
            }
        }
    }

    fn handle_intent(&self, intent: crate::strategy::OrderIntent) {
        let positions = self.account.positions();
        let snapshot = AccountSnapshot {
            positions: &positions,
            realized_pnl_today: self.account.realized_pnl(),
        };

        match self.risk.check(&snapshot, intent) {
            Ok(approved) => match self.mode {
                TradingMode::Enabled => {
                    let symbol = approved.0.symbol.clone();
                    let last_price = self.last_prices.read().get(&symbol).copied().unwrap_or(approved.0.price);
                    let fill = self.account.execute(approved, last_price);
                    info!(?fill, "bot order executed");
                }
                TradingMode::AnalysisOnly => {
                    info!(intent = ?approved.0, "bot order approved (analysis-only, not executed)");
                }
            },
            Err(refused) => {
                warn!(intent = ?refused.item, reason = %refused.reason, "bot order refused by risk manager");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::SimulatedAccount;
    use crate::risk::NoRiskManager;
    use crate::strategy::ThresholdStrategy;
    use chrono::Utc;
    use market_data::Candle;
    use market_instrument::{ExchangeId, Interval, Quantity};
    use rust_decimal_macros::dec;

    fn candle_event(symbol: &str, close: rust_decimal::Decimal) -> MarketEvent<MarketEventKind> {
        let now = Utc::now();
        let candle = Candle::new(
            Interval::OneMinute,
            now,
            now + chrono::Duration::minutes(1),
            Price::new(close),
            Price::new(close),
            Price::new(close),
            Price::new(close),
            Quantity::zero(),
            Quantity::zero(),
            0,
            true,
        )
        .unwrap();
        MarketEvent::new(ExchangeId::Mock, Symbol::new(symbol), now, MarketEventKind::Candle(candle))
    }

    #[test]
    fn executes_approved_orders_in_enabled_mode() {
        let strategy = ThresholdStrategy::new(Price::new(dec!(100)), Price::new(dec!(10)), Quantity::new(dec!(1)));
        let engine = BotEngine::new(
            vec![Box::new(strategy)],
            NoRiskManager,
            SimulatedAccount::new(dec!(10_000)),
            TradingMode::Enabled,
        );

        engine.on_market_event(&candle_event("BTCUSDT", dec!(150)));

        let position = engine.account().position(&Symbol::new("BTCUSDT"));
        assert!(position.is_some());
    }

    #[test]
    fn analysis_only_mode_never_executes() {
        let strategy = ThresholdStrategy::new(Price::new(dec!(100)), Price::new(dec!(10)), Quantity::new(dec!(1)));
        let engine = BotEngine::new(
            vec![Box::new(strategy)],
            NoRiskManager,
            SimulatedAccount::new(dec!(10_000)),
            TradingMode::AnalysisOnly,
        );

        engine.on_market_event(&candle_event("BTCUSDT", dec!(150)));

        assert!(engine.account().position(&Symbol::new("BTCUSDT")).is_none());
    }

    #[test]
    fn disabled_bot_ignores_events() {
        let strategy = ThresholdStrategy::new(Price::new(dec!(100)), Price::new(dec!(10)), Quantity::new(dec!(1)));
        let engine = BotEngine::new(
            vec![Box::new(strategy)],
            NoRiskManager,
            SimulatedAccount::new(dec!(10_000)),
            TradingMode::Enabled,
        );
        engine.set_enabled(false);

        engine.on_market_event(&candle_event("BTCUSDT", dec!(150)));

        assert!(engine.account().position(&Symbol::new("BTCUSDT")).is_none());
    }
}
