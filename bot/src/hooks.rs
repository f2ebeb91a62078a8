//! Disconnect/trading-disabled lifecycle hooks, generalised from the teacher's
//! `OnDisconnectStrategy`/`OnTradingDisabled` traits. The teacher's versions are generic over
//! `Clock, State, ExecutionTxs, Risk` because they run inside the full trading engine; this
//! crate only ever receives normalized market events (spec §4.7 "the bot receives every
//! normalized event"), so the hooks are narrowed to what a pluggable consumer actually needs.

use market_instrument::ExchangeId;

/// Invoked when the market-data ingress layer reports a provider disconnect. Strategies that
/// want to flatten exposure or halt on disconnect implement this; the default does nothing
/// (teacher's `DefaultStrategy::on_disconnect` idiom).
pub trait OnDisconnect: Send + Sync {
    fn on_disconnect(&self, exchange: ExchangeId);
}

/// Invoked when trading is toggled off for the process (e.g. an operator kill switch upstream
/// of this crate). Default does nothing.
pub trait OnTradingDisabled: Send + Sync {
    fn on_trading_disabled(&self);
}

/// Naive implementation of both hooks: does nothing on disconnect or on trading being disabled.
/// *FOR DEMONSTRATION PURPOSES ONLY* — mirrors the teacher's `DefaultStrategy`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpHooks;

impl OnDisconnect for NoOpHooks {
    fn on_disconnect(&self, exchange: ExchangeId) {
        tracing::warn!(%exchange, "market-data provider disconnected; no-op hook took no action");
    }
}

impl OnTradingDisabled for NoOpHooks {
    fn on_trading_disabled(&self) {
        tracing::warn!("trading disabled; no-op hook took no action");
    }
}
