//! Per-instance indicator lifecycle: a unique instance key, parameter map, opaque state and an
//! active flag (spec §3 `IndicatorInstance`), plus the instance manager that creates, destroys
//! and routes events to instances (spec §4.5 instance manager operations).

use crate::contract::{DataType, DynIndicator, IndicatorResult};
use crate::params::{ParamError, ParamValue, Params};
use crate::registry::IndicatorRegistry;
use market_data::{Candle, OrderBookSnapshot, Trade};
use market_history::{CandleHistoryStore, HistoryKey};
use market_instrument::{ExchangeId, Interval, Price, Symbol};
use parking_lot::RwLock;
use rand::Rng;
use smol_str::SmolStr;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, warn};

/// Unique identity of one indicator instance: `{provider}:{symbol}:{interval}:{indicatorId}:{shortRandom}`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct InstanceKey {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    pub interval: Interval,
    pub indicator_id: &'static str,
    pub token: SmolStr,
}

impl InstanceKey {
    fn new(exchange: ExchangeId, symbol: Symbol, interval: Interval, indicator_id: &'static str) -> Self {
        let token = random_token();
        Self { exchange, symbol, interval, indicator_id, token }
    }

    /// The (exchange, symbol, interval) triple instances of the same indicator on different
    /// keys are otherwise indistinguishable by.
    pub fn candle_key(&self) -> (ExchangeId, Symbol, Interval) {
        (self.exchange, self.symbol.clone(), self.interval)
    }

    /// The (exchange, symbol) an instance tracks irrespective of its interval — used to route
    /// trade/order-book/tick events, which are not interval-scoped.
    pub fn symbol_key(&self) -> (ExchangeId, Symbol) {
        (self.exchange, self.symbol.clone())
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.exchange, self.symbol, self.interval, self.indicator_id, self.token
        )
    }
}

fn random_token() -> SmolStr {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    let token: String = (0..6).map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char).collect();
    SmolStr::new(token)
}

/// Errors raised by [`InstanceManager::create`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum InstanceError {
    #[error("unknown indicator id: {0}")]
    UnknownIndicator(String),
    #[error("invalid parameters: {0}")]
    InvalidParams(#[from] ParamError),
}

/// One live indicator instance: identity, immutable parameters, opaque state under a
/// per-instance lock (spec §5 "at most one lifecycle method executing for any instance at any
/// moment"), and the active flag plus last-computed values a client can poll without waiting on
/// the next event.
pub struct IndicatorInstance {
    pub key: InstanceKey,
    indicator: Arc<dyn DynIndicator>,
    params: Params,
    state: Mutex<Box<dyn Any + Send>>,
    active: std::sync::atomic::AtomicBool,
    sufficient_data: std::sync::atomic::AtomicBool,
    last_result: RwLock<Option<IndicatorResult>>,
}

impl IndicatorInstance {
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn is_active(&self) -> bool {
        self.active.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn has_sufficient_data(&self) -> bool {
        self.sufficient_data.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn last_result(&self) -> Option<IndicatorResult> {
        self.last_result.read().clone()
    }

    fn requires(&self, kind: DataType) -> bool {
        self.indicator.required_data().contains(&kind)
    }
}

impl fmt::Debug for IndicatorInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndicatorInstance")
            .field("key", &self.key)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Creates, destroys and routes events to [`IndicatorInstance`]s. Maintains secondary indices by
/// (exchange, symbol, interval) and (exchange, symbol) so candle/trade/order-book events reach
/// exactly the instances that declared a need for that data type (spec's dispatcher contract).
pub struct InstanceManager {
    registry: Arc<IndicatorRegistry>,
    history: Arc<CandleHistoryStore>,
    instances: RwLock<HashMap<InstanceKey, Arc<IndicatorInstance>>>,
    by_candle_key: RwLock<HashMap<(ExchangeId, Symbol, Interval), Vec<InstanceKey>>>,
    by_symbol: RwLock<HashMap<(ExchangeId, Symbol), Vec<InstanceKey>>>,
}

impl InstanceManager {
    pub fn new(registry: Arc<IndicatorRegistry>, history: Arc<CandleHistoryStore>) -> Self {
        Self {
            registry,
            history,
            instances: RwLock::new(HashMap::new()),
            by_candle_key: RwLock::new(HashMap::new()),
            by_symbol: RwLock::new(HashMap::new()),
        }
    }

    /// Validates `params`, fetches available warm-up from the history store (an instance with
    /// insufficient history is created anyway and stays in "insufficient data" until enough
    /// candles arrive, per spec §7), calls `init`, and registers the instance.
    pub fn create(
        &self,
        exchange: ExchangeId,
        symbol: Symbol,
        interval: Interval,
        indicator_id: &str,
        input_params: HashMap<String, ParamValue>,
    ) -> Result<InstanceKey, InstanceError> {
        let indicator = self
            .registry
            .get(indicator_id)
            .ok_or_else(|| InstanceError::UnknownIndicator(indicator_id.to_string()))?;

        let params = Params::validate(indicator.param_schema(), &input_params)?;
        let minimum = indicator.minimum_candles(&params);

        let history_key = HistoryKey::new(exchange, symbol.clone(), interval);
        let warmup = self.history.last_n(&history_key, minimum);
        let sufficient = warmup.len() >= minimum;

        let state = indicator.init_dyn(&warmup, &params);
        let key = InstanceKey::new(exchange, symbol, interval, indicator.id());

        let instance = Arc::new(IndicatorInstance {
            key: key.clone(),
            indicator,
            params,
            state: Mutex::new(state),
            active: std::sync::atomic::AtomicBool::new(true),
            sufficient_data: std::sync::atomic::AtomicBool::new(sufficient),
            last_result: RwLock::new(None),
        });

        self.instances.write().insert(key.clone(), Arc::clone(&instance));
        self.by_candle_key.write().entry(key.candle_key()).or_default().push(key.clone());
        self.by_symbol.write().entry(key.symbol_key()).or_default().push(key.clone());

        Ok(key)
    }

    /// Removes the instance and releases its state. A no-op if `key` is unknown.
    pub fn destroy(&self, key: &InstanceKey) {
        if self.instances.write().remove(key).is_none() {
            return;
        }
        if let Some(bucket) = self.by_candle_key.write().get_mut(&key.candle_key()) {
            bucket.retain(|existing| existing != key);
        }
        if let Some(bucket) = self.by_symbol.write().get_mut(&key.symbol_key()) {
            bucket.retain(|existing| existing != key);
        }
    }

    pub fn get(&self, key: &InstanceKey) -> Option<Arc<IndicatorInstance>> {
        self.instances.read().get(key).cloned()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }

    fn candle_scoped_instances(&self, exchange: ExchangeId, symbol: &Symbol, interval: Interval) -> Vec<Arc<IndicatorInstance>> {
        let keys = self
            .by_candle_key
            .read()
            .get(&(exchange, symbol.clone(), interval))
            .cloned()
            .unwrap_or_default();
        let instances = self.instances.read();
        keys.iter().filter_map(|key| instances.get(key).cloned()).collect()
    }

    fn symbol_scoped_instances(&self, exchange: ExchangeId, symbol: &Symbol) -> Vec<Arc<IndicatorInstance>> {
        let keys = self.by_symbol.read().get(&(exchange, symbol.clone())).cloned().unwrap_or_default();
        let instances = self.instances.read();
        keys.iter().filter_map(|key| instances.get(key).cloned()).collect()
    }

    /// Routes a closed candle to every active instance on this (exchange, symbol, interval) key
    /// that requires [`DataType::Kline`]. Instances are updated concurrently with each other
    /// (independent, own locks) but this call itself must complete before the caller dispatches
    /// the next candle for the same key — that sequencing, enforced by the single-writer-per-key
    /// ingress path, is what gives the dispatcher's fairness guarantee (testable property 4).
    pub async fn update_all_with_candle(
        &self,
        exchange: ExchangeId,
        symbol: &Symbol,
        interval: Interval,
        candle: &Candle,
    ) -> Vec<(InstanceKey, IndicatorResult)> {
        let instances = self.candle_scoped_instances(exchange, symbol, interval);
        let history_key = HistoryKey::new(exchange, symbol.clone(), interval);

        let futures = instances.into_iter().filter(|instance| instance.requires(DataType::Kline)).map(|instance| {
            let history_len_sufficient = self.history.has_enough_data(&history_key, instance.indicator.minimum_candles(&instance.params));
            async move {
                let mut state = instance.state.lock().await;
                let result = call_guarded(&instance.key, || {
                    instance.indicator.on_new_candle_dyn(candle, &instance.params, &mut state)
                })?;
                instance.sufficient_data.store(history_len_sufficient, std::sync::atomic::Ordering::SeqCst);
                *instance.last_result.write() = Some(result.clone());
                Some((instance.key.clone(), result))
            }
        });

        futures::future::join_all(futures).await.into_iter().flatten().collect()
    }

    /// Routes a trade to every active instance on this (exchange, symbol) that requires
    /// [`DataType::Trade`] or [`DataType::AggregateTrade`].
    pub async fn update_all_with_trade(
        &self,
        exchange: ExchangeId,
        symbol: &Symbol,
        trade: &Trade,
    ) -> Vec<(InstanceKey, IndicatorResult)> {
        let instances = self.symbol_scoped_instances(exchange, symbol);
        let futures = instances
            .into_iter()
            .filter(|instance| instance.requires(DataType::Trade) || instance.requires(DataType::AggregateTrade))
            .map(|instance| async move {
                let mut state = instance.state.lock().await;
                let result = call_guarded(&instance.key, || {
                    instance.indicator.on_trade_update_dyn(trade, &instance.params, &mut state)
                })?;
                *instance.last_result.write() = Some(result.clone());
                Some((instance.key.clone(), result))
            });
        futures::future::join_all(futures).await.into_iter().flatten().collect()
    }

    /// Routes an order-book update to every active instance on this (exchange, symbol) that
    /// requires [`DataType::OrderBook`] or [`DataType::BookTicker`].
    pub async fn update_all_with_order_book(
        &self,
        exchange: ExchangeId,
        symbol: &Symbol,
        book: &OrderBookSnapshot,
    ) -> Vec<(InstanceKey, IndicatorResult)> {
        let instances = self.symbol_scoped_instances(exchange, symbol);
        let futures = instances
            .into_iter()
            .filter(|instance| instance.requires(DataType::OrderBook) || instance.requires(DataType::BookTicker))
            .map(|instance| async move {
                let mut state = instance.state.lock().await;
                let result = call_guarded(&instance.key, || {
                    instance.indicator.on_order_book_update_dyn(book, &instance.params, &mut state)
                })?;
                *instance.last_result.write() = Some(result.clone());
                Some((instance.key.clone(), result))
            });
        futures::future::join_all(futures).await.into_iter().flatten().collect()
    }

    /// Routes a sub-candle price tick to every active instance on this (exchange, symbol),
    /// regardless of declared data types — `on_new_tick`'s default no-op makes this safe for
    /// indicators that don't care about intra-candle price movement.
    pub async fn update_all_with_tick(
        &self,
        exchange: ExchangeId,
        symbol: &Symbol,
        price: Price,
    ) -> Vec<(InstanceKey, IndicatorResult)> {
        let instances = self.symbol_scoped_instances(exchange, symbol);
        let futures = instances.into_iter().map(|instance| async move {
            let mut state = instance.state.lock().await;
            let result = call_guarded(&instance.key, || {
                instance.indicator.on_new_tick_dyn(price, &instance.params, &mut state)
            })?;
            *instance.last_result.write() = Some(result.clone());
            Some((instance.key.clone(), result))
        });
        futures::future::join_all(futures).await.into_iter().flatten().collect()
    }
}

/// Runs one indicator lifecycle call behind [`std::panic::catch_unwind`]. A panicking indicator
/// unwinds only as far as this boundary: the instance's state and `last_result` are left exactly
/// as they were before the call (the caller never commits a panicked call's side effects), the
/// error is logged, and the rest of the batch's instances still run on the next `join_all` poll —
/// matching the per-instance fault isolation the dispatcher's callers rely on.
fn call_guarded<F>(key: &InstanceKey, f: F) -> Option<IndicatorResult>
where
    F: FnOnce() -> IndicatorResult,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => Some(result),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(%key, %message, "indicator lifecycle method panicked, preserving prior state");
            None
        }
    }
}

/// Logs and swallows a lifecycle error without aborting the caller's fan-out — kept for request
/// handlers wrapping instance creation (spec §7: validation errors never terminate the caller).
pub fn log_instance_error(context: &str, error: &InstanceError) {
    warn!(%context, %error, "indicator instance operation failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Category, Indicator, IndicatorResult, SeriesVisual};
    use crate::library::sma::Sma;
    use crate::params::{ParamSpec, Params};
    use chrono::Utc;
    use market_history::CandleHistoryStore;
    use market_instrument::{Interval, Price, Quantity, Symbol};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn candle(close: rust_decimal::Decimal) -> Candle {
        let open_time = Utc::now();
        Candle::new(
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

    /// Panics on every candle whose close price is exactly `dec!(666)`, otherwise behaves like a
    /// trivial pass-through indicator. Used to exercise `call_guarded`'s isolation.
    #[derive(Debug, Clone, Copy)]
    struct PanicsOnCursedPrice;

    impl Indicator for PanicsOnCursedPrice {
        type State = ();

        fn id(&self) -> &'static str {
            "panics-on-cursed-price"
        }
        fn name(&self) -> &'static str {
            "Panics On Cursed Price"
        }
        fn description(&self) -> &'static str {
            "test-only indicator that panics on a magic close price"
        }
        fn category(&self) -> Category {
            Category::Trend
        }
        fn param_schema(&self) -> &'static [ParamSpec] {
            &[]
        }
        fn minimum_candles(&self, _params: &Params) -> usize {
            0
        }
        fn init(&self, _historical: &[Candle], _params: &Params) -> Self::State {}
        fn on_new_candle(&self, candle: &Candle, _params: &Params, _state: &mut Self::State) -> IndicatorResult {
            if candle.close.inner() == dec!(666) {
                panic!("cursed price");
            }
            IndicatorResult::with_value("echo", candle.close.inner())
        }
        fn visualization(&self) -> &'static [SeriesVisual] {
            &[]
        }
    }

    fn manager() -> InstanceManager {
        let history = Arc::new(CandleHistoryStore::new(500));
        let mut registry = IndicatorRegistry::new();
        registry.register(PanicsOnCursedPrice);
        InstanceManager::new(Arc::new(registry), history)
    }

    #[tokio::test]
    async fn panicking_candle_update_is_isolated_and_preserves_prior_state() {
        let manager = manager();
        let symbol = Symbol::new("BTCUSDT");
        let key = manager
            .create(ExchangeId::Binance, symbol.clone(), Interval::OneMinute, "panics-on-cursed-price", HashMap::new())
            .unwrap();

        let first = manager
            .update_all_with_candle(ExchangeId::Binance, &symbol, Interval::OneMinute, &candle(dec!(100)))
            .await;
        assert_eq!(first.len(), 1);
        let instance = manager.get(&key).unwrap();
        assert_eq!(instance.last_result().unwrap().values.get("echo").copied(), Some(dec!(100)));

        let during_panic = manager
            .update_all_with_candle(ExchangeId::Binance, &symbol, Interval::OneMinute, &candle(dec!(666)))
            .await;
        assert!(during_panic.is_empty(), "a panicking instance contributes no result for that event");
        assert_eq!(
            instance.last_result().unwrap().values.get("echo").copied(),
            Some(dec!(100)),
            "last_result must be unchanged after a panicking call"
        );

        let after = manager
            .update_all_with_candle(ExchangeId::Binance, &symbol, Interval::OneMinute, &candle(dec!(200)))
            .await;
        assert_eq!(after.len(), 1, "the instance keeps receiving events after a panic");
        assert_eq!(instance.last_result().unwrap().values.get("echo").copied(), Some(dec!(200)));
    }

    #[tokio::test]
    async fn non_panicking_instances_in_same_batch_are_unaffected() {
        let history = Arc::new(CandleHistoryStore::new(500));
        let mut registry = IndicatorRegistry::new();
        registry.register(PanicsOnCursedPrice);
        registry.register(Sma);
        let manager = InstanceManager::new(Arc::new(registry), Arc::clone(&history));

        let symbol = Symbol::new("ETHUSDT");
        manager
            .create(ExchangeId::Binance, symbol.clone(), Interval::OneMinute, "panics-on-cursed-price", HashMap::new())
            .unwrap();
        let sma_key = manager
            .create(ExchangeId::Binance, symbol.clone(), Interval::OneMinute, "sma", HashMap::new())
            .unwrap();

        let results = manager
            .update_all_with_candle(ExchangeId::Binance, &symbol, Interval::OneMinute, &candle(dec!(666)))
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, sma_key);
    }
}
