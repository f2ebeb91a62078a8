//! Wires every component together: ingress providers, the candlestick history store, the
//! footprint aggregator, the indicator registry/instance manager/dispatcher, the session
//! registry and the bot. Grounded on the teacher's `SystemBuilder`
//! (`core/src/system/builder.rs`): a chainable builder that holds configuration until
//! [`EngineBuilder::build`] constructs every component but starts no tasks, leaving the caller
//! to start providers and drive shutdown explicitly.

use crate::config::{EngineConfig, ProviderConfig};
use crate::shutdown::ShutdownHandle;
use bot::{BasicRiskManager, BotEngine, SimulatedAccount, Strategy, TradingMode};
use broadcast::{Envelope, FeedKind, SessionRegistry};
use indicators::{Dispatcher, IndicatorRegistry, InstanceManager};
use market_data::exchange::binance::BinanceConnector;
use market_data::provider::MarketDataProvider;
use market_data::service::UniversalDataService;
use market_data::{MarketEvent, MarketEventKind};
use market_history::{CandleHistoryStore, FootprintAggregator, FootprintKey};
use market_instrument::Interval;
use market_integration::error::SocketError;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Only one exchange connector exists in this workspace; provider names are restricted to the
/// ones this function recognizes rather than leaked from arbitrary config strings.
fn resolve_provider_name(name: &str) -> Result<&'static str, EngineError> {
    match name {
        "binance" => Ok("binance"),
        other => Err(EngineError::UnknownProvider(other.to_string())),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown market data provider: {0}")]
    UnknownProvider(String),

    #[error("provider connection failed: {0}")]
    Connect(#[from] SocketError),
}

/// Every component the builder assembled, plus the glue that routes one normalized event into
/// history, indicator dispatch, broadcast and the bot.
pub struct System {
    config: EngineConfig,
    pub data_service: Arc<UniversalDataService<BinanceConnector>>,
    pub history: Arc<CandleHistoryStore>,
    pub footprint: Arc<FootprintAggregator>,
    pub instances: Arc<InstanceManager>,
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionRegistry>,
    pub bot: Arc<BotEngine<BasicRiskManager, SimulatedAccount>>,
    pub shutdown: ShutdownHandle,
    footprint_intervals: Vec<Interval>,
}

impl System {
    /// Connects every configured provider and issues its subscriptions. Each provider is
    /// connected before any of its subscriptions are sent, matching
    /// [`MarketDataProvider::connect`]'s own idempotent-if-already-connected contract.
    pub async fn start(&self) -> Result<(), EngineError> {
        for provider_config in &self.config.providers {
            let name = resolve_provider_name(&provider_config.name)?;
            let provider = self
                .data_service
                .provider(name)
                .expect("provider registered by EngineBuilder::build for every configured name");

            provider.connect().await?;
            self.subscribe(&provider, provider_config);
        }
        Ok(())
    }

    fn subscribe(&self, provider: &Arc<MarketDataProvider<BinanceConnector>>, config: &ProviderConfig) {
        for symbol in &config.symbols {
            for interval in &config.intervals {
                provider.subscribe_kline(symbol.clone(), *interval);
            }
            if config.trades {
                provider.subscribe_trade(symbol.clone());
                provider.subscribe_agg_trade(symbol.clone());
            }
            if config.book_ticker {
                provider.subscribe_book_ticker(symbol.clone());
            }
        }
    }

    /// Disconnects every configured provider and triggers the shutdown signal.
    pub fn stop(&self) {
        for provider_config in &self.config.providers {
            if let Ok(name) = resolve_provider_name(&provider_config.name) {
                if let Some(provider) = self.data_service.provider(name) {
                    provider.disconnect();
                }
            }
        }
        self.shutdown.trigger();
    }
}

/// Builds a [`System`] from an [`EngineConfig`] and an optional set of strategies. Holds no
/// state beyond the config until [`EngineBuilder::build`] runs.
pub struct EngineBuilder {
    config: EngineConfig,
    strategies: Vec<Box<dyn Strategy>>,
    risk: Option<BasicRiskManager>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, strategies: Vec::new(), risk: None }
    }

    /// Adds a strategy the bot will run every normalized event through.
    pub fn with_strategy(mut self, strategy: impl Strategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Overrides the bot's risk manager. Defaults to a [`BasicRiskManager`] with generous
    /// limits if never called (spec §4.7: a deployment is expected to tune its own limits).
    pub fn with_risk_manager(mut self, risk: BasicRiskManager) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn build(self) -> Result<System, EngineError> {
        let Self { config, strategies, risk } = self;

        let data_service = Arc::new(UniversalDataService::<BinanceConnector>::new());
        for provider_config in &config.providers {
            let name = resolve_provider_name(&provider_config.name)?;
            let provider = Arc::new(MarketDataProvider::new(BinanceConnector));
            data_service.register(name, provider);
        }

        let history = Arc::new(CandleHistoryStore::new(config.history_bound));
        let footprint = Arc::new(FootprintAggregator::new(config.footprint_bound_bars));
        let footprint_intervals: Vec<Interval> = {
            let mut intervals: Vec<Interval> =
                config.providers.iter().flat_map(|p| p.intervals.iter().copied()).collect();
            intervals.sort_by_key(|interval| interval.to_string());
            intervals.dedup();
            intervals
        };

        let registry = Arc::new(IndicatorRegistry::with_library_defaults());
        let instances = Arc::new(InstanceManager::new(registry, Arc::clone(&history)));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&instances), Arc::clone(&history)));

        let provider_names: Vec<&'static str> = config
            .providers
            .iter()
            .map(|p| resolve_provider_name(&p.name))
            .collect::<Result<_, _>>()?;
        let sessions = Arc::new(SessionRegistry::new(
            provider_names,
            vec!["1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w"],
        ));

        let risk = risk.unwrap_or_else(|| {
            BasicRiskManager::new(Decimal::new(1_000, 0), Decimal::new(1_000_000, 0), Decimal::new(5_000_000, 0), Decimal::new(100_000, 0))
        });
        let account = SimulatedAccount::new(config.starting_balance);
        let mode = if config.trading_enabled { TradingMode::Enabled } else { TradingMode::AnalysisOnly };
        let bot = Arc::new(BotEngine::new(strategies, risk, account, mode));

        let shutdown = ShutdownHandle::new();

        // One unbounded queue feeds every inbound event to a single consumer task that calls
        // `Dispatcher::dispatch` strictly in arrival order (see `run_dispatch_queue`). This is
        // what gives the dispatcher's per-key ordering guarantee (spec §5, testable property
        // 4): a lone consumer awaiting each `dispatch` call to completion before pulling the
        // next event can never run two dispatches for the same key concurrently, unlike
        // spawning an independent task per event would.
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_dispatch_queue(
            dispatch_rx,
            Arc::clone(&dispatcher),
            Arc::clone(&sessions),
            shutdown.subscribe(),
        ));

        for provider_config in &config.providers {
            let name = resolve_provider_name(&provider_config.name)?;
            let handler = route_event(
                name,
                Arc::clone(&footprint),
                footprint_intervals.clone(),
                dispatch_tx.clone(),
                Arc::clone(&sessions),
                Arc::clone(&bot),
            );
            data_service.provider(name).expect("just registered above").set_handler(handler);
        }

        Ok(System {
            config,
            data_service,
            history,
            footprint,
            instances,
            dispatcher,
            sessions,
            bot,
            shutdown,
            footprint_intervals,
        })
    }
}

/// Builds the per-provider event handler: tracks footprint on trades, broadcasts order-flow and
/// trading envelopes synchronously, feeds the bot synchronously, and hands the event to the
/// single-consumer dispatch queue (see [`run_dispatch_queue`]) so the synchronous
/// [`market_data::provider::Handler`] signature never blocks on indicator evaluation, while
/// still preserving per-key dispatch ordering.
fn route_event(
    provider_name: &'static str,
    footprint: Arc<FootprintAggregator>,
    footprint_intervals: Vec<Interval>,
    dispatch_tx: mpsc::UnboundedSender<MarketEvent<MarketEventKind>>,
    sessions: Arc<SessionRegistry>,
    bot: Arc<BotEngine<BasicRiskManager, SimulatedAccount>>,
) -> market_data::provider::Handler {
    Arc::new(move |event: MarketEvent<MarketEventKind>| {
        if let MarketEventKind::Trade(trade) = &event.kind {
            for interval in &footprint_intervals {
                let key = FootprintKey::new(event.exchange, event.symbol.clone(), *interval);
                footprint.on_trade(key, trade);
            }
        }

        broadcast_raw(&sessions, provider_name, &event);
        bot.on_market_event(&event);

        if dispatch_tx.send(event).is_err() {
            warn!("indicator dispatch queue is gone, dropping event");
        }
    })
}

/// The single consumer of the indicator dispatch queue: pulls events strictly in the order
/// [`route_event`] enqueued them and awaits each [`Dispatcher::dispatch`] call to completion
/// before pulling the next. Because exactly one task ever calls `dispatch`, no two calls for
/// the same (exchange, symbol, interval) key can race — the ordering guarantee
/// [`indicators::Dispatcher::dispatch`]'s own docs ask its caller to provide.
async fn run_dispatch_queue(
    mut events: mpsc::UnboundedReceiver<MarketEvent<MarketEventKind>>,
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<SessionRegistry>,
    mut shutdown: tokio::sync::broadcast::Receiver<crate::shutdown::Shutdown>,
) {
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { return };
                for (key, result) in dispatcher.dispatch(&event).await {
                    let values: HashMap<String, Decimal> = result.values.into_iter().collect();
                    let shapes = if result.shapes.is_empty() {
                        None
                    } else {
                        serde_json::to_value(&result.shapes).ok()
                    };
                    sessions.broadcast_indicator(&key, values, shapes);
                }
            }
            _ = shutdown.recv() => return,
        }
    }
}

fn broadcast_raw(sessions: &SessionRegistry, provider_name: &'static str, event: &MarketEvent<MarketEventKind>) {
    let timestamp = event.time.timestamp_millis();
    match &event.kind {
        MarketEventKind::Trade(trade) => {
            let trade_json = serde_json::to_value(trade).ok();
            let order_flow = Envelope::OrderFlow {
                data_type: FeedKind::Trade,
                symbol: event.symbol.clone(),
                timestamp,
                provider: provider_name,
                trade: trade_json.clone(),
                order_book: None,
            };
            sessions.broadcast_order_flow(FeedKind::Trade, &event.symbol, &order_flow);

            let trading = Envelope::TradingData {
                data_type: FeedKind::Trade,
                symbol: event.symbol.clone(),
                candlestick: None,
                trade: trade_json,
                order_book: None,
            };
            sessions.broadcast_trading(&trading);
        }
        MarketEventKind::OrderBook(book) => {
            let book_json = serde_json::to_value(book).ok();
            let order_flow = Envelope::OrderFlow {
                data_type: FeedKind::OrderBook,
                symbol: event.symbol.clone(),
                timestamp,
                provider: provider_name,
                trade: None,
                order_book: book_json.clone(),
            };
            sessions.broadcast_order_flow(FeedKind::OrderBook, &event.symbol, &order_flow);

            let trading = Envelope::TradingData {
                data_type: FeedKind::OrderBook,
                symbol: event.symbol.clone(),
                candlestick: None,
                trade: None,
                order_book: book_json,
            };
            sessions.broadcast_trading(&trading);
        }
        MarketEventKind::BookTicker(ticker) => {
            // Spec names only `trade`/`orderBook` as orderFlow payload slots; a book-ticker
            // snapshot is order-book state, so it rides in the `orderBook` slot.
            let order_flow = Envelope::OrderFlow {
                data_type: FeedKind::BookTicker,
                symbol: event.symbol.clone(),
                timestamp,
                provider: provider_name,
                trade: None,
                order_book: serde_json::to_value(ticker).ok(),
            };
            sessions.broadcast_order_flow(FeedKind::BookTicker, &event.symbol, &order_flow);
        }
        MarketEventKind::Candle(candle) => {
            if candle.closed {
                let trading = Envelope::TradingData {
                    data_type: FeedKind::Candlestick,
                    symbol: event.symbol.clone(),
                    candlestick: serde_json::to_value(candle).ok(),
                    trade: None,
                    order_book: None,
                };
                sessions.broadcast_trading(&trading);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_instrument::Symbol;

    fn config() -> EngineConfig {
        EngineConfig {
            providers: vec![ProviderConfig {
                name: "binance".to_string(),
                symbols: vec![Symbol::new("BTCUSDT")],
                intervals: vec![Interval::OneMinute],
                trades: true,
                book_ticker: true,
            }],
            ..EngineConfig::default()
        }
    }

    #[test]
    fn build_wires_every_component_without_connecting() {
        let system = EngineBuilder::new(config()).build().unwrap();
        assert!(system.data_service.provider("binance").is_some());
        assert!(system.bot.is_enabled());
    }

    #[test]
    fn rejects_unknown_provider_name() {
        let mut cfg = config();
        cfg.providers[0].name = "coinbase".to_string();
        let result = EngineBuilder::new(cfg).build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn route_event_broadcasts_trades_without_panicking() {
        let system = EngineBuilder::new(config()).build().unwrap();
        let (dispatch_tx, mut dispatch_rx) = mpsc::unbounded_channel();
        let handler = route_event(
            "binance",
            Arc::clone(&system.footprint),
            system.footprint_intervals.clone(),
            dispatch_tx,
            Arc::clone(&system.sessions),
            Arc::clone(&system.bot),
        );

        let trade = market_data::Trade {
            id: 1,
            price: market_instrument::Price::new(Decimal::new(100, 0)),
            quantity: market_instrument::Quantity::new(Decimal::new(1, 0)),
            quote_quantity: market_instrument::Quantity::new(Decimal::new(100, 0)),
            time: chrono::Utc::now(),
            buyer_is_maker: false,
            aggregate_range: None,
        };
        let event = MarketEvent::new(
            market_instrument::ExchangeId::Binance,
            Symbol::new("BTCUSDT"),
            chrono::Utc::now(),
            MarketEventKind::Trade(trade),
        );
        handler(event);

        // The handler enqueues the event for the dispatch actor rather than evaluating
        // indicators itself.
        assert!(dispatch_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn dispatch_queue_processes_same_key_candles_in_order() {
        use crate::shutdown::ShutdownHandle;
        use indicators::library::sma::Sma;
        use market_instrument::{ExchangeId, Price, Quantity};
        use rust_decimal_macros::dec;

        let history = Arc::new(CandleHistoryStore::new(500));
        let mut registry = IndicatorRegistry::new();
        registry.register(Sma);
        let instances = Arc::new(InstanceManager::new(Arc::new(registry), Arc::clone(&history)));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&instances), Arc::clone(&history)));
        let sessions = Arc::new(SessionRegistry::new(vec!["binance"], vec!["1m"]));
        let shutdown = ShutdownHandle::new();

        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_dispatch_queue(
            dispatch_rx,
            Arc::clone(&dispatcher),
            Arc::clone(&sessions),
            shutdown.subscribe(),
        ));

        let symbol = Symbol::new("BTCUSDT");
        instances
            .create(ExchangeId::Binance, symbol.clone(), Interval::OneMinute, "sma", HashMap::new())
            .unwrap();

        let base_time = chrono::Utc::now();
        for (i, close) in [dec!(10), dec!(20), dec!(30)].into_iter().enumerate() {
            let open_time = base_time + chrono::Duration::minutes(i as i64);
            let candle = market_data::Candle::new(
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
            .unwrap();
            let event = MarketEvent::new(
                ExchangeId::Binance,
                symbol.clone(),
                open_time,
                MarketEventKind::Candle(candle),
            );
            dispatch_tx.send(event).unwrap();
        }

        // Give the single consumer task a chance to drain the queue in order; no out-of-order
        // `add` ever reaches the history store because the queue never runs two dispatches for
        // the same key concurrently.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let key = market_history::HistoryKey::new(ExchangeId::Binance, symbol, Interval::OneMinute);
        assert_eq!(history.len(&key), 3);
    }
}
