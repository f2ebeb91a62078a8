//! The core indicator contract (C5): identity, parameter schema, declared data requirements,
//! warm-up sizing, the lifecycle methods every indicator implements, and visualization metadata.
//!
//! Every indicator has its own state type, but the instance manager and dispatcher need to hold
//! many different indicators behind one value — [`Indicator::State`] is erased behind the
//! [`DynIndicator`] object-safe wrapper (the "abstract base class with generics" pattern from a
//! GC'd language collapses into a trait plus an opaque `Box<dyn Any>` token, per the design
//! notes).

use crate::params::{ParamSpec, Params};
use crate::shape::Shape;
use market_data::{Candle, OrderBookSnapshot, Trade};
use market_instrument::Price;
use rust_decimal::Decimal;
use std::any::Any;
use std::collections::HashMap;
use indexmap::IndexMap;

/// The subset of inbound data kinds an indicator requires. Default for any indicator that only
/// overrides `on_new_candle` is `{Kline}`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DataType {
    Kline,
    Trade,
    AggregateTrade,
    OrderBook,
    BookTicker,
}

/// Free-text category tag surfaced to clients building an indicator picker UI.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Category {
    Trend,
    Momentum,
    Volume,
    OrderFlow,
    SmartMoney,
    Forecast,
}

/// Which source price an indicator reads off each candle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PriceSource {
    Close,
    Open,
    High,
    Low,
    Hl2,
    Hlc3,
    Ohlc4,
}

impl PriceSource {
    pub fn value(&self, candle: &Candle) -> Decimal {
        let (o, h, l, c) = (
            candle.open.inner(),
            candle.high.inner(),
            candle.low.inner(),
            candle.close.inner(),
        );
        match self {
            PriceSource::Close => c,
            PriceSource::Open => o,
            PriceSource::High => h,
            PriceSource::Low => l,
            PriceSource::Hl2 => (h + l) / Decimal::from(2),
            PriceSource::Hlc3 => (h + l + c) / Decimal::from(3),
            PriceSource::Ohlc4 => (o + h + l + c) / Decimal::from(4),
        }
    }
}

/// How a named series should be rendered by a client.
#[derive(Debug, Copy, Clone, Eq, PartialEq, serde::Serialize)]
pub enum RenderKind {
    Line,
    Histogram,
    Area,
}

/// Where a named series is drawn relative to the price pane.
#[derive(Debug, Copy, Clone, Eq, PartialEq, serde::Serialize)]
pub enum PanePlacement {
    Price,
    Separate(u8),
}

/// Visualization metadata for one named output series.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SeriesVisual {
    pub name: &'static str,
    pub display_name: &'static str,
    pub render_kind: RenderKind,
    pub color: &'static str,
    pub width: u8,
    pub pane: PanePlacement,
}

/// What one lifecycle call produces: named scalar values, any shapes accumulated during this
/// call, and an optional auxiliary structure (e.g. a footprint heatmap) opaque to the framework.
#[derive(Debug, Clone, Default)]
pub struct IndicatorResult {
    pub values: IndexMap<String, Decimal>,
    pub shapes: Vec<Shape>,
    pub auxiliary: Option<serde_json::Value>,
}

impl IndicatorResult {
    pub fn with_value(name: impl Into<String>, value: Decimal) -> Self {
        let mut values = IndexMap::new();
        values.insert(name.into(), value);
        Self { values, shapes: Vec::new(), auxiliary: None }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_shapes(mut self, shapes: Vec<Shape>) -> Self {
        self.shapes = shapes;
        self
    }
}

/// One (timestamp, values, shapes) point of a historical replay, as returned by
/// [`Indicator::calculate_historical`]/`DynIndicator::calculate_historical`.
#[derive(Debug, Clone)]
pub struct HistoricalPoint {
    pub time: i64,
    pub values: IndexMap<String, Decimal>,
}

/// The indicator contract. `State` holds whatever an implementation needs across calls (ring
/// buffers, running sums, previous extremes); the framework never inspects it directly.
pub trait Indicator: Send + Sync + 'static {
    type State: Send + 'static;

    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn category(&self) -> Category;
    fn param_schema(&self) -> &'static [ParamSpec];

    /// Data kinds this indicator must receive. Default: kline only.
    fn required_data(&self) -> &'static [DataType] {
        &[DataType::Kline]
    }

    /// Smallest warm-up window of closed candles needed for meaningful output.
    fn minimum_candles(&self, params: &Params) -> usize;

    /// Builds initial state from up to `minimum_candles` historical closed candles.
    fn init(&self, historical: &[Candle], params: &Params) -> Self::State;

    /// Called once per closed candle.
    fn on_new_candle(&self, candle: &Candle, params: &Params, state: &mut Self::State) -> IndicatorResult;

    /// Called at sub-candle granularity (the latest trade/ticker price). Default: unchanged.
    fn on_new_tick(&self, _price: Price, _params: &Params, _state: &mut Self::State) -> IndicatorResult {
        IndicatorResult::empty()
    }

    /// Called on every trade for instruments this indicator tracks. Default: no-op.
    fn on_trade_update(&self, _trade: &Trade, _params: &Params, _state: &mut Self::State) -> IndicatorResult {
        IndicatorResult::empty()
    }

    /// Called on every order-book update for instruments this indicator tracks. Default: no-op.
    fn on_order_book_update(
        &self,
        _book: &OrderBookSnapshot,
        _params: &Params,
        _state: &mut Self::State,
    ) -> IndicatorResult {
        IndicatorResult::empty()
    }

    /// Visualization metadata, one entry per named output series.
    fn visualization(&self) -> &'static [SeriesVisual];

    /// Replays the lifecycle progressively over every candle in `candles`, returning up to
    /// `count` trailing points plus the deduplicated set of shapes accumulated along the way.
    /// State starts empty (`init(&[], params)`) rather than pre-warmed from `candles` itself —
    /// `minimum_candles` governs how much *stored* history an instance pulls when it is first
    /// created (see `InstanceManager::create`), not how a from-scratch replay is windowed. An
    /// indicator below its own warm-up threshold simply returns an empty-valued result for the
    /// leading candles, the same way a freshly created instance would. Used both to answer
    /// historical queries and to prove indicator purity (testable property 7): the same candle
    /// sequence fed one-by-one through `on_new_candle` or replayed here in one call produces the
    /// same final values.
    fn calculate_historical(
        &self,
        candles: &[Candle],
        params: &Params,
        count: usize,
    ) -> (Vec<HistoricalPoint>, Vec<Shape>) {
        let mut state = self.init(&[], params);
        let mut points = Vec::with_capacity(candles.len());
        let mut shapes = Vec::new();

        for candle in candles {
            let result = self.on_new_candle(candle, params, &mut state);
            points.push(HistoricalPoint {
                time: candle.open_time.timestamp(),
                values: result.values,
            });
            shapes.extend(result.shapes);
        }

        let deduped = crate::shape::dedup_shapes(shapes);
        let tail_start = points.len().saturating_sub(count);
        (points.split_off(tail_start), deduped)
    }
}

/// Object-safe erasure of [`Indicator`], so the registry and instance manager can hold many
/// different indicators behind one trait object. State crosses this boundary as
/// `Box<dyn Any + Send>`; every method downcasts back to the concrete `State` type the same
/// blanket impl created it as, so the downcast can never fail in practice.
pub trait DynIndicator: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn category(&self) -> Category;
    fn param_schema(&self) -> &'static [ParamSpec];
    fn required_data(&self) -> &'static [DataType];
    fn minimum_candles(&self, params: &Params) -> usize;
    fn visualization(&self) -> &'static [SeriesVisual];

    fn init_dyn(&self, historical: &[Candle], params: &Params) -> Box<dyn Any + Send>;
    fn on_new_candle_dyn(
        &self,
        candle: &Candle,
        params: &Params,
        state: &mut Box<dyn Any + Send>,
    ) -> IndicatorResult;
    fn on_new_tick_dyn(
        &self,
        price: Price,
        params: &Params,
        state: &mut Box<dyn Any + Send>,
    ) -> IndicatorResult;
    fn on_trade_update_dyn(
        &self,
        trade: &Trade,
        params: &Params,
        state: &mut Box<dyn Any + Send>,
    ) -> IndicatorResult;
    fn on_order_book_update_dyn(
        &self,
        book: &OrderBookSnapshot,
        params: &Params,
        state: &mut Box<dyn Any + Send>,
    ) -> IndicatorResult;
    fn calculate_historical_dyn(
        &self,
        candles: &[Candle],
        params: &Params,
        count: usize,
    ) -> (Vec<HistoricalPoint>, Vec<Shape>);
}

impl<I: Indicator> DynIndicator for I {
    fn id(&self) -> &'static str {
        Indicator::id(self)
    }
    fn name(&self) -> &'static str {
        Indicator::name(self)
    }
    fn description(&self) -> &'static str {
        Indicator::description(self)
    }
    fn category(&self) -> Category {
        Indicator::category(self)
    }
    fn param_schema(&self) -> &'static [ParamSpec] {
        Indicator::param_schema(self)
    }
    fn required_data(&self) -> &'static [DataType] {
        Indicator::required_data(self)
    }
    fn minimum_candles(&self, params: &Params) -> usize {
        Indicator::minimum_candles(self, params)
    }
    fn visualization(&self) -> &'static [SeriesVisual] {
        Indicator::visualization(self)
    }

    fn init_dyn(&self, historical: &[Candle], params: &Params) -> Box<dyn Any + Send> {
        Box::new(Indicator::init(self, historical, params))
    }

    fn on_new_candle_dyn(
        &self,
        candle: &Candle,
        params: &Params,
        state: &mut Box<dyn Any + Send>,
    ) -> IndicatorResult {
        let typed = state
            .downcast_mut::<I::State>()
            .expect("DynIndicator state always matches the indicator that created it");
        Indicator::on_new_candle(self, candle, params, typed)
    }

    fn on_new_tick_dyn(
        &self,
        price: Price,
        params: &Params,
        state: &mut Box<dyn Any + Send>,
    ) -> IndicatorResult {
        let typed = state
            .downcast_mut::<I::State>()
            .expect("DynIndicator state always matches the indicator that created it");
        Indicator::on_new_tick(self, price, params, typed)
    }

    fn on_trade_update_dyn(
        &self,
        trade: &Trade,
        params: &Params,
        state: &mut Box<dyn Any + Send>,
    ) -> IndicatorResult {
        let typed = state
            .downcast_mut::<I::State>()
            .expect("DynIndicator state always matches the indicator that created it");
        Indicator::on_trade_update(self, trade, params, typed)
    }

    fn on_order_book_update_dyn(
        &self,
        book: &OrderBookSnapshot,
        params: &Params,
        state: &mut Box<dyn Any + Send>,
    ) -> IndicatorResult {
        let typed = state
            .downcast_mut::<I::State>()
            .expect("DynIndicator state always matches the indicator that created it");
        Indicator::on_order_book_update(self, book, params, typed)
    }

    fn calculate_historical_dyn(
        &self,
        candles: &[Candle],
        params: &Params,
        count: usize,
    ) -> (Vec<HistoricalPoint>, Vec<Shape>) {
        Indicator::calculate_historical(self, candles, params, count)
    }
}

/// Raised when a caller names a parameter the framework doesn't recognise as a `HashMap` key
/// (kept for request-layer translation; the actual per-spec validation lives in
/// [`crate::params::ParamError`]).
#[derive(Debug, Clone, thiserror::Error)]
#[error("unrecognised parameter: {0}")]
pub struct UnknownParam(pub String);

/// Converts raw request input (string-keyed JSON-ish values) into the map
/// [`Params::validate`] expects. Exists so request handlers don't need to know about
/// [`crate::params::ParamValue`]'s variants.
pub fn params_input_from_json(raw: &HashMap<String, serde_json::Value>) -> HashMap<String, crate::params::ParamValue> {
    use crate::params::ParamValue;
    raw.iter()
        .filter_map(|(key, value)| {
            let parsed = match value {
                serde_json::Value::Bool(b) => ParamValue::Boolean(*b),
                serde_json::Value::Number(n) if n.is_i64() => ParamValue::Integer(n.as_i64()?),
                serde_json::Value::Number(n) => ParamValue::Decimal(Decimal::try_from(n.as_f64()?).ok()?),
                serde_json::Value::String(s) => ParamValue::String(s.clone()),
                _ => return None,
            };
            Some((key.clone(), parsed))
        })
        .collect()
}
