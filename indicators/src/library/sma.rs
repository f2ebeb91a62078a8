//! Simple moving average: arithmetic mean of the last `period` source prices.

use crate::contract::{
    Category, DataType, Indicator, IndicatorResult, PanePlacement, PriceSource, RenderKind,
    SeriesVisual,
};
use crate::params::{ParamSpec, ParamValue, Params};
use market_data::Candle;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::collections::VecDeque;

static PARAM_SCHEMA: Lazy<Vec<ParamSpec>> = Lazy::new(|| {
    vec![
        ParamSpec::new("period", "Period", ParamValue::Integer(14))
            .with_range(ParamValue::Integer(1), ParamValue::Integer(500)),
        ParamSpec::new("source", "Source", ParamValue::String("close".to_string())),
    ]
});

fn period(params: &Params) -> usize {
    params.get_integer("period").unwrap_or(14).max(1) as usize
}

fn source(params: &Params) -> PriceSource {
    match params.get_string("source") {
        Some("open") => PriceSource::Open,
        Some("high") => PriceSource::High,
        Some("low") => PriceSource::Low,
        Some("hl2") => PriceSource::Hl2,
        Some("hlc3") => PriceSource::Hlc3,
        Some("ohlc4") => PriceSource::Ohlc4,
        _ => PriceSource::Close,
    }
}

/// Sliding window of the last `period` source prices and their running sum.
#[derive(Debug, Default)]
pub struct SmaState {
    window: VecDeque<Decimal>,
    sum: Decimal,
}

/// Simple moving average. State keeps a sliding window of the last `period` source prices;
/// on each candle, the window shifts and the mean is recomputed (spec's SMA contract, S1).
#[derive(Debug, Clone, Copy)]
pub struct Sma;

impl Indicator for Sma {
    type State = SmaState;

    fn id(&self) -> &'static str {
        "sma"
    }
    fn name(&self) -> &'static str {
        "Simple Moving Average"
    }
    fn description(&self) -> &'static str {
        "Arithmetic mean of the last N source prices."
    }
    fn category(&self) -> Category {
        Category::Trend
    }
    fn param_schema(&self) -> &'static [ParamSpec] {
        &PARAM_SCHEMA
    }

    fn minimum_candles(&self, params: &Params) -> usize {
        period(params)
    }

    fn init(&self, historical: &[Candle], params: &Params) -> Self::State {
        let mut state = SmaState::default();
        for candle in historical {
            push(&mut state, period(params), source(params).value(candle));
        }
        state
    }

    fn on_new_candle(&self, candle: &Candle, params: &Params, state: &mut Self::State) -> IndicatorResult {
        let value = source(params).value(candle);
        push(state, period(params), value);

        if state.window.len() < period(params) {
            return IndicatorResult::empty();
        }
        let mean = state.sum / Decimal::from(state.window.len());
        IndicatorResult::with_value("sma", mean)
    }

    fn visualization(&self) -> &'static [SeriesVisual] {
        &[SeriesVisual {
            name: "sma",
            display_name: "SMA",
            render_kind: RenderKind::Line,
            color: "#2962FF",
            width: 2,
            pane: PanePlacement::Price,
        }]
    }

    fn required_data(&self) -> &'static [DataType] {
        &[DataType::Kline]
    }
}

fn push(state: &mut SmaState, period: usize, value: Decimal) {
    state.window.push_back(value);
    state.sum += value;
    if state.window.len() > period {
        if let Some(evicted) = state.window.pop_front() {
            state.sum -= evicted;
        }
    }
}
