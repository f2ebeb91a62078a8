//! Trend Regularity Adaptive Moving Average: an adaptive moving average whose smoothing
//! constant tracks how often the rolling high/low extremes are broken.

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
        ParamSpec::new("length", "Length", ParamValue::Integer(14))
            .with_range(ParamValue::Integer(2), ParamValue::Integer(200)),
        ParamSpec::new("source", "Source", ParamValue::String("close".to_string())),
    ]
});

fn length(params: &Params) -> usize {
    params.get_integer("length").unwrap_or(14).max(2) as usize
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

#[derive(Debug)]
pub struct TramaState {
    prices: VecDeque<Decimal>,
    signals: VecDeque<u8>,
    previous_highest: Option<Decimal>,
    previous_lowest: Option<Decimal>,
    ama: Option<Decimal>,
}

impl Default for TramaState {
    fn default() -> Self {
        Self {
            prices: VecDeque::new(),
            signals: VecDeque::new(),
            previous_highest: None,
            previous_lowest: None,
            ama: None,
        }
    }
}

/// TRAMA. State: ring buffer of the last `length` source prices, a parallel ring of 0/1 trend
/// signals, the previous window's highest/lowest, and the current AMA value.
#[derive(Debug, Clone, Copy)]
pub struct Trama;

fn step(state: &mut TramaState, window: usize, value: Decimal) -> Option<Decimal> {
    state.prices.push_back(value);
    if state.prices.len() > window {
        state.prices.pop_front();
    }

    let current_highest = state.prices.iter().copied().fold(Decimal::MIN, Decimal::max);
    let current_lowest = state.prices.iter().copied().fold(Decimal::MAX, Decimal::min);

    let signal = match (state.previous_highest, state.previous_lowest) {
        (Some(prev_high), Some(prev_low)) if current_highest > prev_high || current_lowest < prev_low => 1u8,
        (None, None) => 0u8,
        _ => 0u8,
    };
    state.signals.push_back(signal);
    if state.signals.len() > window {
        state.signals.pop_front();
    }

    state.previous_highest = Some(current_highest);
    state.previous_lowest = Some(current_lowest);

    let mean_signal = Decimal::from(state.signals.iter().map(|&s| s as i64).sum::<i64>()) / Decimal::from(state.signals.len().max(1));
    let trend_constant = mean_signal * mean_signal;

    let ama = match state.ama {
        None => value,
        Some(previous_ama) => previous_ama + trend_constant * (value - previous_ama),
    };
    state.ama = Some(ama);

    if state.prices.len() < window {
        None
    } else {
        Some(ama)
    }
}

impl Indicator for Trama {
    type State = TramaState;

    fn id(&self) -> &'static str {
        "trama"
    }
    fn name(&self) -> &'static str {
        "Trend Regularity Adaptive Moving Average"
    }
    fn description(&self) -> &'static str {
        "Adaptive moving average whose smoothing constant tracks extreme-breaking frequency."
    }
    fn category(&self) -> Category {
        Category::Trend
    }
    fn param_schema(&self) -> &'static [ParamSpec] {
        &PARAM_SCHEMA
    }

    fn minimum_candles(&self, params: &Params) -> usize {
        length(params)
    }

    fn init(&self, historical: &[Candle], params: &Params) -> Self::State {
        let mut state = TramaState::default();
        for candle in historical {
            step(&mut state, length(params), source(params).value(candle));
        }
        state
    }

    fn on_new_candle(&self, candle: &Candle, params: &Params, state: &mut Self::State) -> IndicatorResult {
        let value = source(params).value(candle);
        match step(state, length(params), value) {
            Some(ama) => IndicatorResult::with_value("trama", ama),
            None => IndicatorResult::empty(),
        }
    }

    fn visualization(&self) -> &'static [SeriesVisual] {
        &[SeriesVisual {
            name: "trama",
            display_name: "TRAMA",
            render_kind: RenderKind::Line,
            color: "#FF6D00",
            width: 2,
            pane: PanePlacement::Price,
        }]
    }

    fn required_data(&self) -> &'static [DataType] {
        &[DataType::Kline]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use market_instrument::{Interval, Price, Quantity};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn params_with_length(length: i64) -> Params {
        let mut map = HashMap::new();
        map.insert("length".to_string(), ParamValue::Integer(length));
        Params::validate(&[ParamSpec::new("length", "Length", ParamValue::Integer(length))], &map).unwrap()
    }

    fn candle(close: Decimal) -> Candle {
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

    #[test]
    fn first_value_seeds_ama_with_the_source_price() {
        let params = params_with_length(3);
        let trama = Trama;
        let mut state = trama.init(&[], &params);
        // Below window length: no output yet, but AMA is internally seeded from the first price.
        let _ = trama.on_new_candle(&candle(dec!(100)), &params, &mut state);
        assert_eq!(state.ama, Some(dec!(100)));
    }

    #[test]
    fn emits_once_window_is_full() {
        let params = params_with_length(3);
        let trama = Trama;
        let mut state = trama.init(&[], &params);
        let closes = [dec!(100), dec!(101), dec!(102), dec!(103)];
        let mut results = Vec::new();
        for close in closes {
            results.push(trama.on_new_candle(&candle(close), &params, &mut state).values.get("trama").is_some());
        }
        assert_eq!(results, vec![false, false, true, true]);
    }
}
