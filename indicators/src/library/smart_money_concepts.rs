//! Smart Money Concepts: structural break detection (BOS/CHoCH) against swing and internal
//! pivots, 3-bar fair-value gaps, and trailing premium/equilibrium/discount zone boxes.

use crate::contract::{
    Category, DataType, Indicator, IndicatorResult, PanePlacement, PriceSource, RenderKind,
    SeriesVisual,
};
use crate::params::{ParamSpec, ParamValue, Params};
use crate::shape::{ArrowShape, BoxShape, Shape};
use market_data::Candle;
use market_instrument::Price;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::collections::VecDeque;

static PARAM_SCHEMA: Lazy<Vec<ParamSpec>> = Lazy::new(|| {
    vec![
        ParamSpec::new("swingLength", "Swing Pivot Length", ParamValue::Integer(50))
            .with_range(ParamValue::Integer(5), ParamValue::Integer(500)),
        ParamSpec::new("atrPeriod", "ATR Filter Period", ParamValue::Integer(14))
            .with_range(ParamValue::Integer(2), ParamValue::Integer(200)),
    ]
});

const INTERNAL_LENGTH: usize = 5;

fn swing_length(params: &Params) -> usize {
    params.get_integer("swingLength").unwrap_or(50).max(5) as usize
}

fn atr_period(params: &Params) -> usize {
    params.get_integer("atrPeriod").unwrap_or(14).max(2) as usize
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Trend {
    Up,
    Down,
}

#[derive(Debug, Clone)]
struct FairValueGap {
    top: Decimal,
    bottom: Decimal,
    bullish: bool,
}

#[derive(Debug)]
struct PivotTracker {
    length: usize,
    highs: VecDeque<Decimal>,
    lows: VecDeque<Decimal>,
    last_pivot_high: Option<Decimal>,
    last_pivot_low: Option<Decimal>,
}

impl PivotTracker {
    fn new(length: usize) -> Self {
        Self { length, highs: VecDeque::new(), lows: VecDeque::new(), last_pivot_high: None, last_pivot_low: None }
    }

    /// Pushes one bar and, once a full `2*length+1`-bar centered window is available, updates the
    /// last confirmed pivot high/low.
    fn push(&mut self, high: Decimal, low: Decimal) {
        let window = 2 * self.length + 1;
        self.highs.push_back(high);
        self.lows.push_back(low);
        if self.highs.len() > window {
            self.highs.pop_front();
            self.lows.pop_front();
        }
        if self.highs.len() == window {
            let center = self.length;
            if self.highs[center] >= self.highs.iter().copied().fold(Decimal::MIN, Decimal::max) {
                self.last_pivot_high = Some(self.highs[center]);
            }
            if self.lows[center] <= self.lows.iter().copied().fold(Decimal::MAX, Decimal::min) {
                self.last_pivot_low = Some(self.lows[center]);
            }
        }
    }
}

#[derive(Debug)]
pub struct SmcState {
    swing: PivotTracker,
    internal: PivotTracker,
    trend: Option<Trend>,
    true_ranges: VecDeque<Decimal>,
    previous_close: Option<Decimal>,
    fair_value_gaps: VecDeque<FairValueGap>,
    candle_history: VecDeque<(Decimal, Decimal, Decimal)>,
    extreme_high: Option<Decimal>,
    extreme_low: Option<Decimal>,
}

impl Default for SmcState {
    fn default() -> Self {
        Self {
            swing: PivotTracker::new(50),
            internal: PivotTracker::new(INTERNAL_LENGTH),
            trend: None,
            true_ranges: VecDeque::new(),
            previous_close: None,
            fair_value_gaps: VecDeque::new(),
            candle_history: VecDeque::new(),
            extreme_high: None,
            extreme_low: None,
        }
    }
}

/// Smart Money Concepts. See module docs; structure breaks and fair-value gaps are emitted as
/// arrow/box shapes, premium/discount/equilibrium zones as boxes trailing the current swing
/// range.
#[derive(Debug, Clone, Copy)]
pub struct SmartMoneyConcepts;

fn atr(true_ranges: &VecDeque<Decimal>, period: usize) -> Decimal {
    if true_ranges.is_empty() {
        return Decimal::ZERO;
    }
    let take = true_ranges.len().min(period);
    let sum: Decimal = true_ranges.iter().rev().take(take).sum();
    sum / Decimal::from(take as i64)
}

impl Indicator for SmartMoneyConcepts {
    type State = SmcState;

    fn id(&self) -> &'static str {
        "smart_money_concepts"
    }
    fn name(&self) -> &'static str {
        "Smart Money Concepts"
    }
    fn description(&self) -> &'static str {
        "Structure breaks, fair-value gaps and premium/discount zones from swing structure."
    }
    fn category(&self) -> Category {
        Category::SmartMoney
    }
    fn param_schema(&self) -> &'static [ParamSpec] {
        &PARAM_SCHEMA
    }

    fn minimum_candles(&self, params: &Params) -> usize {
        2 * swing_length(params) + 1
    }

    fn init(&self, historical: &[Candle], params: &Params) -> Self::State {
        let mut state = SmcState {
            swing: PivotTracker::new(swing_length(params)),
            internal: PivotTracker::new(INTERNAL_LENGTH),
            ..SmcState::default()
        };
        for candle in historical {
            let _ = self.on_new_candle(candle, params, &mut state);
        }
        state
    }

    fn on_new_candle(&self, candle: &Candle, params: &Params, state: &mut Self::State) -> IndicatorResult {
        let (high, low, close) = (
            PriceSource::High.value(candle),
            PriceSource::Low.value(candle),
            PriceSource::Close.value(candle),
        );

        let true_range = match state.previous_close {
            Some(previous) => (high - low).max((high - previous).abs()).max((low - previous).abs()),
            None => high - low,
        };
        state.true_ranges.push_back(true_range);
        if state.true_ranges.len() > atr_period(params) * 2 {
            state.true_ranges.pop_front();
        }

        state.swing.push(high, low);
        state.internal.push(high, low);

        let mut shapes = Vec::new();
        let mut structure_break = 0i64;

        if let Some(pivot_high) = state.swing.last_pivot_high {
            if close > pivot_high && state.trend != Some(Trend::Up) {
                let label = if state.trend.is_some() { "CHoCH" } else { "BOS" };
                state.trend = Some(Trend::Up);
                structure_break = 1;
                shapes.push(Shape::Arrow(ArrowShape {
                    time: candle.open_time.timestamp(),
                    direction: "up".to_string(),
                    text: label.to_string(),
                    color: "#26A69A".to_string(),
                }));

                let atr_value = atr(&state.true_ranges, atr_period(params));
                if let Some(opposing_low) = state.swing.last_pivot_low {
                    if (pivot_high - opposing_low) >= atr_value {
                        // order block candidate recorded as a box at the breaking leg's origin
                        shapes.push(Shape::Box(BoxShape {
                            time1: candle.open_time.timestamp(),
                            time2: candle.open_time.timestamp(),
                            price1: Price::new(pivot_high),
                            price2: Price::new(opposing_low),
                            label: "smc-ob-bullish".to_string(),
                            color: "#26A69A".to_string(),
                        }));
                    }
                }
            }
        }
        if let Some(pivot_low) = state.swing.last_pivot_low {
            if close < pivot_low && state.trend != Some(Trend::Down) {
                let label = if state.trend.is_some() { "CHoCH" } else { "BOS" };
                state.trend = Some(Trend::Down);
                structure_break = -1;
                shapes.push(Shape::Arrow(ArrowShape {
                    time: candle.open_time.timestamp(),
                    direction: "down".to_string(),
                    text: label.to_string(),
                    color: "#EF5350".to_string(),
                }));
            }
        }

        state.candle_history.push_back((high, low, close));
        if state.candle_history.len() > 3 {
            state.candle_history.pop_front();
        }
        if state.candle_history.len() == 3 {
            let first = state.candle_history[0];
            let third = state.candle_history[2];
            if third.1 > first.0 {
                state.fair_value_gaps.push_back(FairValueGap { top: third.1, bottom: first.0, bullish: true });
            } else if third.0 < first.1 {
                state.fair_value_gaps.push_back(FairValueGap { top: first.1, bottom: third.0, bullish: false });
            }
        }
        state.fair_value_gaps.retain(|gap| {
            let filled = if gap.bullish { low <= gap.bottom } else { high >= gap.top };
            !filled
        });

        state.extreme_high = Some(state.extreme_high.map_or(high, |current| current.max(high)));
        state.extreme_low = Some(state.extreme_low.map_or(low, |current| current.min(low)));
        if let (Some(extreme_high), Some(extreme_low)) = (state.extreme_high, state.extreme_low) {
            let equilibrium = (extreme_high + extreme_low) / Decimal::from(2);
            shapes.push(Shape::Box(BoxShape {
                time1: candle.open_time.timestamp(),
                time2: candle.open_time.timestamp(),
                price1: Price::new(extreme_high),
                price2: Price::new(equilibrium),
                label: "premium".to_string(),
                color: "#EF535033".to_string(),
            }));
            shapes.push(Shape::Box(BoxShape {
                time1: candle.open_time.timestamp(),
                time2: candle.open_time.timestamp(),
                price1: Price::new(equilibrium),
                price2: Price::new(extreme_low),
                label: "discount".to_string(),
                color: "#26A69A33".to_string(),
            }));
        }

        state.previous_close = Some(close);

        let mut result = IndicatorResult::empty();
        result.values.insert("structureBreak".to_string(), Decimal::from(structure_break));
        result.values.insert("activeFairValueGaps".to_string(), Decimal::from(state.fair_value_gaps.len() as i64));
        result.with_shapes(shapes)
    }

    fn visualization(&self) -> &'static [SeriesVisual] {
        &[SeriesVisual {
            name: "structureBreak",
            display_name: "Structure Break",
            render_kind: RenderKind::Histogram,
            color: "#5C6BC0",
            width: 1,
            pane: PanePlacement::Separate(4),
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
    use market_instrument::{Interval, Quantity};
    use rust_decimal_macros::dec;

    fn candle(high: Decimal, low: Decimal, close: Decimal) -> Candle {
        let open_time = Utc::now();
        Candle::new(
            Interval::OneMinute,
            open_time,
            open_time + chrono::Duration::minutes(1),
            Price::new(close),
            Price::new(high),
            Price::new(low),
            Price::new(close),
            Quantity::zero(),
            Quantity::zero(),
            1,
            true,
        )
        .unwrap()
    }

    #[test]
    fn three_bar_gap_is_tracked_until_filled() {
        let smc = SmartMoneyConcepts;
        let params = Params::validate(&PARAM_SCHEMA, &std::collections::HashMap::new()).unwrap();
        let mut state = smc.init(&[], &params);

        smc.on_new_candle(&candle(dec!(100), dec!(95), dec!(98)), &params, &mut state);
        smc.on_new_candle(&candle(dec!(105), dec!(101), dec!(103)), &params, &mut state);
        let third = smc.on_new_candle(&candle(dec!(110), dec!(106), dec!(108)), &params, &mut state);
        assert_eq!(third.values.get("activeFairValueGaps").copied(), Some(dec!(1)));

        let fill = smc.on_new_candle(&candle(dec!(106), dec!(99), dec!(100)), &params, &mut state);
        assert_eq!(fill.values.get("activeFairValueGaps").copied(), Some(dec!(0)));
    }
}
