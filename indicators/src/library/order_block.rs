//! Order Block: volume-pivot based supply/demand zones. A 5-bar centered volume pivot forming
//! during a downtrend records a bullish zone; one forming during an uptrend records a bearish
//! zone. Zones are touched (and signal once) the first time a candle's wick or close enters
//! them, and removed once price closes through their far side.

use crate::contract::{
    Category, DataType, Indicator, IndicatorResult, PanePlacement, PriceSource, RenderKind,
    SeriesVisual,
};
use crate::params::{ParamSpec, ParamValue, Params};
use crate::shape::{BoxShape, Shape};
use market_data::Candle;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::collections::VecDeque;

static PARAM_SCHEMA: Lazy<Vec<ParamSpec>> = Lazy::new(|| {
    vec![
        ParamSpec::new("swingLength", "Oscillator Swing Length", ParamValue::Integer(50))
            .with_range(ParamValue::Integer(5), ParamValue::Integer(500)),
        ParamSpec::new("maxActiveZones", "Max Active Zones per Side", ParamValue::Integer(3))
            .with_range(ParamValue::Integer(1), ParamValue::Integer(20)),
        ParamSpec::new("useWickForTouch", "Use Wick for Touch Detection", ParamValue::Boolean(true)),
    ]
});

fn swing_length(params: &Params) -> usize {
    params.get_integer("swingLength").unwrap_or(50).max(5) as usize
}

fn max_active_zones(params: &Params) -> usize {
    params.get_integer("maxActiveZones").unwrap_or(3).max(1) as usize
}

fn use_wick(params: &Params) -> bool {
    params.get_bool("useWickForTouch").unwrap_or(true)
}

const PIVOT_WINDOW: usize = 5;
const PIVOT_CENTER: usize = 2;

/// One active supply (bearish) or demand (bullish) zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub bullish: bool,
    pub top: Decimal,
    pub bottom: Decimal,
    pub volume_strength: Decimal,
    pub touched: bool,
}

#[derive(Debug)]
struct PivotWindow {
    highs: VecDeque<Decimal>,
    lows: VecDeque<Decimal>,
    volumes: VecDeque<Decimal>,
}

impl Default for PivotWindow {
    fn default() -> Self {
        Self { highs: VecDeque::new(), lows: VecDeque::new(), volumes: VecDeque::new() }
    }
}

#[derive(Debug, Default)]
pub struct OrderBlockState {
    window: PivotWindow,
    volume_history: VecDeque<Decimal>,
    ema_close: Option<Decimal>,
    bullish_zones: VecDeque<Zone>,
    bearish_zones: VecDeque<Zone>,
}

/// Order Block. See module docs for the zone-formation and touch/mitigation rules (spec's
/// Order Block contract, exercised by scenario S4).
#[derive(Debug, Clone, Copy)]
pub struct OrderBlock;

fn update_oscillator_sign(state: &mut OrderBlockState, close: Decimal, swing: usize) -> i8 {
    let alpha = Decimal::from(2) / Decimal::from(swing as i64 + 1);
    let ema = match state.ema_close {
        None => close,
        Some(previous) => previous + alpha * (close - previous),
    };
    state.ema_close = Some(ema);
    if close > ema {
        1
    } else if close < ema {
        -1
    } else {
        0
    }
}

fn average_volume(history: &VecDeque<Decimal>) -> Decimal {
    if history.is_empty() {
        return Decimal::ZERO;
    }
    history.iter().sum::<Decimal>() / Decimal::from(history.len() as i64)
}

fn push_bounded(history: &mut VecDeque<Decimal>, value: Decimal, bound: usize) {
    history.push_back(value);
    if history.len() > bound {
        history.pop_front();
    }
}

/// Marks a zone touched on its first overlap with `candle` and reports whether it was mitigated
/// (price closed fully through the far side).
fn apply_touch_and_mitigation(zone: &mut Zone, candle: &Candle, wick: bool) -> (bool, bool) {
    let (low, high, close) = (
        PriceSource::Low.value(candle),
        PriceSource::High.value(candle),
        PriceSource::Close.value(candle),
    );

    let touches = if wick {
        high >= zone.bottom && low <= zone.top
    } else {
        close >= zone.bottom && close <= zone.top
    };

    let newly_touched = !zone.touched && touches;
    if newly_touched {
        zone.touched = true;
    }

    let mitigated = if zone.bullish { close < zone.bottom } else { close > zone.top };

    (newly_touched, mitigated)
}

fn zone_shape(zone: &Zone, time: i64, index: usize) -> Shape {
    Shape::Box(BoxShape {
        time1: time,
        time2: time,
        price1: market_instrument::Price::new(zone.top),
        price2: market_instrument::Price::new(zone.bottom),
        label: format!("{}-ob-{index}", if zone.bullish { "bullish" } else { "bearish" }),
        color: if zone.bullish { "#26A69A".to_string() } else { "#EF5350".to_string() },
    })
}

impl Indicator for OrderBlock {
    type State = OrderBlockState;

    fn id(&self) -> &'static str {
        "order_block"
    }
    fn name(&self) -> &'static str {
        "Order Block"
    }
    fn description(&self) -> &'static str {
        "Volume-pivot supply/demand zones with touch and mitigation tracking."
    }
    fn category(&self) -> Category {
        Category::SmartMoney
    }
    fn param_schema(&self) -> &'static [ParamSpec] {
        &PARAM_SCHEMA
    }

    fn minimum_candles(&self, _params: &Params) -> usize {
        PIVOT_WINDOW
    }

    fn init(&self, historical: &[Candle], params: &Params) -> Self::State {
        let mut state = OrderBlockState::default();
        for candle in historical {
            let _ = self.on_new_candle(candle, params, &mut state);
        }
        state
    }

    fn on_new_candle(&self, candle: &Candle, params: &Params, state: &mut Self::State) -> IndicatorResult {
        let swing = swing_length(params);
        let wick = use_wick(params);
        let max_zones = max_active_zones(params);

        let oscillator = update_oscillator_sign(state, PriceSource::Close.value(candle), swing);

        let volume = candle.base_volume.inner();
        push_bounded(&mut state.volume_history, volume, 20);

        state.window.highs.push_back(PriceSource::High.value(candle));
        state.window.lows.push_back(PriceSource::Low.value(candle));
        state.window.volumes.push_back(volume);
        if state.window.highs.len() > PIVOT_WINDOW {
            state.window.highs.pop_front();
            state.window.lows.pop_front();
            state.window.volumes.pop_front();
        }

        let mut shapes = Vec::new();
        let mut signal_count = 0i64;

        if state.window.volumes.len() == PIVOT_WINDOW {
            let center_volume = state.window.volumes[PIVOT_CENTER];
            let is_volume_pivot = state.window.volumes.iter().all(|&v| v <= center_volume);
            if is_volume_pivot {
                let pivot_high = state.window.highs[PIVOT_CENTER];
                let pivot_low = state.window.lows[PIVOT_CENTER];
                let average = average_volume(&state.volume_history);
                let strength = if average.is_zero() { Decimal::ZERO } else { center_volume / average };

                if oscillator < 0 {
                    let zone = Zone {
                        bullish: true,
                        top: (pivot_high + pivot_low) / Decimal::from(2),
                        bottom: pivot_low,
                        volume_strength: strength,
                        touched: false,
                    };
                    state.bullish_zones.push_back(zone);
                    if state.bullish_zones.len() > max_zones {
                        state.bullish_zones.pop_front();
                    }
                } else if oscillator > 0 {
                    let zone = Zone {
                        bullish: false,
                        top: pivot_high,
                        bottom: (pivot_high + pivot_low) / Decimal::from(2),
                        volume_strength: strength,
                        touched: false,
                    };
                    state.bearish_zones.push_back(zone);
                    if state.bearish_zones.len() > max_zones {
                        state.bearish_zones.pop_front();
                    }
                }
            }
        }

        for side in [&mut state.bullish_zones, &mut state.bearish_zones] {
            let mut mitigated_indices = Vec::new();
            for (index, zone) in side.iter_mut().enumerate() {
                let (newly_touched, mitigated) = apply_touch_and_mitigation(zone, candle, wick);
                if newly_touched {
                    signal_count += 1;
                }
                if mitigated {
                    mitigated_indices.push(index);
                }
            }
            for index in mitigated_indices.into_iter().rev() {
                side.remove(index);
            }
        }

        for (index, zone) in state.bullish_zones.iter().chain(state.bearish_zones.iter()).enumerate() {
            shapes.push(zone_shape(zone, candle.open_time.timestamp(), index));
        }

        let mut result = IndicatorResult::empty();
        result.values.insert("activeBullishZones".to_string(), Decimal::from(state.bullish_zones.len() as i64));
        result.values.insert("activeBearishZones".to_string(), Decimal::from(state.bearish_zones.len() as i64));
        result.values.insert("touchSignals".to_string(), Decimal::from(signal_count));
        result.with_shapes(shapes)
    }

    fn visualization(&self) -> &'static [SeriesVisual] {
        &[SeriesVisual {
            name: "touchSignals",
            display_name: "OB Touch Signals",
            render_kind: RenderKind::Histogram,
            color: "#AB47BC",
            width: 1,
            pane: PanePlacement::Separate(3),
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

    /// Scenario S4: a pre-formed bullish OB (top 100, bottom 95) is touched exactly once by a
    /// candle whose wick enters the zone, and a later candle that merely grazes the same zone
    /// again emits no further signal.
    #[test]
    fn touches_bullish_zone_exactly_once() {
        let order_block = OrderBlock;
        let mut state = OrderBlockState::default();
        state.bullish_zones.push_back(Zone {
            bullish: true,
            top: dec!(100),
            bottom: dec!(95),
            volume_strength: dec!(1),
            touched: false,
        });

        let params = Params::validate(
            &PARAM_SCHEMA,
            &std::collections::HashMap::new(),
        )
        .unwrap();

        let first = order_block.on_new_candle(&candle(dec!(98), dec!(96), dec!(97)), &params, &mut state);
        assert_eq!(first.values.get("touchSignals").copied(), Some(dec!(1)));
        assert!(state.bullish_zones[0].touched);

        let second = order_block.on_new_candle(&candle(dec!(99), dec!(97), dec!(98)), &params, &mut state);
        assert_eq!(second.values.get("touchSignals").copied(), Some(dec!(0)));
    }

    #[test]
    fn close_breaking_below_bottom_mitigates_bullish_zone() {
        let order_block = OrderBlock;
        let mut state = OrderBlockState::default();
        state.bullish_zones.push_back(Zone {
            bullish: true,
            top: dec!(100),
            bottom: dec!(95),
            volume_strength: dec!(1),
            touched: true,
        });

        let params = Params::validate(&PARAM_SCHEMA, &std::collections::HashMap::new()).unwrap();
        order_block.on_new_candle(&candle(dec!(95), dec!(90), dec!(91)), &params, &mut state);
        assert!(state.bullish_zones.is_empty());
    }
}
