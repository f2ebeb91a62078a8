//! Echo Forecast: finds the historical window that best resembles the most recent price action
//! and projects it forward as a short forecast.

use crate::contract::{
    Category, DataType, Indicator, IndicatorResult, PanePlacement, PriceSource, RenderKind,
    SeriesVisual,
};
use crate::params::{ParamSpec, ParamValue, Params};
use crate::shape::{BoxShape, LineShape, Shape};
use market_data::Candle;
use market_instrument::Price;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::collections::VecDeque;

static PARAM_SCHEMA: Lazy<Vec<ParamSpec>> = Lazy::new(|| {
    vec![
        ParamSpec::new("evaluationWindow", "Evaluation Window", ParamValue::Integer(100))
            .with_range(ParamValue::Integer(5), ParamValue::Integer(2000)),
        ParamSpec::new("forecastWindow", "Forecast Window", ParamValue::Integer(10))
            .with_range(ParamValue::Integer(2), ParamValue::Integer(500)),
        ParamSpec::new("similarity", "Match on Similarity (false = dissimilarity)", ParamValue::Boolean(true)),
        ParamSpec::new("construction", "Forecast Construction", ParamValue::String("cumulative".to_string())),
    ]
});

fn evaluation_window(params: &Params) -> usize {
    params.get_integer("evaluationWindow").unwrap_or(100).max(1) as usize
}

fn forecast_window(params: &Params) -> usize {
    params.get_integer("forecastWindow").unwrap_or(10).max(2) as usize
}

fn similarity(params: &Params) -> bool {
    params.get_bool("similarity").unwrap_or(true)
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Construction {
    Cumulative,
    Mean,
    LinearRegression,
}

fn construction(params: &Params) -> Construction {
    match params.get_string("construction") {
        Some("mean") => Construction::Mean,
        Some("linear-regression") => Construction::LinearRegression,
        _ => Construction::Cumulative,
    }
}

#[derive(Debug, Default)]
pub struct EchoForecastState {
    ring: VecDeque<Decimal>,
}

/// Echo Forecast. See module docs; the sliding-window correlation match and its three forecast
/// constructions are exercised by scenario S5 (cumulative construction).
#[derive(Debug, Clone, Copy)]
pub struct EchoForecast;

fn pearson_correlation(a: &[Decimal], b: &[Decimal]) -> Decimal {
    let n = Decimal::from(a.len() as i64);
    if a.is_empty() || a.len() != b.len() {
        return Decimal::ZERO;
    }
    let mean_a = a.iter().sum::<Decimal>() / n;
    let mean_b = b.iter().sum::<Decimal>() / n;

    let mut covariance = Decimal::ZERO;
    let mut variance_a = Decimal::ZERO;
    let mut variance_b = Decimal::ZERO;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = *x - mean_a;
        let dy = *y - mean_b;
        covariance += dx * dy;
        variance_a += dx * dx;
        variance_b += dy * dy;
    }

    if variance_a.is_zero() || variance_b.is_zero() {
        return if covariance.is_zero() { Decimal::ONE } else { Decimal::ZERO };
    }

    // Decimal has no sqrt; approximate via f64 purely for ranking offsets by correlation
    // strength — never used as a price/volume value.
    let denominator = (variance_a.to_string().parse::<f64>().unwrap_or(0.0)
        * variance_b.to_string().parse::<f64>().unwrap_or(0.0))
    .sqrt();
    if denominator == 0.0 {
        return Decimal::ZERO;
    }
    let covariance_f64 = covariance.to_string().parse::<f64>().unwrap_or(0.0);
    Decimal::try_from(covariance_f64 / denominator).unwrap_or(Decimal::ZERO)
}

fn deltas_of(window: &[Decimal], count: usize) -> Vec<Decimal> {
    let mut diffs: Vec<Decimal> = window.windows(2).map(|pair| pair[1] - pair[0]).collect();
    if diffs.is_empty() {
        diffs.push(Decimal::ZERO);
    }
    let mut result = Vec::with_capacity(count);
    for i in 0..count {
        result.push(diffs[i.min(diffs.len() - 1)]);
    }
    result
}

fn linear_fit(values: &[Decimal]) -> (Decimal, Decimal) {
    let n = values.len();
    let n_dec = Decimal::from(n as i64);
    let sum_x = Decimal::from((0..n).sum::<usize>() as i64);
    let sum_y: Decimal = values.iter().sum();
    let sum_xy: Decimal = values.iter().enumerate().map(|(i, v)| Decimal::from(i as i64) * *v).sum();
    let sum_xx: Decimal = (0..n).map(|i| Decimal::from((i * i) as i64)).sum();

    let denominator = n_dec * sum_xx - sum_x * sum_x;
    if denominator.is_zero() {
        return (Decimal::ZERO, values.first().copied().unwrap_or(Decimal::ZERO));
    }
    let slope = (n_dec * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n_dec;
    (slope, intercept)
}

impl Indicator for EchoForecast {
    type State = EchoForecastState;

    fn id(&self) -> &'static str {
        "echo_forecast"
    }
    fn name(&self) -> &'static str {
        "Echo Forecast"
    }
    fn description(&self) -> &'static str {
        "Projects the most similar (or dissimilar) historical window forward as a forecast."
    }
    fn category(&self) -> Category {
        Category::Forecast
    }
    fn param_schema(&self) -> &'static [ParamSpec] {
        &PARAM_SCHEMA
    }

    fn minimum_candles(&self, params: &Params) -> usize {
        evaluation_window(params) + 2 * forecast_window(params)
    }

    fn init(&self, historical: &[Candle], params: &Params) -> Self::State {
        let mut state = EchoForecastState::default();
        for candle in historical {
            let _ = self.on_new_candle(candle, params, &mut state);
        }
        state
    }

    fn on_new_candle(&self, candle: &Candle, params: &Params, state: &mut Self::State) -> IndicatorResult {
        let capacity = evaluation_window(params) + 2 * forecast_window(params);
        let forecast_len = forecast_window(params);

        state.ring.push_back(PriceSource::Close.value(candle));
        if state.ring.len() > capacity {
            state.ring.pop_front();
        }

        if state.ring.len() < capacity {
            return IndicatorResult::empty();
        }

        let values: Vec<Decimal> = state.ring.iter().copied().collect();
        let reference: Vec<Decimal> = values[values.len() - forecast_len..].to_vec();
        let evaluation_range = &values[..values.len() - forecast_len];

        let want_similarity = similarity(params);
        let mut best_offset = 0usize;
        let mut best_score: Option<f64> = None;
        for offset in 0..=(evaluation_range.len() - forecast_len) {
            let window = &evaluation_range[offset..offset + forecast_len];
            let score = pearson_correlation(window, &reference).to_string().parse::<f64>().unwrap_or(0.0);
            // `>=`/`<=` rather than strict comparison: on a tie, prefer the most recent
            // occurrence of the pattern, the one closest to the point being forecast.
            let better = match best_score {
                None => true,
                Some(current) => if want_similarity { score >= current } else { score <= current },
            };
            if better {
                best_score = Some(score);
                best_offset = offset;
            }
        }

        let matched_window = &evaluation_range[best_offset..best_offset + forecast_len];
        let deltas = deltas_of(matched_window, forecast_len);

        let last_price = *values.last().unwrap();
        let forecast: Vec<Decimal> = match construction(params) {
            Construction::Cumulative => {
                let mut running = last_price;
                deltas
                    .iter()
                    .map(|delta| {
                        running += *delta;
                        running
                    })
                    .collect()
            }
            Construction::Mean => {
                let reference_mean = reference.iter().sum::<Decimal>() / Decimal::from(reference.len() as i64);
                let mut running = reference_mean;
                deltas
                    .iter()
                    .map(|delta| {
                        running += *delta;
                        running
                    })
                    .collect()
            }
            Construction::LinearRegression => {
                let (slope, intercept) = linear_fit(&reference);
                let n = reference.len();
                deltas
                    .iter()
                    .enumerate()
                    .map(|(i, delta)| intercept + slope * Decimal::from((n + i) as i64) + *delta)
                    .collect()
            }
        };

        let mut shapes = Vec::new();
        let base_time = candle.open_time.timestamp();
        let interval_seconds = (candle.close_time - candle.open_time).num_seconds().max(1);
        for (i, window) in forecast.windows(2).enumerate() {
            shapes.push(Shape::Line(LineShape {
                time1: base_time + (i as i64) * interval_seconds,
                time2: base_time + ((i + 1) as i64) * interval_seconds,
                price1: Price::new(window[0]),
                price2: Price::new(window[1]),
                color: "#26A69A".to_string(),
            }));
        }
        shapes.push(Shape::Box(BoxShape {
            time1: base_time - (forecast_len as i64) * interval_seconds,
            time2: base_time,
            price1: Price::new(reference.iter().copied().fold(Decimal::MIN, Decimal::max)),
            price2: Price::new(reference.iter().copied().fold(Decimal::MAX, Decimal::min)),
            label: "reference".to_string(),
            color: "#42A5F533".to_string(),
        }));
        shapes.push(Shape::Box(BoxShape {
            time1: base_time - (capacity as i64) * interval_seconds,
            time2: base_time - (forecast_len as i64) * interval_seconds,
            price1: Price::new(evaluation_range.iter().copied().fold(Decimal::MIN, Decimal::max)),
            price2: Price::new(evaluation_range.iter().copied().fold(Decimal::MAX, Decimal::min)),
            label: "evaluation".to_string(),
            color: "#AB47BC33".to_string(),
        }));

        let mut result = IndicatorResult::empty();
        for (i, value) in forecast.iter().enumerate() {
            result.values.insert(format!("forecast{i}"), *value);
        }
        result.with_shapes(shapes)
    }

    fn visualization(&self) -> &'static [SeriesVisual] {
        &[SeriesVisual {
            name: "forecast0",
            display_name: "Echo Forecast",
            render_kind: RenderKind::Line,
            color: "#26A69A",
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
    use market_instrument::{Interval, Quantity};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn params(evaluation_window: i64, forecast_window: i64) -> Params {
        let mut input = HashMap::new();
        input.insert("evaluationWindow".to_string(), ParamValue::Integer(evaluation_window));
        input.insert("forecastWindow".to_string(), ParamValue::Integer(forecast_window));
        Params::validate(&PARAM_SCHEMA, &input).unwrap()
    }

    fn candle(close: Decimal, open_time: chrono::DateTime<Utc>) -> Candle {
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

    /// Scenario S5: evaluationWindow=10, forecastWindow=3, source sequence
    /// `[1,2,3,4,5,6,7,8,9,10, 1,2,3, 11,12,13]`. The reference window `[11,12,13]` correlates
    /// most strongly with `[1,2,3]`; the cumulative forecast from 13 is `[14, 15, 16]`.
    #[test]
    fn cumulative_forecast_matches_scenario_s5() {
        let echo = EchoForecast;
        let params = params(10, 3);
        let mut state = echo.init(&[], &params);

        let sequence: [i64; 16] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 1, 2, 3, 11, 12, 13];
        let open_time = Utc::now();
        let mut last_result = IndicatorResult::empty();
        for (i, value) in sequence.iter().enumerate() {
            last_result = echo.on_new_candle(
                &candle(Decimal::from(*value), open_time + chrono::Duration::minutes(i as i64)),
                &params,
                &mut state,
            );
        }

        assert_eq!(last_result.values.get("forecast0").copied(), Some(dec!(14)));
        assert_eq!(last_result.values.get("forecast1").copied(), Some(dec!(15)));
        assert_eq!(last_result.values.get("forecast2").copied(), Some(dec!(16)));
    }
}
