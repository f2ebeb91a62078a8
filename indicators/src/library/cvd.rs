//! Cumulative Volume Delta: a running total of (aggressive-buy volume − aggressive-sell volume)
//! across the whole stream, snapshotted on every candle close.

use crate::contract::{
    Category, DataType, Indicator, IndicatorResult, PanePlacement, RenderKind, SeriesVisual,
};
use crate::params::{ParamSpec, Params};
use market_data::{Candle, Trade};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;

static PARAM_SCHEMA: Lazy<Vec<ParamSpec>> = Lazy::new(Vec::new);

#[derive(Debug, Default)]
pub struct CvdState {
    cumulative: Decimal,
}

/// Cumulative Volume Delta. Never resets: each trade nudges the running total by its signed
/// volume, and the current total is reported on every candle close.
#[derive(Debug, Clone, Copy)]
pub struct Cvd;

impl Indicator for Cvd {
    type State = CvdState;

    fn id(&self) -> &'static str {
        "cvd"
    }
    fn name(&self) -> &'static str {
        "Cumulative Volume Delta"
    }
    fn description(&self) -> &'static str {
        "Running total of aggressive-buy minus aggressive-sell trade volume."
    }
    fn category(&self) -> Category {
        Category::OrderFlow
    }
    fn param_schema(&self) -> &'static [ParamSpec] {
        &PARAM_SCHEMA
    }
    fn required_data(&self) -> &'static [DataType] {
        &[DataType::Kline, DataType::Trade]
    }

    fn minimum_candles(&self, _params: &Params) -> usize {
        0
    }

    fn init(&self, _historical: &[Candle], _params: &Params) -> Self::State {
        CvdState::default()
    }

    fn on_new_candle(&self, _candle: &Candle, _params: &Params, state: &mut Self::State) -> IndicatorResult {
        IndicatorResult::with_value("cvd", state.cumulative)
    }

    fn on_trade_update(&self, trade: &Trade, _params: &Params, state: &mut Self::State) -> IndicatorResult {
        let signed = if trade.is_aggressive_buy() { trade.quantity.inner() } else { -trade.quantity.inner() };
        state.cumulative += signed;
        IndicatorResult::empty()
    }

    fn visualization(&self) -> &'static [SeriesVisual] {
        &[SeriesVisual {
            name: "cvd",
            display_name: "CVD",
            render_kind: RenderKind::Line,
            color: "#7E57C2",
            width: 2,
            pane: PanePlacement::Separate(1),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use market_instrument::{Interval, Price, Quantity};
    use rust_decimal_macros::dec;

    fn trade(quantity: Decimal, buyer_is_maker: bool) -> Trade {
        Trade {
            id: 1,
            price: Price::new(dec!(100)),
            quantity: Quantity::new(quantity),
            quote_quantity: Quantity::zero(),
            time: Utc::now(),
            buyer_is_maker,
            aggregate_range: None,
        }
    }

    fn candle() -> Candle {
        let open_time = Utc::now();
        Candle::new(
            Interval::OneMinute,
            open_time,
            open_time + chrono::Duration::minutes(1),
            Price::new(dec!(100)),
            Price::new(dec!(100)),
            Price::new(dec!(100)),
            Price::new(dec!(100)),
            Quantity::zero(),
            Quantity::zero(),
            1,
            true,
        )
        .unwrap()
    }

    #[test]
    fn accumulates_across_candle_boundaries() {
        let cvd = Cvd;
        let params = Params::default();
        let mut state = cvd.init(&[], &params);

        cvd.on_trade_update(&trade(dec!(5), false), &params, &mut state);
        let first = cvd.on_new_candle(&candle(), &params, &mut state);
        assert_eq!(first.values.get("cvd").copied(), Some(dec!(5)));

        cvd.on_trade_update(&trade(dec!(2), true), &params, &mut state);
        let second = cvd.on_new_candle(&candle(), &params, &mut state);
        assert_eq!(second.values.get("cvd").copied(), Some(dec!(3)));
    }
}
