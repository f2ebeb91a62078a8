//! Absorption: flags candles where large opposing trade volume failed to move price, i.e. one
//! side was absorbed by resting liquidity rather than pushing through it.

use crate::contract::{
    Category, DataType, Indicator, IndicatorResult, PanePlacement, PriceSource, RenderKind,
    SeriesVisual,
};
use crate::params::{ParamSpec, ParamValue, Params};
use market_data::{Candle, Trade};
use market_instrument::Quantity;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;

static PARAM_SCHEMA: Lazy<Vec<ParamSpec>> = Lazy::new(|| {
    vec![ParamSpec::new("ratioThreshold", "Ratio Threshold", ParamValue::Decimal(Decimal::new(70, 2)))
        .with_range(ParamValue::Decimal(Decimal::ZERO), ParamValue::Decimal(Decimal::ONE))]
});

fn ratio_threshold(params: &Params) -> Decimal {
    params.get_decimal("ratioThreshold").unwrap_or(Decimal::new(70, 2))
}

#[derive(Debug, Default)]
pub struct AbsorptionState {
    buy_volume: Quantity,
    sell_volume: Quantity,
}

/// Buy/sell volume accumulates through the candle same as [`crate::library::volume::Volume`];
/// on close, the weaker side's volume relative to the stronger side and the candle's realized
/// range together decide whether the bar is flagged as an absorption candle (large contested
/// volume, little net price movement).
#[derive(Debug, Clone, Copy)]
pub struct Absorption;

impl Indicator for Absorption {
    type State = AbsorptionState;

    fn id(&self) -> &'static str {
        "absorption"
    }
    fn name(&self) -> &'static str {
        "Absorption"
    }
    fn description(&self) -> &'static str {
        "Flags candles where large opposing volume failed to move price proportionally."
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
        AbsorptionState::default()
    }

    fn on_new_candle(&self, candle: &Candle, params: &Params, state: &mut Self::State) -> IndicatorResult {
        let buy = state.buy_volume.inner();
        let sell = state.sell_volume.inner();
        let total = buy + sell;

        let (weaker, stronger) = if buy < sell { (buy, sell) } else { (sell, buy) };
        let contested_ratio = if stronger.is_zero() { Decimal::ZERO } else { weaker / stronger };

        let range = PriceSource::High.value(candle) - PriceSource::Low.value(candle);
        let body = (PriceSource::Close.value(candle) - PriceSource::Open.value(candle)).abs();
        let absorbed = !total.is_zero() && contested_ratio >= ratio_threshold(params) && body <= range / Decimal::from(4);

        state.buy_volume = Quantity::zero();
        state.sell_volume = Quantity::zero();

        let mut result = IndicatorResult::empty();
        result.values.insert("absorbed".to_string(), if absorbed { Decimal::ONE } else { Decimal::ZERO });
        result.values.insert("contestedRatio".to_string(), contested_ratio);
        result
    }

    fn on_trade_update(&self, trade: &Trade, _params: &Params, state: &mut Self::State) -> IndicatorResult {
        if trade.is_aggressive_buy() {
            state.buy_volume = state.buy_volume + trade.quantity;
        } else {
            state.sell_volume = state.sell_volume + trade.quantity;
        }
        IndicatorResult::empty()
    }

    fn visualization(&self) -> &'static [SeriesVisual] {
        &[SeriesVisual {
            name: "absorbed",
            display_name: "Absorption",
            render_kind: RenderKind::Histogram,
            color: "#D32F2F",
            width: 1,
            pane: PanePlacement::Separate(2),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use market_instrument::{Interval, Price};
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

    fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        let open_time = Utc::now();
        Candle::new(
            Interval::OneMinute,
            open_time,
            open_time + chrono::Duration::minutes(1),
            Price::new(open),
            Price::new(high),
            Price::new(low),
            Price::new(close),
            Quantity::zero(),
            Quantity::zero(),
            2,
            true,
        )
        .unwrap()
    }

    #[test]
    fn heavy_contested_volume_with_small_body_is_flagged() {
        let absorption = Absorption;
        let params = Params::validate(&PARAM_SCHEMA, &std::collections::HashMap::new()).unwrap();
        let mut state = absorption.init(&[], &params);

        absorption.on_trade_update(&trade(dec!(100), false), &params, &mut state);
        absorption.on_trade_update(&trade(dec!(90), true), &params, &mut state);

        let result = absorption.on_new_candle(&candle(dec!(100), dec!(104), dec!(96), dec!(100.5)), &params, &mut state);
        assert_eq!(result.values.get("absorbed").copied(), Some(dec!(1)));
    }

    #[test]
    fn one_sided_volume_is_not_flagged() {
        let absorption = Absorption;
        let params = Params::validate(&PARAM_SCHEMA, &std::collections::HashMap::new()).unwrap();
        let mut state = absorption.init(&[], &params);

        absorption.on_trade_update(&trade(dec!(100), false), &params, &mut state);

        let result = absorption.on_new_candle(&candle(dec!(100), dec!(104), dec!(96), dec!(103)), &params, &mut state);
        assert_eq!(result.values.get("absorbed").copied(), Some(dec!(0)));
    }
}
