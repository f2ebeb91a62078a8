//! Running trade volume per candle: accumulates buy/sell quantity from the trade stream,
//! resets and emits on candle close.

use crate::contract::{
    Category, DataType, Indicator, IndicatorResult, PanePlacement, RenderKind, SeriesVisual,
};
use crate::params::{ParamSpec, Params};
use market_data::{Candle, Trade};
use market_instrument::Quantity;
use once_cell::sync::Lazy;

static PARAM_SCHEMA: Lazy<Vec<ParamSpec>> = Lazy::new(Vec::new);

#[derive(Debug, Default)]
pub struct VolumeState {
    buy_volume: Quantity,
    sell_volume: Quantity,
}

/// Per-candle buy/sell volume. Trades accumulate into the current bucket; the bucket is
/// emitted and reset on candle close (spec's "consume trade events, accumulate, emit on
/// candle close" contract for the Volume/CVD/Absorption family).
#[derive(Debug, Clone, Copy)]
pub struct Volume;

impl Indicator for Volume {
    type State = VolumeState;

    fn id(&self) -> &'static str {
        "volume"
    }
    fn name(&self) -> &'static str {
        "Volume"
    }
    fn description(&self) -> &'static str {
        "Buy/sell trade volume accumulated over the current candle."
    }
    fn category(&self) -> Category {
        Category::Volume
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
        VolumeState::default()
    }

    fn on_new_candle(&self, _candle: &Candle, _params: &Params, state: &mut Self::State) -> IndicatorResult {
        let result = IndicatorResult::default()
            .with_value_pair("buyVolume", state.buy_volume.inner())
            .with_value_pair("sellVolume", state.sell_volume.inner());
        state.buy_volume = Quantity::zero();
        state.sell_volume = Quantity::zero();
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
        &[
            SeriesVisual {
                name: "buyVolume",
                display_name: "Buy Volume",
                render_kind: RenderKind::Histogram,
                color: "#26A69A",
                width: 1,
                pane: PanePlacement::Separate(1),
            },
            SeriesVisual {
                name: "sellVolume",
                display_name: "Sell Volume",
                render_kind: RenderKind::Histogram,
                color: "#EF5350",
                width: 1,
                pane: PanePlacement::Separate(1),
            },
        ]
    }
}

/// Small ergonomic helper local to the volume-family indicators: chain multiple named values
/// onto one [`IndicatorResult`] without reaching for the builder on every call site.
trait ResultExt {
    fn with_value_pair(self, name: &'static str, value: rust_decimal::Decimal) -> Self;
}

impl ResultExt for IndicatorResult {
    fn with_value_pair(mut self, name: &'static str, value: rust_decimal::Decimal) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use market_instrument::Price;
    use rust_decimal_macros::dec;

    fn trade(quantity: rust_decimal::Decimal, buyer_is_maker: bool) -> Trade {
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
            market_instrument::Interval::OneMinute,
            open_time,
            open_time + chrono::Duration::minutes(1),
            Price::new(dec!(100)),
            Price::new(dec!(100)),
            Price::new(dec!(100)),
            Price::new(dec!(100)),
            Quantity::zero(),
            Quantity::zero(),
            2,
            true,
        )
        .unwrap()
    }

    #[test]
    fn accumulates_then_resets_on_candle_close() {
        let volume = Volume;
        let params = Params::default();
        let mut state = volume.init(&[], &params);

        volume.on_trade_update(&trade(dec!(2), false), &params, &mut state);
        volume.on_trade_update(&trade(dec!(3), true), &params, &mut state);

        let result = volume.on_new_candle(&candle(), &params, &mut state);
        assert_eq!(result.values.get("buyVolume").copied(), Some(dec!(3)));
        assert_eq!(result.values.get("sellVolume").copied(), Some(dec!(2)));

        let reset = volume.on_new_candle(&candle(), &params, &mut state);
        assert_eq!(reset.values.get("buyVolume").copied(), Some(dec!(0)));
    }
}
