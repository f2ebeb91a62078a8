//! Bookmap: a simplified order-flow heatmap. Accumulates traded volume per price bucket from
//! the trade stream and tracks the latest resting depth from the order-book stream; both are
//! reported as an auxiliary payload on candle close. Declares all three data types the spec
//! calls out for this family.

use crate::contract::{
    Category, DataType, Indicator, IndicatorResult, PanePlacement, RenderKind, SeriesVisual,
};
use crate::params::{ParamSpec, ParamValue, Params};
use market_data::{Candle, OrderBookSnapshot, Trade};
use market_instrument::Quantity;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::BTreeMap;

static PARAM_SCHEMA: Lazy<Vec<ParamSpec>> = Lazy::new(|| {
    vec![ParamSpec::new("depthLevels", "Depth Levels Tracked", ParamValue::Integer(10))
        .with_range(ParamValue::Integer(1), ParamValue::Integer(100))]
});

fn depth_levels(params: &Params) -> usize {
    params.get_integer("depthLevels").unwrap_or(10).max(1) as usize
}

#[derive(Debug, Default)]
pub struct BookmapState {
    traded_volume_by_price: BTreeMap<Decimal, Quantity>,
    last_bid_depth: Vec<(Decimal, Decimal)>,
    last_ask_depth: Vec<(Decimal, Decimal)>,
}

/// Bookmap. See module docs for the heatmap accumulation and emission rule.
#[derive(Debug, Clone, Copy)]
pub struct Bookmap;

impl Indicator for Bookmap {
    type State = BookmapState;

    fn id(&self) -> &'static str {
        "bookmap"
    }
    fn name(&self) -> &'static str {
        "Bookmap"
    }
    fn description(&self) -> &'static str {
        "Traded-volume-at-price heatmap with resting order-book depth overlay."
    }
    fn category(&self) -> Category {
        Category::OrderFlow
    }
    fn param_schema(&self) -> &'static [ParamSpec] {
        &PARAM_SCHEMA
    }
    fn required_data(&self) -> &'static [DataType] {
        &[DataType::Kline, DataType::Trade, DataType::OrderBook]
    }

    fn minimum_candles(&self, _params: &Params) -> usize {
        0
    }

    fn init(&self, _historical: &[Candle], _params: &Params) -> Self::State {
        BookmapState::default()
    }

    fn on_new_candle(&self, _candle: &Candle, _params: &Params, state: &mut Self::State) -> IndicatorResult {
        let traded: Vec<_> = state
            .traded_volume_by_price
            .iter()
            .map(|(price, qty)| json!({"price": price.to_string(), "volume": qty.inner().to_string()}))
            .collect();

        let auxiliary = json!({
            "tradedVolumeByPrice": traded,
            "bidDepth": state.last_bid_depth.iter().map(|(p, q)| json!({"price": p.to_string(), "quantity": q.to_string()})).collect::<Vec<_>>(),
            "askDepth": state.last_ask_depth.iter().map(|(p, q)| json!({"price": p.to_string(), "quantity": q.to_string()})).collect::<Vec<_>>(),
        });

        state.traded_volume_by_price.clear();

        let mut result = IndicatorResult::empty();
        result.auxiliary = Some(auxiliary);
        result
    }

    fn on_trade_update(&self, trade: &Trade, _params: &Params, state: &mut Self::State) -> IndicatorResult {
        let price = trade.price.inner();
        let entry = state.traded_volume_by_price.entry(price).or_insert_with(Quantity::zero);
        *entry = *entry + trade.quantity;
        IndicatorResult::empty()
    }

    fn on_order_book_update(&self, book: &OrderBookSnapshot, params: &Params, state: &mut Self::State) -> IndicatorResult {
        let levels = depth_levels(params);
        state.last_bid_depth = book.bids.iter().take(levels).map(|l| (l.price.inner(), l.quantity.inner())).collect();
        state.last_ask_depth = book.asks.iter().take(levels).map(|l| (l.price.inner(), l.quantity.inner())).collect();
        IndicatorResult::empty()
    }

    fn visualization(&self) -> &'static [SeriesVisual] {
        &[SeriesVisual {
            name: "heatmap",
            display_name: "Bookmap Heatmap",
            render_kind: RenderKind::Area,
            color: "#607D8B",
            width: 1,
            pane: PanePlacement::Price,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use market_data::Level;
    use market_instrument::{Interval, Price};
    use rust_decimal_macros::dec;

    fn trade(price: Decimal, quantity: Decimal) -> Trade {
        Trade {
            id: 1,
            price: Price::new(price),
            quantity: Quantity::new(quantity),
            quote_quantity: Quantity::zero(),
            time: Utc::now(),
            buyer_is_maker: false,
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
    fn accumulates_traded_volume_per_price_and_resets_on_close() {
        let bookmap = Bookmap;
        let params = Params::default();
        let mut state = bookmap.init(&[], &params);

        bookmap.on_trade_update(&trade(dec!(100), dec!(1)), &params, &mut state);
        bookmap.on_trade_update(&trade(dec!(100), dec!(2)), &params, &mut state);
        bookmap.on_trade_update(&trade(dec!(101), dec!(1)), &params, &mut state);

        assert_eq!(state.traded_volume_by_price.get(&dec!(100)).unwrap().inner(), dec!(3));

        let result = bookmap.on_new_candle(&candle(), &params, &mut state);
        assert!(result.auxiliary.is_some());
        assert!(state.traded_volume_by_price.is_empty());
    }

    #[test]
    fn tracks_latest_depth_snapshot() {
        let bookmap = Bookmap;
        let params = Params::validate(&PARAM_SCHEMA, &std::collections::HashMap::new()).unwrap();
        let mut state = bookmap.init(&[], &params);

        let book = OrderBookSnapshot {
            update_id: 1,
            time: Utc::now(),
            bids: vec![Level { price: Price::new(dec!(99)), quantity: Quantity::new(dec!(5)) }],
            asks: vec![Level { price: Price::new(dec!(101)), quantity: Quantity::new(dec!(4)) }],
        };
        bookmap.on_order_book_update(&book, &params, &mut state);
        assert_eq!(state.last_bid_depth, vec![(dec!(99), dec!(5))]);
    }
}
