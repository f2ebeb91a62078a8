//! Per-symbol running statistics, maintained in-memory off the order-flow stream (spec §4.6):
//! trade count, cumulative aggressive buy/sell volume, last traded price, last spread.

use market_instrument::Symbol;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolStats {
    pub trade_count: u64,
    pub aggressive_buy_volume: Decimal,
    pub aggressive_sell_volume: Decimal,
    pub last_price: Option<Decimal>,
    pub last_spread: Option<Decimal>,
}

/// Concurrent per-symbol stats table. One [`parking_lot::RwLock`] guards the whole map rather
/// than one per symbol: updates are cheap arithmetic, so a single short critical section per
/// event beats the bookkeeping of a sharded map at this scale.
#[derive(Debug, Default)]
pub struct SymbolStatsTable {
    inner: RwLock<HashMap<Symbol, SymbolStats>>,
}

impl SymbolStatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one trade. `buyer_is_maker = true` means the taker sold (aggressive sell);
    /// `false` means the taker bought (aggressive buy).
    pub fn record_trade(&self, symbol: &Symbol, price: Decimal, quantity: Decimal, buyer_is_maker: bool) {
        let mut table = self.inner.write();
        let entry = table.entry(symbol.clone()).or_default();
        entry.trade_count += 1;
        entry.last_price = Some(price);
        if buyer_is_maker {
            entry.aggressive_sell_volume += quantity;
        } else {
            entry.aggressive_buy_volume += quantity;
        }
    }

    pub fn record_spread(&self, symbol: &Symbol, best_bid: Decimal, best_ask: Decimal) {
        let mut table = self.inner.write();
        let entry = table.entry(symbol.clone()).or_default();
        entry.last_spread = Some(best_ask - best_bid);
    }

    pub fn get(&self, symbol: &Symbol) -> Option<SymbolStats> {
        self.inner.read().get(symbol).cloned()
    }

    pub fn snapshot(&self) -> HashMap<Symbol, SymbolStats> {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn separates_aggressive_buy_and_sell_volume() {
        let table = SymbolStatsTable::new();
        let symbol = Symbol::new("BTCUSDT");
        table.record_trade(&symbol, dec!(100), dec!(1), false);
        table.record_trade(&symbol, dec!(101), dec!(2), true);

        let stats = table.get(&symbol).unwrap();
        assert_eq!(stats.trade_count, 2);
        assert_eq!(stats.aggressive_buy_volume, dec!(1));
        assert_eq!(stats.aggressive_sell_volume, dec!(2));
        assert_eq!(stats.last_price, Some(dec!(101)));
    }

    #[test]
    fn tracks_last_spread_per_symbol() {
        let table = SymbolStatsTable::new();
        let symbol = Symbol::new("ETHUSDT");
        table.record_spread(&symbol, dec!(99), dec!(101));
        assert_eq!(table.get(&symbol).unwrap().last_spread, Some(dec!(2)));
    }
}
