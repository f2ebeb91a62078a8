//! Simulated account execution (spec §4.7): fills a risk-approved [`OrderIntent`] against the
//! latest known price, aggregates the resulting position, and tracks realized/unrealized PnL.
//! `AccountExecutor` is the pluggable seam — a real venue adapter would implement the same
//! trait and swap in for [`SimulatedAccount`] without the bot or risk layers changing.

use crate::risk::RiskApproved;
use crate::strategy::OrderIntent;
use chrono::{DateTime, Utc};
use market_instrument::{Price, Quantity, Side, Symbol};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// One simulated fill, recorded for audit/diagnostic purposes.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub strategy_id: &'static str,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Quantity,
    pub price: Price,
    pub time: DateTime<Utc>,
}

/// An aggregated position in one symbol. `quantity` is signed: positive is long, negative is
/// short, zero is flat. `avg_price` is the volume-weighted entry price of the current side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub quantity: Quantity,
    pub avg_price: Price,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Unrealized PnL against `last_price`: `quantity * (last_price - avg_price)`, positive for
    /// a long position whose mark is above entry, negative for a short whose mark is above
    /// entry.
    pub fn unrealized_pnl(&self, last_price: Price) -> Price {
        Price::new(self.quantity.inner() * (last_price.inner() - self.avg_price.inner()))
    }
}

/// Interface a pluggable account implementation exposes to the bot engine. A real venue
/// adapter implements this against actual fills instead of a simulated book.
pub trait AccountExecutor: Send + Sync {
    /// Executes a risk-approved order as an immediate simulated fill at `last_price`, updating
    /// the account's position and realized PnL, and returns the resulting [`Fill`].
    fn execute(&self, approved: RiskApproved<OrderIntent>, last_price: Price) -> Fill;

    fn position(&self, symbol: &Symbol) -> Option<Position>;

    fn positions(&self) -> HashMap<Symbol, Position>;

    /// Cumulative realized PnL across every fill so far.
    fn realized_pnl(&self) -> Price;

    /// Sum of unrealized PnL across all open positions, marked at `last_prices`. A symbol with
    /// no entry in `last_prices` contributes zero (treated as unknown mark, not stale).
    fn unrealized_pnl(&self, last_prices: &HashMap<Symbol, Price>) -> Price {
        self.positions()
            .iter()
            .filter_map(|(symbol, position)| {
                last_prices.get(symbol).map(|price| position.unrealized_pnl(*price))
            })
            .fold(Price::zero(), |acc, pnl| acc + pnl)
    }
}

/// Simulated account: fills every approved order immediately at the account's latest known
/// price for that symbol, aggregates positions with volume-weighted average cost, and realizes
/// PnL as positions are reduced, closed or flipped.
#[derive(Debug)]
pub struct SimulatedAccount {
    starting_balance: Decimal,
    positions: RwLock<HashMap<Symbol, Position>>,
    realized_pnl: RwLock<Decimal>,
    fills: RwLock<Vec<Fill>>,
}

impl SimulatedAccount {
    pub fn new(starting_balance: Decimal) -> Self {
        Self {
            starting_balance,
            positions: RwLock::new(HashMap::new()),
            realized_pnl: RwLock::new(Decimal::ZERO),
            fills: RwLock::new(Vec::new()),
        }
    }

    pub fn starting_balance(&self) -> Decimal {
        self.starting_balance
    }

    pub fn fills(&self) -> Vec<Fill> {
        self.fills.read().clone()
    }

    /// Current equity: starting balance plus realized PnL. Unrealized PnL is reported
    /// separately since it requires a mark price the caller supplies.
    pub fn equity(&self) -> Decimal {
        self.starting_balance + *self.realized_pnl.read()
    }

    fn apply_fill(position: &mut Position, side: Side, quantity: Decimal, price: Decimal) -> Decimal {
        let signed_qty = match side {
            Side::Buy => quantity,
            Side::Sell => -quantity,
        };

        let current = position.quantity.inner();
        let avg = position.avg_price.inner();

        if current == Decimal::ZERO || current.signum() == signed_qty.signum() {
            // Same direction (or opening from flat): extend the position with a
            // volume-weighted average entry price. No PnL realized yet.
            let new_quantity = current + signed_qty;
            let new_avg = if new_quantity.is_zero() {
                Decimal::ZERO
            } else {
                (avg * current.abs() + price * signed_qty.abs()) / new_quantity.abs()
            };
            position.quantity = Quantity::new(new_quantity);
            position.avg_price = Price::new(new_avg);
            Decimal::ZERO
        } else {
            // Opposite direction: reduces, closes, or flips the position.
            let closing = signed_qty.abs().min(current.abs());
            let realized = closing * (price - avg) * current.signum();
            let remaining_existing = current.abs() - closing;
            let remaining_new = signed_qty.abs() - closing;

            if remaining_new > Decimal::ZERO {
                // Fully closed the existing side and flipped into the new side at `price`.
                position.quantity = Quantity::new(remaining_new * signed_qty.signum());
                position.avg_price = Price::new(price);
            } else {
                position.quantity = Quantity::new(remaining_existing * current.signum());
                // avg_price of the remaining same-side position is unchanged.
            }
            realized
        }
    }
}

impl AccountExecutor for SimulatedAccount {
    fn execute(&self, approved: RiskApproved<OrderIntent>, last_price: Price) -> Fill {
        let intent = approved.into_item();
        let mut positions = self.positions.write();
        let position = positions.entry(intent.symbol.clone()).or_default();

        let realized = Self::apply_fill(position, intent.side, intent.quantity.inner(), last_price.inner());
        if !realized.is_zero() {
            *self.realized_pnl.write() += realized;
        }

        let fill = Fill {
            strategy_id: intent.strategy_id,
            symbol: intent.symbol,
            side: intent.side,
            quantity: intent.quantity,
            price: last_price,
            time: intent.time,
        };
        self.fills.write().push(fill.clone());
        fill
    }

    fn position(&self, symbol: &Symbol) -> Option<Position> {
        self.positions.read().get(symbol).copied().filter(|p| !p.is_flat())
    }

    fn positions(&self) -> HashMap<Symbol, Position> {
        self.positions.read().iter().filter(|(_, p)| !p.is_flat()).map(|(s, p)| (s.clone(), *p)).collect()
    }

    fn realized_pnl(&self) -> Price {
        Price::new(*self.realized_pnl.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::OrderKind;
    use market_instrument::ExchangeId;
    use rust_decimal_macros::dec;

    fn order(side: Side, quantity: Decimal, price: Decimal) -> OrderIntent {
        OrderIntent {
            strategy_id: "test",
            exchange: ExchangeId::Mock,
            symbol: Symbol::new("BTCUSDT"),
            side,
            kind: OrderKind::Market,
            quantity: Quantity::new(quantity),
            price: Price::new(price),
            time: Utc::now(),
        }
    }

    #[test]
    fn opening_a_long_sets_avg_price_and_no_realized_pnl() {
        let account = SimulatedAccount::new(dec!(10_000));
        account.execute(RiskApproved(order(Side::Buy, dec!(1), dec!(100))), Price::new(dec!(100)));

        let position = account.position(&Symbol::new("BTCUSDT")).unwrap();
        assert_eq!(position.quantity.inner(), dec!(1));
        assert_eq!(position.avg_price.inner(), dec!(100));
        assert_eq!(account.realized_pnl().inner(), dec!(0));
    }

    #[test]
    fn closing_a_long_realizes_pnl() {
        let account = SimulatedAccount::new(dec!(10_000));
        account.execute(RiskApproved(order(Side::Buy, dec!(1), dec!(100))), Price::new(dec!(100)));
        account.execute(RiskApproved(order(Side::Sell, dec!(1), dec!(150))), Price::new(dec!(150)));

        assert!(account.position(&Symbol::new("BTCUSDT")).is_none());
        assert_eq!(account.realized_pnl().inner(), dec!(50));
    }

    #[test]
    fn flipping_a_position_realizes_pnl_on_the_closed_portion() {
        let account = SimulatedAccount::new(dec!(10_000));
        account.execute(RiskApproved(order(Side::Buy, dec!(1), dec!(100))), Price::new(dec!(100)));
        account.execute(RiskApproved(order(Side::Sell, dec!(2), dec!(120))), Price::new(dec!(120)));

        let position = account.position(&Symbol::new("BTCUSDT")).unwrap();
        assert_eq!(position.quantity.inner(), dec!(-1));
        assert_eq!(position.avg_price.inner(), dec!(120));
        assert_eq!(account.realized_pnl().inner(), dec!(20));
    }

    #[test]
    fn unrealized_pnl_marks_open_position_at_supplied_price() {
        let account = SimulatedAccount::new(dec!(10_000));
        account.execute(RiskApproved(order(Side::Buy, dec!(2), dec!(100))), Price::new(dec!(100)));

        let mut marks = HashMap::new();
        marks.insert(Symbol::new("BTCUSDT"), Price::new(dec!(110)));
        assert_eq!(account.unrealized_pnl(&marks).inner(), dec!(20));
    }
}
