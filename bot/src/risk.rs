//! Risk review of candidate orders (spec §4.7): position-size, per-symbol exposure, total
//! exposure and daily-loss checks, grounded on the teacher's `RiskManager`/`RiskApproved`/
//! `RiskRefused` wrapper pattern (`risk/src/lib.rs`), generalised from the teacher's
//! cancel/open-order-request pair to this crate's single `OrderIntent`.

use crate::account::Position;
use crate::strategy::OrderIntent;
use market_instrument::{Price, Symbol};
use std::collections::HashMap;

/// An item that passed every configured risk check.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RiskApproved<T>(pub T);

impl<T> RiskApproved<T> {
    pub fn into_item(self) -> T {
        self.0
    }
}

/// An item a risk check rejected, carrying the reason.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RiskRefused<T> {
    pub item: T,
    pub reason: String,
}

impl<T> RiskRefused<T> {
    pub fn new(item: T, reason: impl Into<String>) -> Self {
        Self { item, reason: reason.into() }
    }

    pub fn into_item(self) -> T {
        self.item
    }
}

/// Read-only view of account state a risk check needs: open positions and today's realized PnL.
/// Built fresh from [`crate::account::AccountExecutor`] before every check — the risk manager
/// never holds its own copy of account state (spec §5 "indicator state is never shared",
/// applied here to risk state as the analogous discipline).
#[derive(Debug, Clone)]
pub struct AccountSnapshot<'a> {
    pub positions: &'a HashMap<Symbol, Position>,
    pub realized_pnl_today: Price,
}

/// Interface a pluggable risk module implements to approve or refuse candidate orders.
pub trait RiskManager: Send + Sync {
    fn check(&self, snapshot: &AccountSnapshot<'_>, intent: OrderIntent) -> Result<RiskApproved<OrderIntent>, RiskRefused<OrderIntent>>;
}

/// Position-size / per-symbol-exposure / total-exposure / daily-loss-limit risk manager (the
/// four checks spec §4.7 names explicitly).
#[derive(Debug, Clone)]
pub struct BasicRiskManager {
    pub max_position_size: rust_decimal::Decimal,
    pub max_symbol_exposure: rust_decimal::Decimal,
    pub max_total_exposure: rust_decimal::Decimal,
    pub max_daily_loss: rust_decimal::Decimal,
}

impl BasicRiskManager {
    pub fn new(
        max_position_size: rust_decimal::Decimal,
        max_symbol_exposure: rust_decimal::Decimal,
        max_total_exposure: rust_decimal::Decimal,
        max_daily_loss: rust_decimal::Decimal,
    ) -> Self {
        Self { max_position_size, max_symbol_exposure, max_total_exposure, max_daily_loss }
    }

    fn notional(intent: &OrderIntent) -> rust_decimal::Decimal {
        intent.quantity.inner() * intent.price.inner()
    }

    fn existing_symbol_notional(snapshot: &AccountSnapshot<'_>, symbol: &Symbol) -> rust_decimal::Decimal {
        snapshot
            .positions
            .get(symbol)
            .map(|position| position.quantity.inner().abs() * position.avg_price.inner())
            .unwrap_or_default()
    }

    fn total_notional(snapshot: &AccountSnapshot<'_>) -> rust_decimal::Decimal {
        snapshot
            .positions
            .values()
            .map(|position| position.quantity.inner().abs() * position.avg_price.inner())
            .sum()
    }
}

impl RiskManager for BasicRiskManager {
    fn check(&self, snapshot: &AccountSnapshot<'_>, intent: OrderIntent) -> Result<RiskApproved<OrderIntent>, RiskRefused<OrderIntent>> {
        if intent.quantity.inner() > self.max_position_size {
            return Err(RiskRefused::new(intent, "exceeds maximum position size"));
        }

        let notional = Self::notional(&intent);

        let symbol_exposure = Self::existing_symbol_notional(snapshot, &intent.symbol) + notional;
        if symbol_exposure > self.max_symbol_exposure {
            return Err(RiskRefused::new(intent, "exceeds maximum per-symbol exposure"));
        }

        let total_exposure = Self::total_notional(snapshot) + notional;
        if total_exposure > self.max_total_exposure {
            return Err(RiskRefused::new(intent, "exceeds maximum total exposure"));
        }

        if snapshot.realized_pnl_today.inner().is_sign_negative()
            && snapshot.realized_pnl_today.inner().abs() >= self.max_daily_loss
        {
            return Err(RiskRefused::new(intent, "daily loss limit reached"));
        }

        Ok(RiskApproved(intent))
    }
}

/// Pass-through risk manager approving every order, mirroring the teacher's `NoRiskManager`.
/// *FOR DEMONSTRATION/TESTING PURPOSES ONLY*.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRiskManager;

impl RiskManager for NoRiskManager {
    fn check(&self, _snapshot: &AccountSnapshot<'_>, intent: OrderIntent) -> Result<RiskApproved<OrderIntent>, RiskRefused<OrderIntent>> {
        Ok(RiskApproved(intent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::OrderKind;
    use chrono::Utc;
    use market_instrument::{ExchangeId, Quantity, Side};
    use rust_decimal_macros::dec;

    fn intent(quantity: rust_decimal::Decimal, price: rust_decimal::Decimal) -> OrderIntent {
        OrderIntent {
            strategy_id: "test",
            exchange: ExchangeId::Mock,
            symbol: Symbol::new("BTCUSDT"),
            side: Side::Buy,
            kind: OrderKind::Market,
            quantity: Quantity::new(quantity),
            price: Price::new(price),
            time: Utc::now(),
        }
    }

    #[test]
    fn refuses_oversized_position() {
        let risk = BasicRiskManager::new(dec!(1), dec!(1_000_000), dec!(1_000_000), dec!(1_000_000));
        let positions = HashMap::new();
        let snapshot = AccountSnapshot { positions: &positions, realized_pnl_today: Price::zero() };
        let result = risk.check(&snapshot, intent(dec!(5), dec!(100)));
        assert!(result.is_err());
    }

    #[test]
    fn refuses_when_daily_loss_limit_reached() {
        let risk = BasicRiskManager::new(dec!(100), dec!(1_000_000), dec!(1_000_000), dec!(500));
        let positions = HashMap::new();
        let snapshot = AccountSnapshot { positions: &positions, realized_pnl_today: Price::new(dec!(-600)) };
        let result = risk.check(&snapshot, intent(dec!(1), dec!(100)));
        assert!(result.is_err());
    }

    #[test]
    fn approves_order_within_limits() {
        let risk = BasicRiskManager::new(dec!(100), dec!(1_000_000), dec!(1_000_000), dec!(500));
        let positions = HashMap::new();
        let snapshot = AccountSnapshot { positions: &positions, realized_pnl_today: Price::zero() };
        let result = risk.check(&snapshot, intent(dec!(1), dec!(100)));
        assert!(result.is_ok());
    }
}
