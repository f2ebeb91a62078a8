#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity)]
//! The bot/account/risk consumer (C8): a pluggable strategy trait that turns normalized market
//! events into candidate orders, a risk filter, and a simulated account executor. Per spec §1
//! and §4.7 this crate treats strategy arithmetic as out of scope — it ships one illustrative
//! no-op/threshold strategy and focuses on the directed event flow the design notes call for
//! (bot → risk → account → portfolio, replacing the cyclic reference pattern a GC'd framework
//! would use).

/// Candidate orders, the `Strategy` trait, and the no-op/threshold demonstration strategies.
pub mod strategy;

/// `OnDisconnect`/`OnTradingDisabled` lifecycle hooks (spec §9 directed event flow).
pub mod hooks;

/// `RiskManager` trait, `RiskApproved`/`RiskRefused` wrappers, and a position/exposure/daily-loss
/// checking implementation.
pub mod risk;

/// `AccountExecutor` trait and the simulated fill/position/PnL bookkeeping implementation.
pub mod account;

/// Wires strategies, risk manager and account executor into one event consumer.
pub mod engine;

pub use account::{AccountExecutor, Fill, Position, SimulatedAccount};
pub use engine::{BotEngine, TradingMode};
pub use risk::{BasicRiskManager, RiskApproved, RiskManager, RiskRefused};
pub use strategy::{NoOpStrategy, OrderIntent, OrderKind, Strategy, ThresholdStrategy};
