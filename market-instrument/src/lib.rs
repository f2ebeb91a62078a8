#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]
//! Shared identity and numeric types used across the market-data engine:
//! exchange identifiers, symbols, kline intervals, order side and the
//! fixed-scale decimal newtypes used for every price/quantity field.

/// Exchange identifiers and classification helpers.
pub mod exchange;

/// Trading-pair symbol newtype.
pub mod symbol;

/// Kline interval enumeration.
pub mod interval;

/// Order/trade side.
pub mod side;

/// Fixed-scale decimal price/quantity newtypes.
pub mod decimal;

pub use decimal::{Price, Quantity};
pub use exchange::ExchangeId;
pub use interval::Interval;
pub use side::Side;
pub use symbol::Symbol;
