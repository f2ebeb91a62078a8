#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]
//! The canonical candlestick history every downstream component reads from, plus the
//! trade-flow footprint aggregator that rides on the same (symbol, interval) keying scheme.

/// Centralized, bounded, gap-detecting candlestick store (C3).
pub mod store;

/// Per-bar buy/sell volume-at-price aggregation from the trade stream (C4).
pub mod footprint;

pub use footprint::{FootprintAggregator, FootprintBucket, FootprintKey};
pub use store::{AddOutcome, CandleHistoryStore, GapReport, HistoryKey, DEFAULT_BOUND};
