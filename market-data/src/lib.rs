#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]
//! Reconnecting market-data ingress: subscription multiplexing, exchange-specific wire-format
//! parsing, REST historical backfill, and a provider registry fanning normalized events out to
//! a single global handler.

/// Normalized event types every exchange connector converts its wire format into.
pub mod event;

/// Subscription kinds and the correlation bookkeeping needed to multiplex many of them.
pub mod subscription;

/// Exchange-specific connectors (request building, message parsing).
pub mod exchange;

/// Owns one streaming connection, the subscribe surface and the reconnect/replay loop.
pub mod provider;

/// Provider registry fanning normalized events out to a single global handler.
pub mod service;

pub use event::{BookTicker, Candle, Level, MarketEvent, MarketEventKind, OrderBookSnapshot, Trade};
pub use provider::MarketDataProvider;
pub use service::UniversalDataService;
pub use subscription::{SubKind, Subscription};
