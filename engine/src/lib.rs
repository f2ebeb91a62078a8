#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]
//! Process wiring for the market-data engine: reads an [`EngineConfig`], initializes logging,
//! assembles ingress, history, indicator and broadcast components through [`EngineBuilder`], and
//! exposes a [`shutdown::Shutdown`] signal every long-running task selects against.
//!
//! Every other crate in this workspace is a library with no opinion on how it is run; this one
//! has that opinion, and nothing else — nothing here is a dependency of any other crate.

/// Engine-wide configuration, loaded from TOML or built programmatically.
pub mod config;

/// `tracing`/`tracing-subscriber` initialization, human-readable or JSON.
pub mod logging;

/// The graceful-shutdown broadcast signal every long-running task selects against.
pub mod shutdown;

/// The builder that wires ingress, history, indicators, broadcast and the bot into one system.
pub mod system;

pub use config::{EngineConfig, ProviderConfig};
pub use shutdown::{Shutdown, ShutdownHandle};
pub use system::{EngineBuilder, System};
