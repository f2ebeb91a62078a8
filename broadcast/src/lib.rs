#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]
//! The client-facing broadcast layer (C7): three logical endpoints (order-flow, trading,
//! indicator) served by one [`session::SessionRegistry`], the JSON push envelopes each event is
//! rendered to, the per-symbol statistics table fed by the order-flow stream, and the
//! historical-query response shapes.

/// The JSON push envelopes exchanged with clients.
pub mod envelope;

/// Per-symbol running statistics (trade count, aggressive volume, last price/spread).
pub mod stats;

/// Session identity, filter state, control-message handling and fan-out.
pub mod session;

/// Historical-query request/response shapes.
pub mod historical;

pub use envelope::{Envelope, FeedKind};
pub use session::{ControlError, Endpoint, SessionId, SessionRegistry};
pub use stats::{SymbolStats, SymbolStatsTable};
