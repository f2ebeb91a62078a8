//! Transport-specific protocol wrappers: WebSocket streaming and HTTP REST.

/// `tokio-tungstenite` WebSocket wrapper with a connect deadline and a
/// `StreamParser` trait for turning raw frames into typed messages.
pub mod websocket;

/// `reqwest`-backed REST client with a per-request deadline and retry helper.
pub mod http;
