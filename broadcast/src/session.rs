//! Client-facing sessions: connect/assign-id/welcome, filter sets, control-message handling,
//! and the fan-out that delivers one serialized frame to every accepting session.
//!
//! A session owns only the sending half of an unbounded channel (mirroring
//! `market_integration::channel`'s `Tx`/`UnboundedTx` split); the receiving half is handed back
//! to whatever owns the real transport (a WebSocket write loop, typically), which is the
//! "per-session writer task" the concurrency model calls for. This crate never touches a
//! socket directly.

use crate::envelope::{Envelope, FeedKind};
use chrono::{DateTime, Utc};
use indicators::InstanceKey;
use market_instrument::Symbol;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Opaque per-connection identifier, assigned at `connect` time.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// The endpoint family a session connected to. Trading sessions are always unfiltered;
/// order-flow and indicator sessions carry their own subscription state.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Endpoint {
    OrderFlow,
    Trading,
    Indicator,
}

#[derive(Debug, Clone, Default)]
struct Filter {
    symbols: Option<HashSet<Symbol>>,
    feed_kinds: Option<HashSet<FeedKind>>,
    instance_keys: Option<HashSet<String>>,
}

impl Filter {
    fn accepts_order_flow(&self, symbol: &Symbol, feed_kind: FeedKind) -> bool {
        self.symbols.as_ref().map_or(true, |set| set.contains(symbol))
            && self.feed_kinds.as_ref().map_or(true, |set| set.contains(&feed_kind))
    }

    fn accepts_instance(&self, instance_key: &str) -> bool {
        self.instance_keys.as_ref().map_or(true, |set| set.contains(instance_key))
    }
}

/// A single client connection. The frame payload type is `Arc<str>` so fan-out to many
/// sessions shares one allocation per event instead of cloning the JSON text per recipient.
pub struct Session {
    id: SessionId,
    endpoint: Endpoint,
    tx: mpsc::UnboundedSender<Arc<str>>,
    filter: RwLock<Filter>,
    last_send: RwLock<Option<DateTime<Utc>>>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Timestamp of this session's most recent successful send, `None` if it has never
    /// received a frame (spec's session data model: id, open/closed state, filters, last-send
    /// timestamp).
    pub fn last_send(&self) -> Option<DateTime<Utc>> {
        *self.last_send.read()
    }

    fn send(&self, payload: Arc<str>) -> Result<(), ()> {
        self.tx.send(payload).map_err(|_| ())?;
        *self.last_send.write() = Some(Utc::now());
        Ok(())
    }
}

/// Errors surfaced to the issuing session as an `{"type":"error",...}` envelope rather than a
/// closed connection (spec §7: validation errors never terminate the session).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ControlError {
    #[error("malformed control message: {0}")]
    Malformed(String),
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),
    #[error("unknown session")]
    UnknownSession,
}

#[derive(Debug, serde::Deserialize)]
struct ControlMessage {
    action: String,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    types: Vec<String>,
}

fn parse_feed_kind(raw: &str) -> Option<FeedKind> {
    match raw {
        "TRADE" => Some(FeedKind::Trade),
        "AGGREGATE_TRADE" => Some(FeedKind::AggregateTrade),
        "ORDER_BOOK" => Some(FeedKind::OrderBook),
        "BOOK_TICKER" => Some(FeedKind::BookTicker),
        _ => None,
    }
}

/// The registry of live sessions for one broadcast endpoint family. Owns no transport; it owns
/// filter state and the sending half of each session's channel.
pub struct SessionRegistry {
    providers: Vec<&'static str>,
    intervals: Vec<&'static str>,
    next_id: AtomicU64,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(providers: Vec<&'static str>, intervals: Vec<&'static str>) -> Self {
        Self { providers, intervals, next_id: AtomicU64::new(1), sessions: RwLock::new(HashMap::new()) }
    }

    /// Registers a new session and sends its welcome envelope. Returns the id (for routing
    /// control messages back to it) and the receiving half of its writer channel, which the
    /// caller's transport loop drains and writes out.
    pub fn connect(&self, endpoint: Endpoint) -> (SessionId, mpsc::UnboundedReceiver<Arc<str>>) {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Session {
            id,
            endpoint,
            tx,
            filter: RwLock::new(Filter::default()),
            last_send: RwLock::new(None),
        });
        self.sessions.write().insert(id, session.clone());

        let supported = match endpoint {
            Endpoint::OrderFlow => vec!["TRADE", "AGGREGATE_TRADE", "ORDER_BOOK", "BOOK_TICKER"],
            Endpoint::Trading => vec!["CANDLESTICK", "TRADE", "ORDER_BOOK"],
            Endpoint::Indicator => vec!["INDICATOR_UPDATE", "INDICATOR_TRADE", "INDICATOR_ORDER_BOOK"],
        };
        let _ = session.send(Arc::from(Envelope::welcome(supported).to_json()));
        (id, rx)
    }

    /// Removes a broken or disconnected session. Called by the owning transport on send
    /// failure/timeout, and internally on a failed fan-out send.
    pub fn remove(&self, id: SessionId) {
        self.sessions.write().remove(&id);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(&id).cloned()
    }

    /// Applies one client control message, mutating `id`'s filter state or answering a
    /// `getStats`/`getProviders`/`getIntervals` query directly. Unknown actions or data-type
    /// strings fail the message with an error envelope; the session stays open either way.
    pub fn handle_control(
        &self,
        id: SessionId,
        raw: &str,
        stats: impl FnOnce() -> serde_json::Value,
    ) -> Result<(), ControlError> {
        let session = self.get(id).ok_or(ControlError::UnknownSession)?;

        let message: ControlMessage = serde_json::from_str(raw).map_err(|error| {
            let error = ControlError::Malformed(error.to_string());
            let _ = session.send(Arc::from(Envelope::error(error.to_string()).to_json()));
            error
        })?;

        match message.action.as_str() {
            "subscribe" => {
                let mut feed_kinds = HashSet::new();
                for raw_type in &message.types {
                    match parse_feed_kind(raw_type) {
                        Some(kind) => {
                            feed_kinds.insert(kind);
                        }
                        None => {
                            let error = ControlError::UnknownDataType(raw_type.clone());
                            let _ = session.send(Arc::from(Envelope::error(error.to_string()).to_json()));
                            return Err(error);
                        }
                    }
                }
                let mut filter = session.filter.write();
                filter.symbols = message.symbol.map(|s| {
                    let mut set = HashSet::new();
                    set.insert(Symbol::new(s));
                    set
                });
                if !feed_kinds.is_empty() {
                    filter.feed_kinds = Some(feed_kinds);
                }
                Ok(())
            }
            "unsubscribe" => {
                let mut filter = session.filter.write();
                match message.symbol {
                    Some(symbol) => {
                        if let Some(set) = filter.symbols.as_mut() {
                            set.remove(&Symbol::new(symbol));
                        }
                    }
                    None => {
                        filter.symbols = None;
                        filter.feed_kinds = None;
                    }
                }
                Ok(())
            }
            "getStats" => {
                let payload = serde_json::json!({"type": "stats", "stats": stats()});
                let _ = session.send(Arc::from(payload.to_string()));
                Ok(())
            }
            "getProviders" => {
                let payload = serde_json::json!({"type": "providers", "providers": self.providers});
                let _ = session.send(Arc::from(payload.to_string()));
                Ok(())
            }
            "getIntervals" => {
                let payload = serde_json::json!({"type": "intervals", "intervals": self.intervals});
                let _ = session.send(Arc::from(payload.to_string()));
                Ok(())
            }
            other => {
                let error = ControlError::UnknownAction(other.to_string());
                let _ = session.send(Arc::from(Envelope::error(error.to_string()).to_json()));
                Err(error)
            }
        }
    }

    /// Subscribes an indicator-endpoint session to a subset of instance keys; `None` (the
    /// default on connect) means every instance.
    pub fn subscribe_instances(&self, id: SessionId, instance_keys: HashSet<String>) {
        if let Some(session) = self.get(id) {
            session.filter.write().instance_keys = Some(instance_keys);
        }
    }

    /// Serializes `envelope` once and delivers it to every order-flow session whose filter
    /// accepts `(symbol, feed_kind)`. Sessions whose send fails are dropped immediately —
    /// a slow or gone session never blocks delivery to the rest (spec §5/§8 property 10).
    pub fn broadcast_order_flow(&self, feed_kind: FeedKind, symbol: &Symbol, envelope: &Envelope) -> usize {
        self.fan_out(Endpoint::OrderFlow, envelope, |session| {
            session.filter.read().accepts_order_flow(symbol, feed_kind)
        })
    }

    /// Delivers `envelope` unfiltered to every trading-endpoint session (spec §4.6: the
    /// general trading endpoint is unfiltered).
    pub fn broadcast_trading(&self, envelope: &Envelope) -> usize {
        self.fan_out(Endpoint::Trading, envelope, |_| true)
    }

    /// Delivers a per-instance update to every indicator-endpoint session interested in
    /// `instance_key`.
    pub fn broadcast_indicator(
        &self,
        instance_key: &InstanceKey,
        values: HashMap<String, Decimal>,
        shapes: Option<serde_json::Value>,
    ) -> usize {
        let envelope = Envelope::indicator_update(instance_key, values, shapes);
        let key_text = instance_key.to_string();
        self.fan_out(Endpoint::Indicator, &envelope, |session| session.filter.read().accepts_instance(&key_text))
    }

    fn fan_out(&self, endpoint: Endpoint, envelope: &Envelope, accepts: impl Fn(&Session) -> bool) -> usize {
        let payload: Arc<str> = Arc::from(envelope.to_json());
        let candidates: Vec<Arc<Session>> = {
            let sessions = self.sessions.read();
            sessions.values().filter(|s| s.endpoint == endpoint).cloned().collect()
        };

        let mut delivered = 0;
        let mut broken = Vec::new();
        for session in candidates {
            if !accepts(&session) {
                continue;
            }
            match session.send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(()) => broken.push(session.id()),
            }
        }
        for id in broken {
            self.remove(id);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(vec!["binance"], vec!["1m", "5m"])
    }

    #[test]
    fn connect_sends_welcome_envelope() {
        let registry = registry();
        let (_, mut rx) = registry.connect(Endpoint::OrderFlow);
        let welcome = rx.try_recv().unwrap();
        assert!(welcome.contains(r#""type":"connected""#));
    }

    #[test]
    fn subscribe_with_no_symbol_means_all_symbols() {
        let registry = registry();
        let (id, mut rx) = registry.connect(Endpoint::OrderFlow);
        rx.try_recv().unwrap(); // welcome

        let _ = registry.handle_control(id, r#"{"action":"subscribe","types":["TRADE"]}"#, || serde_json::json!({}));
        let symbol = Symbol::new("BTCUSDT");
        let envelope = Envelope::Error { message: "probe".into() };
        registry.broadcast_order_flow(FeedKind::Trade, &symbol, &envelope);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn unknown_action_yields_error_envelope_not_session_close() {
        let registry = registry();
        let (id, mut rx) = registry.connect(Endpoint::OrderFlow);
        rx.try_recv().unwrap(); // welcome

        let result = registry.handle_control(id, r#"{"action":"frobnicate"}"#, || serde_json::json!({}));
        assert!(matches!(result, Err(ControlError::UnknownAction(_))));
        let response = rx.try_recv().unwrap();
        assert!(response.contains("Unknown action: frobnicate"));
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn filter_honoring_session_subscribed_to_one_symbol_never_sees_another() {
        let registry = registry();
        let (a, mut rx_a) = registry.connect(Endpoint::OrderFlow);
        let (_b, mut rx_b) = registry.connect(Endpoint::OrderFlow);
        rx_a.try_recv().unwrap();
        rx_b.try_recv().unwrap();

        let _ = registry.handle_control(a, r#"{"action":"subscribe","symbol":"BTCUSDT"}"#, || serde_json::json!({}));

        let eth = Symbol::new("ETHUSDT");
        let envelope = Envelope::Error { message: "agg-trade-eth".into() };
        registry.broadcast_order_flow(FeedKind::AggregateTrade, &eth, &envelope);

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());

        let btc = Symbol::new("BTCUSDT");
        let envelope = Envelope::Error { message: "ticker-btc".into() };
        registry.broadcast_order_flow(FeedKind::BookTicker, &btc, &envelope);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn broken_session_is_removed_without_blocking_others() {
        let registry = registry();
        let (_a, rx_a) = registry.connect(Endpoint::OrderFlow);
        let (_b, mut rx_b) = registry.connect(Endpoint::OrderFlow);
        drop(rx_a); // simulate a stalled/gone transport

        let symbol = Symbol::new("BTCUSDT");
        let envelope = Envelope::Error { message: "probe".into() };
        let delivered = registry.broadcast_order_flow(FeedKind::Trade, &symbol, &envelope);

        assert_eq!(delivered, 1);
        assert_eq!(registry.session_count(), 1);
        rx_b.try_recv().unwrap(); // welcome
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn last_send_is_set_after_connect_and_advances_on_broadcast() {
        let registry = registry();
        let (id, mut rx) = registry.connect(Endpoint::OrderFlow);
        rx.try_recv().unwrap(); // welcome

        let session = registry.get(id).unwrap();
        let after_welcome = session.last_send().expect("welcome send sets last_send");

        let symbol = Symbol::new("BTCUSDT");
        let envelope = Envelope::Error { message: "probe".into() };
        registry.broadcast_order_flow(FeedKind::Trade, &symbol, &envelope);
        rx.try_recv().unwrap();

        let after_broadcast = session.last_send().expect("broadcast send sets last_send");
        assert!(after_broadcast >= after_welcome);
    }

    #[test]
    fn last_send_is_none_before_any_send() {
        // A session with a filter that rejects every event never advances `last_send` beyond
        // the welcome send it received at connect.
        let registry = registry();
        let (id, mut rx) = registry.connect(Endpoint::OrderFlow);
        rx.try_recv().unwrap();
        let session = registry.get(id).unwrap();
        let welcome_send = session.last_send();
        assert!(welcome_send.is_some());
    }
}
