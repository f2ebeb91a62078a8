//! Owns one long-lived streaming connection to an exchange and exposes the symbol/interval
//! subscription surface: connect/disconnect, subscribe/unsubscribe per stream kind, REST
//! historical backfill, and a reconnect task that replays subscriptions with exponential
//! backoff (grounded on the teacher's `ConnectionHandler`/subscription-channel split).

use crate::event::{MarketEvent, MarketEventKind};
use crate::exchange::{Connector, ExchangeMessage};
use crate::subscription::{SubKind, Subscription};
use market_instrument::{ExchangeId, Interval, Symbol};
use market_integration::backoff::ReconnectPolicy;
use market_integration::error::SocketError;
use market_integration::protocol::http::{retry_twice_with_delay, RestClient};
use market_integration::protocol::websocket::{self, WsMessage};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Number of closed candles refetched via REST for each previously-subscribed kline stream
/// after a successful reconnect.
const REPLAY_BACKFILL_LIMIT: u32 = 500;

/// Hard deadline for the initial WebSocket handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Callback invoked for every normalized event the provider emits.
pub type Handler = Arc<dyn Fn(MarketEvent<MarketEventKind>) + Send + Sync>;

enum Command {
    Subscribe(Subscription),
    Unsubscribe(Subscription),
    Disconnect,
}

/// A single streaming connection to one exchange, multiplexing any number of subscriptions.
pub struct MarketDataProvider<C> {
    connector: Arc<C>,
    cmd_tx: RwLock<Option<mpsc::UnboundedSender<Command>>>,
    handler: Arc<RwLock<Option<Handler>>>,
    active: Arc<RwLock<HashSet<Subscription>>>,
    connected: Arc<AtomicBool>,
    manual_disconnect: Arc<AtomicBool>,
    next_request_id: Arc<AtomicU64>,
    reconnect_policy: ReconnectPolicy,
    rest: RestClient,
}

impl<C: Connector + Send + Sync + 'static> MarketDataProvider<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            cmd_tx: RwLock::new(None),
            handler: Arc::new(RwLock::new(None)),
            active: Arc::new(RwLock::new(HashSet::new())),
            connected: Arc::new(AtomicBool::new(false)),
            manual_disconnect: Arc::new(AtomicBool::new(false)),
            next_request_id: Arc::new(AtomicU64::new(0)),
            reconnect_policy: ReconnectPolicy::default(),
            rest: RestClient::new(),
        }
    }

    pub fn exchange(&self) -> ExchangeId {
        self.connector.id()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Registers the single normalized-event sink. Replaces any previous handler.
    pub fn set_handler(&self, handler: Handler) {
        *self.handler.write() = Some(handler);
    }

    /// Invokes the registered handler directly with a synthetic event, bypassing the
    /// connection task entirely. Exists so tests of the registry/service layer don't need a
    /// live socket to exercise the forwarding path.
    #[doc(hidden)]
    pub fn emit_for_test(&self, symbol: Symbol, kind: MarketEventKind) {
        if let Some(handler) = self.handler.read().clone() {
            handler(MarketEvent::new(self.connector.id(), symbol, chrono::Utc::now(), kind));
        }
    }

    /// Establishes the connection with a 10-second deadline. Idempotent if already connected.
    pub async fn connect(&self) -> Result<(), SocketError> {
        if self.is_connected() {
            return Ok(());
        }

        self.manual_disconnect.store(false, Ordering::SeqCst);
        let socket = websocket::connect(self.connector.ws_url(), CONNECT_TIMEOUT).await?;
        self.connected.store(true, Ordering::SeqCst);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        *self.cmd_tx.write() = Some(cmd_tx);

        let task = ConnectionTask {
            connector: Arc::clone(&self.connector),
            active: Arc::clone(&self.active),
            connected: Arc::clone(&self.connected),
            manual_disconnect: Arc::clone(&self.manual_disconnect),
            next_request_id: Arc::clone(&self.next_request_id),
            reconnect_policy: self.reconnect_policy,
            rest: self.rest.clone(),
            handler: Arc::clone(&self.handler),
        };
        tokio::spawn(task.run(socket, cmd_rx));

        Ok(())
    }

    /// Flags manual close, terminates the connection and clears all subscription tracking.
    pub fn disconnect(&self) {
        self.manual_disconnect.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        if let Some(tx) = self.cmd_tx.read().as_ref() {
            let _ = tx.send(Command::Disconnect);
        }
        self.active.write().clear();
    }

    fn send_command(&self, command: Command) {
        match self.cmd_tx.read().as_ref() {
            Some(tx) => {
                if tx.send(command).is_err() {
                    warn!("provider command dropped: connection task has stopped");
                }
            }
            None => warn!("provider command dropped: not connected"),
        }
    }

    pub fn subscribe_ticker(&self, symbol: impl Into<Symbol>) {
        self.subscribe(symbol, SubKind::Ticker);
    }

    pub fn subscribe_kline(&self, symbol: impl Into<Symbol>, interval: Interval) {
        self.subscribe(symbol, SubKind::Kline(interval));
    }

    pub fn subscribe_trade(&self, symbol: impl Into<Symbol>) {
        self.subscribe(symbol, SubKind::Trade);
    }

    pub fn subscribe_agg_trade(&self, symbol: impl Into<Symbol>) {
        self.subscribe(symbol, SubKind::AggTrade);
    }

    pub fn subscribe_depth(&self, symbol: impl Into<Symbol>) {
        self.subscribe(symbol, SubKind::Depth);
    }

    pub fn subscribe_book_ticker(&self, symbol: impl Into<Symbol>) {
        self.subscribe(symbol, SubKind::BookTicker);
    }

    fn subscribe(&self, symbol: impl Into<Symbol>, kind: SubKind) {
        let sub = Subscription::new(self.connector.id(), symbol, kind);
        self.send_command(Command::Subscribe(sub));
    }

    pub fn unsubscribe(&self, symbol: impl Into<Symbol>, kind: SubKind) {
        let sub = Subscription::new(self.connector.id(), symbol, kind);
        self.send_command(Command::Unsubscribe(sub));
    }

    /// REST historical klines, most-recent `limit` rows (exchange-capped at 1000).
    pub async fn historical_klines(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: u32,
    ) -> Result<Vec<crate::event::Candle>, SocketError> {
        let url = self.connector.historical_klines_url(symbol, interval, limit);
        self.fetch_klines(&url, interval).await
    }

    /// REST historical klines within `[start, end]` (epoch milliseconds).
    pub async fn historical_klines_range(
        &self,
        symbol: &Symbol,
        interval: Interval,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<crate::event::Candle>, SocketError> {
        let url = self
            .connector
            .historical_klines_range_url(symbol, interval, start_ms, end_ms);
        self.fetch_klines(&url, interval).await
    }

    async fn fetch_klines(
        &self,
        url: &str,
        interval: Interval,
    ) -> Result<Vec<crate::event::Candle>, SocketError> {
        let connector = Arc::clone(&self.connector);
        let rest = self.rest.clone();
        retry_twice_with_delay(|| {
            let connector = Arc::clone(&connector);
            let rest = rest.clone();
            let url = url.to_string();
            async move {
                let body = rest.get_text(&url).await?;
                connector.parse_historical_klines(&body, interval)
            }
        })
        .await
    }
}

/// Background task driving one connection: reads frames, dispatches normalized events to the
/// handler, and owns the reconnect-with-backoff loop.
struct ConnectionTask<C> {
    connector: Arc<C>,
    active: Arc<RwLock<HashSet<Subscription>>>,
    connected: Arc<AtomicBool>,
    manual_disconnect: Arc<AtomicBool>,
    next_request_id: Arc<AtomicU64>,
    reconnect_policy: ReconnectPolicy,
    rest: RestClient,
    handler: Arc<RwLock<Option<Handler>>>,
}

impl<C: Connector + Send + Sync + 'static> ConnectionTask<C> {
    async fn run(self, mut socket: websocket::WebSocket, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = cmd_rx.recv() => match command {
                    Some(Command::Subscribe(sub)) => self.handle_subscribe(&mut socket, sub).await,
                    Some(Command::Unsubscribe(sub)) => self.handle_unsubscribe(&mut socket, sub).await,
                    Some(Command::Disconnect) | None => {
                        let _ = websocket::send(&mut socket, WsMessage::Close).await;
                        return;
                    }
                },
                frame = websocket::next(&mut socket) => match frame {
                    Some(Ok(WsMessage::Text(text))) => self.handle_payload(&text),
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        if let Ok(text) = String::from_utf8(bytes) {
                            self.handle_payload(&text);
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => warn!(%error, "market data frame error"),
                    None => {
                        self.connected.store(false, Ordering::SeqCst);
                        if self.manual_disconnect.load(Ordering::SeqCst) {
                            return;
                        }
                        match self.reconnect(&mut cmd_rx).await {
                            Some(new_socket) => socket = new_socket,
                            None => return,
                        }
                    }
                },
            }
        }
    }

    async fn handle_subscribe(&self, socket: &mut websocket::WebSocket, sub: Subscription) {
        self.active.write().insert(sub.clone());
        let mut next_id = self.next_request_id.load(Ordering::SeqCst);
        let meta = self.connector.subscribe_frames(std::slice::from_ref(&sub), &mut next_id);
        self.next_request_id.store(next_id, Ordering::SeqCst);
        for frame in meta.frames {
            if let Err(error) = websocket::send(socket, frame).await {
                warn!(%error, "failed to send subscribe frame");
            }
        }
    }

    async fn handle_unsubscribe(&self, socket: &mut websocket::WebSocket, sub: Subscription) {
        self.active.write().remove(&sub);
        let mut next_id = self.next_request_id.load(Ordering::SeqCst);
        let mut meta = self.connector.subscribe_frames(std::slice::from_ref(&sub), &mut next_id);
        self.next_request_id.store(next_id, Ordering::SeqCst);
        for frame in meta.frames.drain(..) {
            if let WsMessage::Text(text) = &frame {
                let unsub_text = text.replacen("SUBSCRIBE", "UNSUBSCRIBE", 1);
                if let Err(error) = websocket::send(socket, WsMessage::Text(unsub_text)).await {
                    warn!(%error, "failed to send unsubscribe frame");
                }
            }
        }
    }

    fn handle_payload(&self, payload: &str) {
        let messages = match self.connector.parse(payload) {
            Ok(messages) => messages,
            Err(SocketError::Unidentifiable) => return,
            Err(error) => {
                warn!(%error, "dropping unparseable market data payload");
                return;
            }
        };

        let Some(handler) = self.handler.read().clone() else {
            return;
        };

        for message in messages {
            let exchange = self.connector.id();
            let (symbol, kind) = match message {
                ExchangeMessage::Candle { symbol, candle } => (symbol, MarketEventKind::Candle(candle)),
                ExchangeMessage::Trade { symbol, trade } => (symbol, MarketEventKind::Trade(trade)),
                ExchangeMessage::OrderBook { symbol, book } => (symbol, MarketEventKind::OrderBook(book)),
                ExchangeMessage::BookTicker { symbol, ticker } => {
                    (symbol, MarketEventKind::BookTicker(ticker))
                }
                ExchangeMessage::SubscriptionAck => continue,
            };
            handler(MarketEvent::new(exchange, symbol, chrono::Utc::now(), kind));
        }
    }

    /// Reconnects with exponential backoff, then replays every previously active subscription
    /// and refetches the last [`REPLAY_BACKFILL_LIMIT`] closed candles for each kline stream.
    ///
    /// Both the backoff sleep and each connect attempt are raced against `cmd_rx`: a
    /// `Command::Disconnect` arriving mid-backoff aborts immediately instead of waiting out the
    /// rest of a (potentially 60-second) delay or a dead endpoint's connect attempt (spec.md:
    /// "A disconnect requested by the owner must prevent any further reconnect and cancel any
    /// scheduled one"). Subscribe/unsubscribe commands received while disconnected still update
    /// `active` so they're picked up by `replay_subscriptions` once a socket is re-established.
    async fn reconnect(&self, cmd_rx: &mut mpsc::UnboundedReceiver<Command>) -> Option<websocket::WebSocket> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let delay = self.reconnect_policy.delay_for(attempt);
            info!(attempt, ?delay, "scheduling market data reconnect");

            self.race_with_disconnect(tokio::time::sleep(delay), cmd_rx).await?;

            let connect = websocket::connect(self.connector.ws_url(), CONNECT_TIMEOUT);
            match self.race_with_disconnect(connect, cmd_rx).await? {
                Ok(mut socket) => {
                    self.connected.store(true, Ordering::SeqCst);
                    self.replay_subscriptions(&mut socket).await;
                    return Some(socket);
                }
                Err(error) => warn!(%error, attempt, "reconnect attempt failed"),
            }
        }
    }

    /// Races `future` to completion against `cmd_rx`. Returns `None` as soon as a
    /// `Command::Disconnect` (or a closed channel) is observed, discarding `future`'s outcome;
    /// this is what lets a disconnect requested mid-backoff or mid-connect-attempt take effect
    /// immediately instead of only after `reconnect` eventually returns a socket. A
    /// `Subscribe`/`Unsubscribe` command observed instead is applied to `active` (so it is
    /// picked up by the next `replay_subscriptions`) and the wait continues.
    async fn race_with_disconnect<T>(
        &self,
        future: impl std::future::Future<Output = T>,
        cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Option<T> {
        tokio::pin!(future);
        loop {
            tokio::select! {
                output = &mut future => return Some(output),
                command = cmd_rx.recv() => match command {
                    Some(Command::Disconnect) | None => return None,
                    Some(Command::Subscribe(sub)) => { self.active.write().insert(sub); }
                    Some(Command::Unsubscribe(sub)) => { self.active.write().remove(&sub); }
                },
            }
        }
    }

    async fn replay_subscriptions(&self, socket: &mut websocket::WebSocket) {
        let subs: Vec<Subscription> = self.active.read().iter().cloned().collect();
        if subs.is_empty() {
            return;
        }

        // One `subscribe_frames` call per subscription, matching `handle_subscribe`'s per-sub call
        // pattern, so reconnect sends exactly one SUBSCRIBE frame per stream instead of a single
        // frame combining every active stream into one request.
        let mut next_id = self.next_request_id.load(Ordering::SeqCst);
        for sub in &subs {
            let meta = self.connector.subscribe_frames(std::slice::from_ref(sub), &mut next_id);
            for frame in meta.frames {
                if let Err(error) = websocket::send(socket, frame).await {
                    warn!(%error, "failed to replay subscribe frame");
                }
            }
        }
        self.next_request_id.store(next_id, Ordering::SeqCst);

        let Some(handler) = self.handler.read().clone() else {
            return;
        };

        for sub in subs.iter().filter(|s| matches!(s.kind, SubKind::Kline(_))) {
            let SubKind::Kline(interval) = sub.kind else { continue };
            let url = self
                .connector
                .historical_klines_url(&sub.symbol, interval, REPLAY_BACKFILL_LIMIT);
            let connector = Arc::clone(&self.connector);
            let rest = self.rest.clone();
            let refetched = retry_twice_with_delay(|| {
                let connector = Arc::clone(&connector);
                let rest = rest.clone();
                let url = url.clone();
                async move {
                    let body = rest.get_text(&url).await?;
                    connector.parse_historical_klines(&body, interval)
                }
            })
            .await;

            match refetched {
                Ok(candles) => {
                    for candle in candles {
                        handler(MarketEvent::new(
                            sub.exchange,
                            sub.symbol.clone(),
                            chrono::Utc::now(),
                            MarketEventKind::Candle(candle),
                        ));
                    }
                }
                Err(error) => warn!(%error, symbol = %sub.symbol, "replay backfill failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::binance::BinanceConnector;
    use std::time::Duration;

    fn task() -> ConnectionTask<BinanceConnector> {
        ConnectionTask {
            connector: Arc::new(BinanceConnector),
            active: Arc::new(RwLock::new(HashSet::new())),
            connected: Arc::new(AtomicBool::new(false)),
            manual_disconnect: Arc::new(AtomicBool::new(false)),
            next_request_id: Arc::new(AtomicU64::new(0)),
            reconnect_policy: ReconnectPolicy::default(),
            rest: RestClient::new(),
            handler: Arc::new(RwLock::new(None)),
        }
    }

    #[tokio::test]
    async fn race_with_disconnect_aborts_an_hour_long_backoff_immediately() {
        let task = task();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Command::Disconnect).unwrap();

        let result = task.race_with_disconnect(tokio::time::sleep(Duration::from_secs(3600)), &mut rx).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn race_with_disconnect_aborts_on_closed_channel() {
        let task = task();
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(tx);

        let result = task.race_with_disconnect(tokio::time::sleep(Duration::from_secs(3600)), &mut rx).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn race_with_disconnect_applies_subscribe_commands_without_aborting() {
        let task = task();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = Subscription::new(task.connector.id(), Symbol::new("BTCUSDT"), SubKind::Trade);
        tx.send(Command::Subscribe(sub.clone())).unwrap();

        let result = task.race_with_disconnect(tokio::time::sleep(Duration::from_millis(20)), &mut rx).await;
        assert_eq!(result, Some(()));
        assert!(task.active.read().contains(&sub));
    }
}
