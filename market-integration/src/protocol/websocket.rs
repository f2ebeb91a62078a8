//! Thin wrapper over `tokio-tungstenite` enforcing a connect deadline and giving every
//! exchange connector a single `StreamParser` seam to turn raw frames into typed messages.

use crate::error::SocketError;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};

/// An inbound or outbound WebSocket frame, narrowed to the variants this engine ever sends or
/// expects to receive (subscribe requests and text/binary/ping/pong/close payloads).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

impl From<WsMessage> for TungsteniteMessage {
    fn from(message: WsMessage) -> Self {
        match message {
            WsMessage::Text(text) => TungsteniteMessage::Text(text.into()),
            WsMessage::Binary(bytes) => TungsteniteMessage::Binary(bytes.into()),
            WsMessage::Ping(bytes) => TungsteniteMessage::Ping(bytes.into()),
            WsMessage::Pong(bytes) => TungsteniteMessage::Pong(bytes.into()),
            WsMessage::Close => TungsteniteMessage::Close(None),
        }
    }
}

impl TryFrom<TungsteniteMessage> for WsMessage {
    type Error = SocketError;

    fn try_from(message: TungsteniteMessage) -> Result<Self, Self::Error> {
        match message {
            TungsteniteMessage::Text(text) => Ok(WsMessage::Text(text.to_string())),
            TungsteniteMessage::Binary(bytes) => Ok(WsMessage::Binary(bytes.to_vec())),
            TungsteniteMessage::Ping(bytes) => Ok(WsMessage::Ping(bytes.to_vec())),
            TungsteniteMessage::Pong(bytes) => Ok(WsMessage::Pong(bytes.to_vec())),
            TungsteniteMessage::Close(_) => Ok(WsMessage::Close),
            TungsteniteMessage::Frame(_) => Err(SocketError::Unidentifiable),
        }
    }
}

/// The raw duplex WebSocket connection, ready for subscribe frames to be written to it.
pub type WebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens a WebSocket connection to `url`, failing with [`SocketError::Timeout`] if the
/// handshake has not completed within `timeout`.
pub async fn connect(url: &str, timeout: Duration) -> Result<WebSocket, SocketError> {
    match tokio::time::timeout(timeout, connect_async(url)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(error)) => Err(SocketError::WebSocket(error)),
        Err(_elapsed) => Err(SocketError::Timeout),
    }
}

/// Writes a [`WsMessage`] to an open [`WebSocket`].
pub async fn send(socket: &mut WebSocket, message: WsMessage) -> Result<(), SocketError> {
    socket
        .send(message.into())
        .await
        .map_err(SocketError::WebSocket)
}

/// Reads the next frame off `socket` as a typed [`WsMessage`], or `None` once the stream ends.
pub async fn next(socket: &mut WebSocket) -> Option<Result<WsMessage, SocketError>> {
    match socket.next().await {
        Some(Ok(message)) => Some(WsMessage::try_from(message)),
        Some(Err(error)) => Some(Err(SocketError::WebSocket(error))),
        None => None,
    }
}

/// Parses inbound text/binary WebSocket payloads into an exchange-specific message type.
///
/// Every exchange connector implements this once for its wire format; the provider loop calls
/// it on every [`WsMessage::Text`]/[`WsMessage::Binary`] frame without needing to know the
/// exchange's JSON shape.
pub trait StreamParser {
    type Message: DeserializeOwned;

    fn parse(payload: &WsMessage) -> Option<Result<Self::Message, SocketError>> {
        let text = match payload {
            WsMessage::Text(text) => text.as_str(),
            WsMessage::Binary(bytes) => std::str::from_utf8(bytes).ok()?,
            _ => return None,
        };
        Some(serde_json::from_str(text).map_err(|error| SocketError::ParseError(error.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ping {
        ping: u64,
    }

    struct TestParser;
    impl StreamParser for TestParser {
        type Message = Ping;
    }

    #[test]
    fn parses_text_payload() {
        let payload = WsMessage::Text(r#"{"ping":7}"#.to_string());
        let parsed = TestParser::parse(&payload).unwrap().unwrap();
        assert_eq!(parsed, Ping { ping: 7 });
    }

    #[test]
    fn ignores_non_text_binary_payloads() {
        assert!(TestParser::parse(&WsMessage::Close).is_none());
    }

    #[test]
    fn surfaces_parse_error() {
        let payload = WsMessage::Text("not json".to_string());
        assert!(TestParser::parse(&payload).unwrap().is_err());
    }
}
