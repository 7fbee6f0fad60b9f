//! Concrete transports: WebSocket stream with HTTP polling fallback
//!
//! Frames cross the wire as JSON, tagged by a `type` field: the client
//! sends `register` and `message`, the server sends `user_registered` and
//! `message`. Both transports implement the same [`Transport`] trait the
//! session manager drives; [`connect_with_fallback`] tries the configured
//! modes in preference order.
//!
//! Reconnection is handled here, not in the session layer: when a live
//! stream drops, `next_event` reports `Disconnected`, then (with
//! `auto_reconnect` enabled) keeps retrying on the configured interval and
//! reports `Connected` once the stream is back.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};
use url::Url;

use ciphertalk_core::{
    Identity, MessageEnvelope, OutboundFrame, Transport, TransportConfig, TransportError,
    TransportEvent, TransportMode,
};

/// Idle delay between polling rounds that returned no events
const POLL_IDLE_INTERVAL: std::time::Duration = std::time::Duration::from_millis(500);

// ----------------------------------------------------------------------------
// Wire Frames
// ----------------------------------------------------------------------------

/// Server-to-client frames
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundWire {
    UserRegistered { identity: Identity },
    Message { envelope: MessageEnvelope },
}

impl From<InboundWire> for TransportEvent {
    fn from(wire: InboundWire) -> Self {
        match wire {
            InboundWire::UserRegistered { identity } => {
                TransportEvent::RegistrationAcknowledged { identity }
            }
            InboundWire::Message { envelope } => TransportEvent::MessageReceived { envelope },
        }
    }
}

fn encode_frame(frame: &OutboundFrame) -> Result<String, TransportError> {
    serde_json::to_string(frame).map_err(|e| TransportError::SendFailed {
        reason: format!("frame serialization: {e}"),
    })
}

fn parse_inbound(text: &str) -> Option<TransportEvent> {
    match serde_json::from_str::<InboundWire>(text) {
        Ok(wire) => Some(wire.into()),
        Err(e) => {
            warn!(error = %e, "dropping unparsable inbound frame");
            None
        }
    }
}

/// Rewrite a ws(s) base URL to its http(s) sibling for the polling fallback
fn http_base(base_url: &str) -> String {
    if let Some(rest) = base_url.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        base_url.to_string()
    }
}

/// Rewrite an http(s) base URL to its ws(s) sibling for the stream transport
fn ws_base(base_url: &str) -> String {
    if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base_url.to_string()
    }
}

// ----------------------------------------------------------------------------
// WebSocket Transport
// ----------------------------------------------------------------------------

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Persistent message-stream transport over WebSocket
pub struct WebSocketTransport {
    config: TransportConfig,
    stream: Option<WsStream>,
    /// Set by an explicit disconnect; stops the reconnect loop
    closed: bool,
}

impl WebSocketTransport {
    /// Create an unconnected stream transport
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            stream: None,
            closed: false,
        }
    }

    fn endpoint(&self) -> Result<Url, TransportError> {
        let raw = format!("{}{}", ws_base(&self.config.base_url), self.config.path);
        Url::parse(&raw).map_err(|e| TransportError::InvalidConfiguration {
            reason: format!("invalid endpoint {raw}: {e}"),
        })
    }

    async fn open_stream(&mut self) -> Result<(), TransportError> {
        let endpoint = self.endpoint()?;
        debug!(%endpoint, "opening websocket stream");
        let (stream, _response) =
            connect_async(endpoint)
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    reason: e.to_string(),
                })?;
        self.stream = Some(stream);
        Ok(())
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.closed = false;
        self.open_stream().await
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                trace!(error = %e, "websocket close handshake failed");
            }
        }
        Ok(())
    }

    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let text = encode_frame(&frame)?;
        stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed {
                reason: e.to_string(),
            })
    }

    async fn next_event(&mut self) -> Result<TransportEvent, TransportError> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                if self.closed || !self.config.auto_reconnect {
                    return Err(TransportError::EventStreamClosed);
                }
                sleep(self.config.reconnect_interval).await;
                match self.open_stream().await {
                    Ok(()) => return Ok(TransportEvent::Connected),
                    Err(e) => {
                        warn!(error = %e, "websocket reconnect attempt failed");
                        continue;
                    }
                }
            };

            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = parse_inbound(&text) {
                        return Ok(event);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    self.stream = None;
                    return Ok(TransportEvent::Disconnected {
                        reason: frame.map(|f| f.reason.into_owned()),
                    });
                }
                Some(Ok(_)) => {
                    // Ping/pong/binary carry no session-visible payload.
                }
                Some(Err(e)) => {
                    self.stream = None;
                    return Ok(TransportEvent::Disconnected {
                        reason: Some(e.to_string()),
                    });
                }
                None => {
                    self.stream = None;
                    return Ok(TransportEvent::Disconnected { reason: None });
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

// ----------------------------------------------------------------------------
// Polling Transport
// ----------------------------------------------------------------------------

/// HTTP long-poll fallback: frames are POSTed to `{base}{path}/send`,
/// inbound events fetched from `{base}{path}/events`.
pub struct PollingTransport {
    client: reqwest::Client,
    endpoint: String,
    connected: bool,
    closed: bool,
    config: TransportConfig,
    pending: VecDeque<TransportEvent>,
}

impl PollingTransport {
    /// Create an unconnected polling transport
    pub fn new(config: TransportConfig) -> Self {
        let endpoint = format!("{}{}", http_base(&config.base_url), config.path);
        Self {
            client: reqwest::Client::new(),
            endpoint,
            connected: false,
            closed: false,
            config,
            pending: VecDeque::new(),
        }
    }

    async fn probe(&self) -> Result<(), TransportError> {
        self.client
            .get(&self.endpoint)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| TransportError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn fetch_events(&mut self) -> Result<(), TransportError> {
        let url = format!("{}/events", self.endpoint);
        let frames: Vec<serde_json::Value> = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| TransportError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .json()
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        for frame in frames {
            if let Some(event) = parse_inbound(&frame.to_string()) {
                self.pending.push_back(event);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for PollingTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.connected {
            return Ok(());
        }
        self.closed = false;
        self.probe().await?;
        self.connected = true;
        debug!(endpoint = %self.endpoint, "polling transport connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.connected = false;
        self.pending.clear();
        Ok(())
    }

    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        let url = format!("{}/send", self.endpoint);
        self.client
            .post(&url)
            .json(&frame)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| TransportError::SendFailed {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<TransportEvent, TransportError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }

            if !self.connected {
                if self.closed || !self.config.auto_reconnect {
                    return Err(TransportError::EventStreamClosed);
                }
                sleep(self.config.reconnect_interval).await;
                match self.probe().await {
                    Ok(()) => {
                        self.connected = true;
                        return Ok(TransportEvent::Connected);
                    }
                    Err(e) => {
                        warn!(error = %e, "polling reconnect attempt failed");
                        continue;
                    }
                }
            }

            match self.fetch_events().await {
                Ok(()) => {
                    if self.pending.is_empty() {
                        sleep(POLL_IDLE_INTERVAL).await;
                    }
                }
                Err(e) => {
                    self.connected = false;
                    return Ok(TransportEvent::Disconnected {
                        reason: Some(e.to_string()),
                    });
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ----------------------------------------------------------------------------
// Mode Fallback
// ----------------------------------------------------------------------------

/// Try the configured transport modes in preference order, returning the
/// first one that connects.
pub async fn connect_with_fallback(
    config: &TransportConfig,
) -> Result<Box<dyn Transport>, TransportError> {
    for mode in &config.modes {
        let mut transport: Box<dyn Transport> = match mode {
            TransportMode::Stream => Box::new(WebSocketTransport::new(config.clone())),
            TransportMode::Polling => Box::new(PollingTransport::new(config.clone())),
        };
        match transport.connect().await {
            Ok(()) => {
                debug!(?mode, "transport mode established");
                return Ok(transport);
            }
            Err(e) => {
                warn!(?mode, error = %e, "transport mode failed, trying next");
            }
        }
    }
    Err(TransportError::AllModesExhausted)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_registered_frame() {
        let event = parse_inbound(r#"{"type":"user_registered","identity":"user-1"}"#).unwrap();
        assert_eq!(
            event,
            TransportEvent::RegistrationAcknowledged {
                identity: Identity::new("user-1").unwrap()
            }
        );
    }

    #[test]
    fn parses_message_frame() {
        let json = r#"{
            "type": "message",
            "envelope": {
                "messageId": "6f7a1a2e-3b4c-4d5e-8f90-112233445566",
                "conversationId": "conv-1",
                "sender": "user-2",
                "recipient": "user-1",
                "body": { "ciphertext": "KHOOR", "key": 3 }
            }
        }"#;
        let event = parse_inbound(json).unwrap();
        match event {
            TransportEvent::MessageReceived { envelope } => {
                assert_eq!(envelope.body.open(), "HELLO");
                assert_eq!(envelope.sender, "user-2");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unparsable_frames_are_dropped() {
        assert!(parse_inbound("not json").is_none());
        assert!(parse_inbound(r#"{"type":"unknown"}"#).is_none());
    }

    #[test]
    fn scheme_rewrites() {
        assert_eq!(http_base("wss://chat.example.com"), "https://chat.example.com");
        assert_eq!(http_base("ws://localhost:8080"), "http://localhost:8080");
        assert_eq!(ws_base("https://chat.example.com"), "wss://chat.example.com");
        assert_eq!(ws_base("wss://chat.example.com"), "wss://chat.example.com");
    }

    #[test]
    fn outbound_frames_encode_with_type_tag() {
        let text = encode_frame(&OutboundFrame::Register {
            identity: Identity::new("user-1").unwrap(),
        })
        .unwrap();
        assert_eq!(text, r#"{"type":"register","identity":"user-1"}"#);
    }
}
