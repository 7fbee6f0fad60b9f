//! Transport abstraction for the CipherTalk session layer
//!
//! The session manager drives a single persistent connection through this
//! trait, keeping the lifecycle state machine independent of the concrete
//! mechanism (WebSocket stream, HTTP polling fallback, or a mock in tests).
//!
//! Reconnection policy belongs to the transport: implementations that
//! auto-reconnect report the drop and the recovery as `Disconnected` /
//! `Connected` events, and the session layer mirrors them faithfully.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::TransportError;
use crate::types::{Identity, MessageEnvelope};

// ----------------------------------------------------------------------------
// Frames and Events
// ----------------------------------------------------------------------------

/// Frames the session layer pushes down to the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Identity-binding handshake, sent right after every connect so the
    /// remote side can route messages to this identity
    Register { identity: Identity },
    /// An encoded chat message
    Message { envelope: MessageEnvelope },
}

/// Events a transport reports up to the session layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Transport-level connection (re)established
    Connected,
    /// Transport-level connection lost or closed
    Disconnected { reason: Option<String> },
    /// Server acknowledged the identity-binding handshake
    RegistrationAcknowledged { identity: Identity },
    /// An inbound chat message
    MessageReceived { envelope: MessageEnvelope },
}

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// A single persistent connection to the message server.
///
/// `connect` resolves once the transport itself acknowledges the
/// connection; the caller owns the ordering of connect/disconnect and must
/// never hold two live connections.
#[async_trait]
pub trait Transport: Send {
    /// Open the connection, resolving on transport acknowledgment
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Close the connection; safe to call when already closed
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Send a frame over the live connection
    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError>;

    /// Await the next transport event
    async fn next_event(&mut self) -> Result<TransportEvent, TransportError>;

    /// Whether the transport currently holds a live connection
    fn is_connected(&self) -> bool;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect().await
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        (**self).disconnect().await
    }

    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        (**self).send(frame).await
    }

    async fn next_event(&mut self) -> Result<TransportEvent, TransportError> {
        (**self).next_event().await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

// ----------------------------------------------------------------------------
// Mock Transport (for testing)
// ----------------------------------------------------------------------------

#[cfg(any(test, feature = "testing"))]
pub use mock::{MockCall, MockDriver, MockTransport};

#[cfg(any(test, feature = "testing"))]
mod mock {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::{OutboundFrame, Transport, TransportEvent};
    use crate::errors::TransportError;

    /// Recorded transport interaction, in call order
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MockCall {
        Connect,
        Disconnect,
        Send(OutboundFrame),
    }

    /// Test handle for scripting a [`MockTransport`]
    #[derive(Clone)]
    pub struct MockDriver {
        events: mpsc::UnboundedSender<TransportEvent>,
        log: Arc<Mutex<Vec<MockCall>>>,
        fail_connect: Arc<Mutex<bool>>,
    }

    impl MockDriver {
        /// Inject a transport event for the session layer to observe
        pub fn emit(&self, event: TransportEvent) {
            let _ = self.events.send(event);
        }

        /// Snapshot of all recorded calls, in order
        pub fn calls(&self) -> Vec<MockCall> {
            self.log.lock().unwrap().clone()
        }

        /// Count of connect calls seen so far
        pub fn connect_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, MockCall::Connect))
                .count()
        }

        /// Frames sent so far
        pub fn sent_frames(&self) -> Vec<OutboundFrame> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    MockCall::Send(frame) => Some(frame),
                    _ => None,
                })
                .collect()
        }

        /// Make the next connect attempt fail
        pub fn fail_next_connect(&self) {
            *self.fail_connect.lock().unwrap() = true;
        }
    }

    /// Scripted in-memory transport recording every call
    pub struct MockTransport {
        connected: bool,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        log: Arc<Mutex<Vec<MockCall>>>,
        fail_connect: Arc<Mutex<bool>>,
    }

    impl MockTransport {
        /// Create a mock transport plus its scripting handle
        pub fn new() -> (Self, MockDriver) {
            let (tx, rx) = mpsc::unbounded_channel();
            let log = Arc::new(Mutex::new(Vec::new()));
            let fail_connect = Arc::new(Mutex::new(false));
            let driver = MockDriver {
                events: tx,
                log: Arc::clone(&log),
                fail_connect: Arc::clone(&fail_connect),
            };
            let transport = Self {
                connected: false,
                events: rx,
                log,
                fail_connect,
            };
            (transport, driver)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            self.log.lock().unwrap().push(MockCall::Connect);
            if std::mem::take(&mut *self.fail_connect.lock().unwrap()) {
                return Err(TransportError::ConnectionFailed {
                    reason: "scripted failure".to_string(),
                });
            }
            self.connected = true;
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), TransportError> {
            self.log.lock().unwrap().push(MockCall::Disconnect);
            self.connected = false;
            Ok(())
        }

        async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
            if !self.connected {
                return Err(TransportError::NotConnected);
            }
            self.log.lock().unwrap().push(MockCall::Send(frame));
            Ok(())
        }

        async fn next_event(&mut self) -> Result<TransportEvent, TransportError> {
            self.events
                .recv()
                .await
                .ok_or(TransportError::EventStreamClosed)
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
