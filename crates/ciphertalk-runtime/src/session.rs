//! Session lifecycle management
//!
//! The [`SessionManager`] owns the single live real-time connection for the
//! currently authenticated identity and drives it through an explicit state
//! machine: `Disconnected → Connecting → Connected → Disconnected`.
//!
//! Transitions are published on a broadcast channel so interested observers
//! (UI, tests) see the full ordered sequence; the current state is also
//! available through a `watch` receiver and a getter. The manager owns the
//! transport exclusively — no other component mutates connection state.
//!
//! Invariants upheld here:
//! - at most one live connection at any time; switching identity completes
//!   an observable teardown before the new connect begins
//! - a transport-reported disconnect is always reflected; the manager never
//!   holds a stale Connected belief
//! - establishing with an empty identity is a silent no-op, not an error

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use ciphertalk_core::{
    cipher::EncodedMessage, CipherKey, ConnectionState, Identity, MessageEnvelope, OutboundFrame,
    SessionConfig, Transport, TransportError, TransportEvent,
};

// ----------------------------------------------------------------------------
// Session Transition
// ----------------------------------------------------------------------------

/// One observed state change of the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTransition {
    /// Identity the session was bound to at the time of the transition
    pub identity: Option<Identity>,
    /// State before the transition
    pub from: ConnectionState,
    /// State after the transition
    pub to: ConnectionState,
}

// ----------------------------------------------------------------------------
// Session Manager
// ----------------------------------------------------------------------------

/// Owns and drives the single live session for one identity.
///
/// Construct with [`SessionManager::new`], drive transport events through
/// [`SessionManager::poll_once`] (or the [`SessionManager::run`] loop), and
/// release everything with [`SessionManager::dispose`].
pub struct SessionManager<T: Transport> {
    /// Underlying transport, owned exclusively
    transport: T,
    /// Identity the session is currently bound to
    identity: Option<Identity>,
    /// Current lifecycle state
    state: ConnectionState,
    /// Opaque handle of the live connection, bumped per establish
    handle: u64,
    /// Whether the server acknowledged the identity-binding handshake
    registration_acked: bool,
    /// Current-state channel for callers that only need the latest value
    state_tx: watch::Sender<ConnectionState>,
    /// Ordered transition fan-out
    transitions: broadcast::Sender<SessionTransition>,
    /// Inbound message fan-out
    inbound: broadcast::Sender<MessageEnvelope>,
}

impl<T: Transport> SessionManager<T> {
    /// Create a manager around a transport
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (transitions, _) = broadcast::channel(config.transition_buffer);
        let (inbound, _) = broadcast::channel(config.inbound_buffer);
        Self {
            transport,
            identity: None,
            state: ConnectionState::Disconnected,
            handle: 0,
            registration_acked: false,
            state_tx,
            transitions,
            inbound,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Identity the session is bound to, if any
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Opaque handle of the current connection attempt
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Whether the server has acknowledged the handshake for the current
    /// connection
    pub fn registration_acknowledged(&self) -> bool {
        self.registration_acked
    }

    /// Observe the full ordered sequence of transitions
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<SessionTransition> {
        self.transitions.subscribe()
    }

    /// Observe only the latest state
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Observe inbound message envelopes
    pub fn subscribe_messages(&self) -> broadcast::Receiver<MessageEnvelope> {
        self.inbound.subscribe()
    }

    /// Establish a session for `raw_identity`.
    ///
    /// An empty or whitespace-only identity is a documented precondition
    /// gate: the call is a silent no-op and the manager stays Disconnected.
    /// Callers check [`SessionManager::state`] rather than expect an error.
    ///
    /// If a session is live for a different identity, its teardown completes
    /// (and the Disconnected transition is published) before the new connect
    /// begins. Establishing again for the identity already live is a no-op.
    pub async fn establish(&mut self, raw_identity: &str) -> Result<(), TransportError> {
        let Some(identity) = Identity::new(raw_identity) else {
            debug!("establish called without identity; staying disconnected");
            return Ok(());
        };

        if self.state != ConnectionState::Disconnected {
            if self.identity.as_ref() == Some(&identity) {
                debug!(%identity, "session already live for identity");
                return Ok(());
            }
            // Identity switch: the old session must be observably gone
            // before the new one starts.
            self.teardown().await?;
        } else if self.identity.is_some() && self.identity.as_ref() != Some(&identity) {
            // Bound but dropped (e.g. awaiting transport reconnect): release
            // the transport so no reconnect for the old identity survives.
            self.teardown().await?;
        }

        self.identity = Some(identity.clone());
        self.registration_acked = false;
        self.transition(ConnectionState::Connecting);

        match self.transport.connect().await {
            Ok(()) => {
                self.handle = self.handle.wrapping_add(1);
                self.transition(ConnectionState::Connected);
                info!(%identity, handle = self.handle, "session connected");
                self.send_handshake().await
            }
            Err(e) => {
                warn!(%identity, error = %e, "session connect failed");
                self.transition(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Release the connection and return to Disconnected.
    ///
    /// Idempotent: calling with no live session (and no bound identity) does
    /// nothing and publishes nothing.
    pub async fn teardown(&mut self) -> Result<(), TransportError> {
        if self.state == ConnectionState::Disconnected && self.identity.is_none() {
            return Ok(());
        }

        self.transport.disconnect().await?;
        if self.state != ConnectionState::Disconnected {
            self.transition(ConnectionState::Disconnected);
        }
        if let Some(identity) = self.identity.take() {
            info!(%identity, "session torn down");
        }
        self.registration_acked = false;
        Ok(())
    }

    /// Encode `plaintext` with `key` and send it over the live session.
    ///
    /// Returns the envelope that was transmitted.
    pub async fn send_message(
        &mut self,
        conversation_id: &str,
        recipient: &str,
        plaintext: &str,
        key: CipherKey,
    ) -> Result<MessageEnvelope, TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        let sender = self
            .identity
            .as_ref()
            .ok_or(TransportError::NotConnected)?;

        let envelope = MessageEnvelope {
            message_id: Uuid::new_v4(),
            conversation_id: conversation_id.to_string(),
            sender: sender.as_str().to_string(),
            recipient: recipient.to_string(),
            body: EncodedMessage::seal(plaintext, key),
        };
        self.transport
            .send(OutboundFrame::Message {
                envelope: envelope.clone(),
            })
            .await?;
        Ok(envelope)
    }

    /// Apply one transport event to the state machine
    pub async fn handle_transport_event(
        &mut self,
        event: TransportEvent,
    ) -> Result<(), TransportError> {
        match event {
            TransportEvent::Connected => {
                if self.identity.is_some() {
                    self.transition(ConnectionState::Connected);
                    // Every (re)connect needs a fresh identity binding.
                    self.send_handshake().await?;
                }
            }
            TransportEvent::Disconnected { reason } => {
                warn!(?reason, "transport reported disconnect");
                self.registration_acked = false;
                self.transition(ConnectionState::Disconnected);
            }
            TransportEvent::RegistrationAcknowledged { identity } => {
                if self.identity.as_ref() == Some(&identity) {
                    info!(%identity, "registration handshake acknowledged");
                    self.registration_acked = true;
                } else {
                    debug!(%identity, "ignoring stale registration acknowledgment");
                }
            }
            TransportEvent::MessageReceived { envelope } => {
                let _ = self.inbound.send(envelope);
            }
        }
        Ok(())
    }

    /// Await and apply the next transport event
    pub async fn poll_once(&mut self) -> Result<(), TransportError> {
        let event = self.transport.next_event().await?;
        self.handle_transport_event(event).await
    }

    /// Drive the event pump until the transport's event stream closes
    pub async fn run(&mut self) {
        loop {
            match self.poll_once().await {
                Ok(()) => {}
                Err(TransportError::EventStreamClosed) => {
                    debug!("transport event stream closed; stopping session pump");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "session pump error");
                    break;
                }
            }
        }
    }

    /// Tear down and consume the manager
    pub async fn dispose(mut self) -> Result<(), TransportError> {
        self.teardown().await
    }

    async fn send_handshake(&mut self) -> Result<(), TransportError> {
        let Some(identity) = self.identity.clone() else {
            return Ok(());
        };
        debug!(%identity, "sending registration handshake");
        self.transport
            .send(OutboundFrame::Register { identity })
            .await
    }

    fn transition(&mut self, to: ConnectionState) {
        if self.state == to {
            return;
        }
        let transition = SessionTransition {
            identity: self.identity.clone(),
            from: self.state,
            to,
        };
        debug!(from = %transition.from, to = %transition.to, "session transition");
        self.state = to;
        self.state_tx.send_replace(to);
        let _ = self.transitions.send(transition);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ciphertalk_core::transport::{MockCall, MockTransport};
    use ciphertalk_core::SessionConfig;

    fn manager() -> (SessionManager<MockTransport>, ciphertalk_core::transport::MockDriver) {
        let (transport, driver) = MockTransport::new();
        (
            SessionManager::new(transport, SessionConfig::default()),
            driver,
        )
    }

    fn register_frame(identity: &str) -> MockCall {
        MockCall::Send(OutboundFrame::Register {
            identity: Identity::new(identity).unwrap(),
        })
    }

    #[tokio::test]
    async fn empty_identity_is_a_silent_noop() {
        let (mut session, driver) = manager();
        session.establish("").await.unwrap();
        session.establish("   ").await.unwrap();

        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn establish_connects_and_sends_handshake() {
        let (mut session, driver) = manager();
        let mut transitions = session.subscribe_transitions();

        session.establish("user-1").await.unwrap();

        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(session.identity().unwrap().as_str(), "user-1");
        assert_eq!(
            driver.calls(),
            vec![MockCall::Connect, register_frame("user-1")]
        );

        let first = transitions.recv().await.unwrap();
        assert_eq!(first.from, ConnectionState::Disconnected);
        assert_eq!(first.to, ConnectionState::Connecting);
        let second = transitions.recv().await.unwrap();
        assert_eq!(second.to, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn establishing_twice_keeps_one_connection() {
        let (mut session, driver) = manager();
        session.establish("user-1").await.unwrap();
        session.establish("user-1").await.unwrap();

        assert_eq!(driver.connect_count(), 1);
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn identity_switch_tears_down_before_connecting() {
        let (mut session, driver) = manager();
        let mut transitions = session.subscribe_transitions();

        session.establish("user-1").await.unwrap();
        session.establish("user-2").await.unwrap();

        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(session.identity().unwrap().as_str(), "user-2");

        // Transport calls: one connection at a time, disconnect between.
        assert_eq!(
            driver.calls(),
            vec![
                MockCall::Connect,
                register_frame("user-1"),
                MockCall::Disconnect,
                MockCall::Connect,
                register_frame("user-2"),
            ]
        );

        // Published sequence: the Disconnected transition for user-1 comes
        // strictly before the Connecting transition for user-2.
        let mut observed = Vec::new();
        while let Ok(t) = transitions.try_recv() {
            observed.push(t);
        }
        let disconnect_a = observed
            .iter()
            .position(|t| {
                t.to == ConnectionState::Disconnected
                    && t.identity.as_ref().map(Identity::as_str) == Some("user-1")
            })
            .expect("teardown of user-1 must be observable");
        let connecting_b = observed
            .iter()
            .position(|t| {
                t.to == ConnectionState::Connecting
                    && t.identity.as_ref().map(Identity::as_str) == Some("user-2")
            })
            .expect("connect of user-2 must be observable");
        assert!(disconnect_a < connecting_b);
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let (mut session, driver) = manager();
        session.teardown().await.unwrap();
        session.teardown().await.unwrap();
        assert!(driver.calls().is_empty());

        session.establish("user-1").await.unwrap();
        session.teardown().await.unwrap();
        session.teardown().await.unwrap();
        assert_eq!(
            driver.calls(),
            vec![
                MockCall::Connect,
                register_frame("user-1"),
                MockCall::Disconnect,
            ]
        );
    }

    #[tokio::test]
    async fn transport_disconnect_is_reflected() {
        let (mut session, driver) = manager();
        session.establish("user-1").await.unwrap();
        assert_eq!(session.state(), ConnectionState::Connected);

        driver.emit(TransportEvent::Disconnected {
            reason: Some("network loss".to_string()),
        });
        session.poll_once().await.unwrap();

        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(!session.registration_acknowledged());
    }

    #[tokio::test]
    async fn reconnect_event_resends_handshake() {
        let (mut session, driver) = manager();
        session.establish("user-1").await.unwrap();

        driver.emit(TransportEvent::Disconnected { reason: None });
        session.poll_once().await.unwrap();
        driver.emit(TransportEvent::Connected);
        session.poll_once().await.unwrap();

        assert_eq!(session.state(), ConnectionState::Connected);
        let registers = driver
            .sent_frames()
            .into_iter()
            .filter(|f| matches!(f, OutboundFrame::Register { .. }))
            .count();
        assert_eq!(registers, 2);
    }

    #[tokio::test]
    async fn registration_acknowledgment_is_tracked() {
        let (mut session, driver) = manager();
        session.establish("user-1").await.unwrap();
        assert!(!session.registration_acknowledged());

        driver.emit(TransportEvent::RegistrationAcknowledged {
            identity: Identity::new("user-1").unwrap(),
        });
        session.poll_once().await.unwrap();
        assert!(session.registration_acknowledged());

        // Acknowledgment for some other identity is ignored.
        driver.emit(TransportEvent::Disconnected { reason: None });
        session.poll_once().await.unwrap();
        driver.emit(TransportEvent::RegistrationAcknowledged {
            identity: Identity::new("user-9").unwrap(),
        });
        session.poll_once().await.unwrap();
        assert!(!session.registration_acknowledged());
    }

    #[tokio::test]
    async fn send_message_encodes_the_body() {
        let (mut session, driver) = manager();
        session.establish("user-1").await.unwrap();

        let key = CipherKey::new(3).unwrap();
        let envelope = session
            .send_message("conv-1", "user-2", "HELLO", key)
            .await
            .unwrap();

        assert_eq!(envelope.body.ciphertext, "KHOOR");
        assert_eq!(envelope.body.open(), "HELLO");
        assert_eq!(envelope.sender, "user-1");

        let sent = driver.sent_frames();
        assert!(sent
            .iter()
            .any(|f| matches!(f, OutboundFrame::Message { envelope: e } if e.body.ciphertext == "KHOOR")));
    }

    #[tokio::test]
    async fn send_message_requires_connection() {
        let (mut session, _driver) = manager();
        let key = CipherKey::new(4).unwrap();
        let err = session
            .send_message("conv-1", "user-2", "hi", key)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[tokio::test]
    async fn failed_connect_returns_to_disconnected() {
        let (mut session, driver) = manager();
        driver.fail_next_connect();

        let err = session.establish("user-1").await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed { .. }));
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn inbound_messages_fan_out() {
        let (mut session, driver) = manager();
        let mut messages = session.subscribe_messages();
        session.establish("user-1").await.unwrap();

        let envelope = MessageEnvelope {
            message_id: Uuid::new_v4(),
            conversation_id: "conv-1".to_string(),
            sender: "user-2".to_string(),
            recipient: "user-1".to_string(),
            body: EncodedMessage::seal("see you at noon", CipherKey::new(5).unwrap()),
        };
        driver.emit(TransportEvent::MessageReceived {
            envelope: envelope.clone(),
        });
        session.poll_once().await.unwrap();

        let received = messages.recv().await.unwrap();
        assert_eq!(received, envelope);
        assert_eq!(received.body.open(), "see you at noon");
    }
}
