//! CipherTalk Runtime
//!
//! This crate contains the stateful services of the CipherTalk messenger:
//! - [`SessionManager`]: the single live real-time connection, driven as an
//!   explicit state machine by transport events
//! - [`RegistrationResolver`]: debounced, cached contact registration lookup
//! - Concrete transports (WebSocket stream with HTTP polling fallback)
//! - Notification dispatch gated on user settings
//!
//! `ciphertalk-core` provides the pure building blocks (cipher, identity
//! normalization, types); this is the engine that wires them to the network.

pub mod lookup;
pub mod notify;
pub mod resolver;
pub mod session;
pub mod socket;

pub use lookup::{HttpRegistrationLookup, LookupError, RegistrationLookup};
pub use notify::{
    Notification, NotificationDispatcher, NotificationKind, NotificationMetadata, NotificationSink,
};
pub use resolver::{DebounceGate, RegistrationCache, RegistrationResolver, Resolution};
pub use session::{SessionManager, SessionTransition};
pub use socket::{connect_with_fallback, PollingTransport, WebSocketTransport};

// Re-export core types for convenience
pub use ciphertalk_core::{
    CipherKey, ConnectionState, CoreError, Identity, MessageEnvelope, NotificationSettings,
    OutboundFrame, RegistrationEntry, RegistrationVerdict, ResolverConfig, Result, SessionConfig,
    Transport, TransportConfig, TransportError, TransportEvent, TransportMode, UserSummary,
};
