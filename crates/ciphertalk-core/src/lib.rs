//! CipherTalk Core
//!
//! This crate provides the foundational pieces of the CipherTalk messenger:
//! the keyed substitution cipher applied to message bodies, phone-identity
//! normalization for contact matching, shared types, configuration, and the
//! transport abstraction the runtime builds sessions on.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod cipher;
pub mod config;
pub mod errors;
pub mod identity;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use cipher::{decode, encode, EncodedMessage};
pub use config::{NotificationSettings, ResolverConfig, SessionConfig, TransportConfig, TransportMode};
pub use errors::{CoreError, Result, TransportError};
pub use identity::{normalize, normalize_all, Region};
pub use transport::{OutboundFrame, Transport, TransportEvent};
pub use types::{
    CipherKey, ConnectionState, Identity, MessageEnvelope, RegistrationEntry,
    RegistrationVerdict, UserSummary,
};

#[cfg(any(test, feature = "testing"))]
pub use transport::MockTransport;
