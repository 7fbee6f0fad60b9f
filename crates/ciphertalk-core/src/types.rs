//! Shared domain types for the CipherTalk messenger
//!
//! Identities, cipher keys, connection states, and registration verdicts
//! live here. Invariants are enforced at construction (and at the serde
//! boundary) so the rest of the workspace never handles an invalid value.

use core::fmt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cipher::EncodedMessage;
use crate::errors::CoreError;

// ----------------------------------------------------------------------------
// Identity
// ----------------------------------------------------------------------------

/// The authenticated user identity a session is bound to.
///
/// Always non-empty: construction from an empty or whitespace-only string
/// yields `None`, which is how the session layer implements its silent
/// precondition gate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Create an identity from a raw string, rejecting empty input
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Get the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = CoreError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(&raw).ok_or_else(|| CoreError::MalformedFrame("empty identity".to_string()))
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ----------------------------------------------------------------------------
// Cipher Key
// ----------------------------------------------------------------------------

/// Per-conversation shift key, restricted to the range [3,9].
///
/// The key travels with the ciphertext out of band; it is chosen by the
/// user and never negotiated with the remote party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CipherKey(u8);

impl CipherKey {
    /// Smallest allowed key
    pub const MIN: u8 = 3;
    /// Largest allowed key
    pub const MAX: u8 = 9;

    /// Create a key, rejecting values outside [3,9]
    pub fn new(key: u8) -> Result<Self, CoreError> {
        if (Self::MIN..=Self::MAX).contains(&key) {
            Ok(Self(key))
        } else {
            Err(CoreError::InvalidCipherKey {
                key,
                min: Self::MIN,
                max: Self::MAX,
            })
        }
    }

    /// Get the raw shift value
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for CipherKey {
    type Error = CoreError;

    fn try_from(key: u8) -> Result<Self, Self::Error> {
        Self::new(key)
    }
}

impl From<CipherKey> for u8 {
    fn from(key: CipherKey) -> Self {
        key.0
    }
}

impl fmt::Display for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Lifecycle states of the single live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No live connection
    Disconnected,
    /// Connection requested, awaiting transport acknowledgment
    Connecting,
    /// Transport acknowledged, handshake emitted
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Registration Types
// ----------------------------------------------------------------------------

/// Profile summary returned for a registered contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// Outcome of a registration lookup for one canonical identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationVerdict {
    /// The identifier belongs to an existing account
    Registered(UserSummary),
    /// Not registered; carries the backend-provided reason string
    NotRegistered(String),
}

/// A cached registration result, keyed by canonical identifier.
///
/// Entries live for the whole process and are only removed by an explicit
/// cache reset; there is no TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationEntry {
    /// Canonical identifier the lookup was issued for
    pub identifier: String,
    /// Lookup verdict
    pub verdict: RegistrationVerdict,
}

impl RegistrationEntry {
    /// Whether the identifier maps to a registered account
    pub fn is_registered(&self) -> bool {
        matches!(self.verdict, RegistrationVerdict::Registered(_))
    }
}

// ----------------------------------------------------------------------------
// Message Envelope
// ----------------------------------------------------------------------------

/// The unit of message exchange over a session.
///
/// The body is already cipher-encoded; the key rides along so the receiving
/// side can decode without separate negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    pub message_id: Uuid,
    pub conversation_id: String,
    pub sender: String,
    pub recipient: String,
    pub body: EncodedMessage,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_rejects_empty_and_whitespace() {
        assert!(Identity::new("").is_none());
        assert!(Identity::new("   ").is_none());
        assert_eq!(Identity::new(" user-1 ").unwrap().as_str(), "user-1");
    }

    #[test]
    fn cipher_key_bounds() {
        assert!(CipherKey::new(2).is_err());
        assert!(CipherKey::new(10).is_err());
        for k in 3..=9 {
            assert_eq!(CipherKey::new(k).unwrap().value(), k);
        }
    }

    #[test]
    fn user_summary_wire_shape() {
        let json = r#"{
            "id": "u-17",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "profilePicture": null
        }"#;
        let user: UserSummary = serde_json::from_str(json).unwrap();
        assert_eq!(user.first_name, "Ada");
        assert!(user.profile_picture.is_none());
    }
}
