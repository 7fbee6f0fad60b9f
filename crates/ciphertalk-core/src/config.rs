//! Centralized configuration for the CipherTalk core and runtime
//!
//! All tunables live here so deployments configure one surface instead of
//! scattering knobs across the components.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identity::Region;

// ----------------------------------------------------------------------------
// Transport Configuration
// ----------------------------------------------------------------------------

/// Allowed transport mechanisms, in preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Persistent message stream (WebSocket)
    Stream,
    /// HTTP long-poll fallback
    Polling,
}

/// Configuration for the real-time transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Server base URL, e.g. "wss://chat.example.com" / "https://chat.example.com"
    pub base_url: String,
    /// Fixed path segment appended to the base URL
    pub path: String,
    /// Transport modes to try, in order
    pub modes: Vec<TransportMode>,
    /// Whether the transport reconnects on its own after a drop
    pub auto_reconnect: bool,
    /// Delay between reconnect attempts
    pub reconnect_interval: Duration,
}

impl TransportConfig {
    /// Configuration for a given server, with default path and modes
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            path: "/chat".to_string(),
            modes: vec![TransportMode::Stream, TransportMode::Polling],
            auto_reconnect: true,
            reconnect_interval: Duration::from_secs(3),
        }
    }
}

// ----------------------------------------------------------------------------
// Session Configuration
// ----------------------------------------------------------------------------

/// Channel sizing for the session manager's fan-out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Buffer size of the transition broadcast channel
    pub transition_buffer: usize,
    /// Buffer size of the inbound-message broadcast channel
    pub inbound_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transition_buffer: 32, // lifecycle transitions are infrequent
            inbound_buffer: 64,    // message bursts need headroom
        }
    }
}

// ----------------------------------------------------------------------------
// Resolver Configuration
// ----------------------------------------------------------------------------

/// Configuration for the registration resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Coalescing window for fast-changing input
    pub debounce_window: Duration,
    /// Fixed default region for phone-identity normalization
    pub region: Region,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(500),
            region: Region::default(),
        }
    }
}

// ----------------------------------------------------------------------------
// Notification Settings
// ----------------------------------------------------------------------------

/// User-controlled notification preferences, read before every dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Master switch; when false no notification is dispatched at all
    pub enabled: bool,
    /// When false the message body is replaced with a generic placeholder
    pub message_preview: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            message_preview: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_defaults_prefer_stream() {
        let config = TransportConfig::new("wss://chat.example.com");
        assert_eq!(config.path, "/chat");
        assert_eq!(config.modes, vec![TransportMode::Stream, TransportMode::Polling]);
        assert!(config.auto_reconnect);
    }

    #[test]
    fn resolver_default_window_is_half_a_second() {
        assert_eq!(
            ResolverConfig::default().debounce_window,
            Duration::from_millis(500)
        );
    }
}
