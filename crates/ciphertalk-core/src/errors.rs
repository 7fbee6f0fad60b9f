//! Error types for the CipherTalk core
//!
//! Nothing in this crate is fatal to the process: every error is local and
//! recoverable by the caller layer. Pure transforms (cipher, identity
//! normalization) never error at all; the types here cover key validation
//! and the transport seam.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Errors surfaced by transport implementations
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("send failed: {reason}")]
    SendFailed { reason: String },

    #[error("transport is not connected")]
    NotConnected,

    #[error("event stream closed")]
    EventStreamClosed,

    #[error("invalid transport configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("no transport mode could be established")]
    AllModesExhausted,
}

// ----------------------------------------------------------------------------
// Core Error
// ----------------------------------------------------------------------------

/// Unified error type for the CipherTalk core
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("cipher key {key} outside allowed range [{min},{max}]")]
    InvalidCipherKey { key: u8, min: u8, max: u8 },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed wire frame: {0}")]
    MalformedFrame(String),
}

pub type Result<T> = core::result::Result<T, CoreError>;
