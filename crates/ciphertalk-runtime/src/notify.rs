//! Notification dispatch
//!
//! The platform scheduler (APNs/FCM plumbing) sits behind the
//! [`NotificationSink`] trait and returns nothing observable. What this
//! module owns is the settings gate: user preferences are read before every
//! dispatch — a disabled master switch suppresses the call entirely, and a
//! disabled message preview swaps the body for a generic placeholder.

use tracing::debug;
use uuid::Uuid;

use ciphertalk_core::NotificationSettings;

/// Body shown when message previews are disabled
const GENERIC_BODY: &str = "New message";

// ----------------------------------------------------------------------------
// Notification Types
// ----------------------------------------------------------------------------

/// What kind of event the notification announces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// An inbound chat message
    Message,
    /// A phone-book contact registered an account
    ContactRegistered,
}

/// Routing metadata handed to the platform scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMetadata {
    pub conversation_id: String,
    pub sender_id: String,
    pub message_id: Option<Uuid>,
    pub kind: NotificationKind,
}

/// A fully assembled notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub metadata: NotificationMetadata,
}

// ----------------------------------------------------------------------------
// Sink and Dispatcher
// ----------------------------------------------------------------------------

/// Platform notification scheduler
pub trait NotificationSink: Send + Sync {
    /// Hand a notification to the platform; nothing observable comes back
    fn dispatch(&self, notification: Notification);
}

/// Applies user settings before handing notifications to the sink
pub struct NotificationDispatcher<S: NotificationSink> {
    sink: S,
}

impl<S: NotificationSink> NotificationDispatcher<S> {
    /// Create a dispatcher around a platform sink
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Dispatch a notification, honoring the current settings.
    ///
    /// Settings are read per call, so a toggle flipped between two messages
    /// takes effect immediately.
    pub fn notify(
        &self,
        settings: &NotificationSettings,
        title: &str,
        body: &str,
        metadata: NotificationMetadata,
    ) {
        if !settings.enabled {
            debug!(kind = ?metadata.kind, "notifications disabled; suppressing dispatch");
            return;
        }

        let body = if settings.message_preview {
            body.to_string()
        } else {
            GENERIC_BODY.to_string()
        };

        self.sink.dispatch(Notification {
            title: title.to_string(),
            body,
            metadata,
        });
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
