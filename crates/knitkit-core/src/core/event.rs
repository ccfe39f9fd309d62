//! Event system for session notifications
//!
//! Provides:
//! - Event types for state changes, progress and device indications
//! - Event dispatcher publishing events to any number of observers
//!
//! Events flow one way, from the session to its observers; nothing in the
//! core waits on an observer.

use crate::data::{DeviceStatus, ProgressSnapshot, SessionState};
use tokio::sync::broadcast;

/// Session event types
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Session state changed
    StateChanged(SessionState),
    /// A line was served and progress moved
    Progress(ProgressSnapshot),
    /// Firmware status indication
    DeviceStatus(DeviceStatus),
    /// Firmware answered an info request
    DeviceInfo {
        /// API version reported by the firmware.
        api_version: u8,
    },
    /// Firmware answered a test request
    TestResult(u8),
    /// The last line was sent
    Finished,
    /// The session failed
    Failed(String),
    /// The session was stopped by the caller
    Cancelled,
}

impl SessionEvent {
    /// Check whether this event ends a session
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed(_) | Self::Cancelled)
    }
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::StateChanged(state) => write!(f, "State: {}", state),
            SessionEvent::Progress(progress) => write!(f, "Progress: {}", progress),
            SessionEvent::DeviceStatus(status) => write!(
                f,
                "Device: ready={} {} at {} (hall {}/{})",
                status.ready,
                status.carriage,
                status.carriage_position,
                status.hall_left,
                status.hall_right
            ),
            SessionEvent::DeviceInfo { api_version } => write!(f, "Firmware API v{}", api_version),
            SessionEvent::TestResult(result) => write!(f, "Test result: {}", result),
            SessionEvent::Finished => write!(f, "Finished successfully"),
            SessionEvent::Failed(reason) => write!(f, "Failed: {}", reason),
            SessionEvent::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Event dispatcher for publishing events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for session events.
    tx: broadcast::Sender<SessionEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 256)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers that received it; publishing with
    /// nobody listening is not an error.
    pub fn publish(&self, event: SessionEvent) -> usize {
        tracing::trace!("Publishing {}", event);
        self.tx.send(event).unwrap_or(0)
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(256)
    }
}
