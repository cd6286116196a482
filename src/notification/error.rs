//! Notification error types.

use thiserror::Error;

/// Errors that can occur when sending a completion notification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// The notification could not be handed to the desktop.
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
}

impl NotificationError {
    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::SendFailed(_) => {
                "check that a notification daemon is running, or set notification.enabled = false"
            }
        }
    }
}
