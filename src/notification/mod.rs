//! Desktop notification when a focus session finishes.
//!
//! This module provides:
//! - The `CompletionNotifier` seam used by the command gateway
//! - `DesktopNotifier`, backed by `notify-rust`
//! - `NullNotifier` for daemons with notifications turned off
//! - `MockNotifier` for tests
//!
//! Sending never blocks the timer: the desktop notifier hands each
//! notification to a short-lived thread.

pub mod error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use notify_rust::Notification;
use tracing::{debug, warn};

pub use self::error::NotificationError;

/// Maximum length for task titles in notifications.
const MAX_TASK_TITLE_LENGTH: usize = 100;

/// Notification summary shown when a countdown reaches zero.
pub const FINISHED_SUMMARY: &str = "Timer Completed!";

// ============================================================================
// NotificationContent
// ============================================================================

/// Text of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    /// Summary line
    pub summary: String,
    /// Body text
    pub body: String,
}

impl NotificationContent {
    /// Content for a finished countdown.
    ///
    /// Long titles are cut to `MAX_TASK_TITLE_LENGTH` characters.
    #[must_use]
    pub fn finished(task_title: &str) -> Self {
        Self {
            summary: FINISHED_SUMMARY.to_string(),
            body: format!("Time's up for: {}", truncate_title(task_title)),
        }
    }
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() <= MAX_TASK_TITLE_LENGTH {
        return title.to_string();
    }
    let mut cut: String = title.chars().take(MAX_TASK_TITLE_LENGTH - 1).collect();
    cut.push('…');
    cut
}

// ============================================================================
// CompletionNotifier
// ============================================================================

/// Tells the user that a countdown has finished.
///
/// Implementations must not block the caller.
pub trait CompletionNotifier: Send + Sync {
    /// Notifies that the session for `task_title` reached zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification could not be dispatched.
    fn notify_finished(&self, task_title: &str) -> Result<(), NotificationError>;
}

// ============================================================================
// DesktopNotifier
// ============================================================================

/// Sends desktop notifications through the platform notification service.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    /// Creates a notifier that reports under `app_name`.
    #[must_use]
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new("focus-timer")
    }
}

impl CompletionNotifier for DesktopNotifier {
    fn notify_finished(&self, task_title: &str) -> Result<(), NotificationError> {
        let content = NotificationContent::finished(task_title);
        let app_name = self.app_name.clone();

        thread::Builder::new()
            .name("notification".to_string())
            .spawn(move || {
                let result = Notification::new()
                    .summary(&content.summary)
                    .body(&content.body)
                    .appname(&app_name)
                    .icon("alarm-clock")
                    .show();
                match result {
                    Ok(_) => debug!("completion notification shown"),
                    Err(e) => {
                        let err = NotificationError::SendFailed(e.to_string());
                        warn!(error = %err, suggestion = err.suggestion(), "notification failed");
                    }
                }
            })
            .map(|_| ())
            .map_err(|e| NotificationError::SendFailed(e.to_string()))
    }
}

// ============================================================================
// NullNotifier
// ============================================================================

/// Notifier for daemons with notifications disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl CompletionNotifier for NullNotifier {
    fn notify_finished(&self, _task_title: &str) -> Result<(), NotificationError> {
        Ok(())
    }
}

// ============================================================================
// MockNotifier
// ============================================================================

/// Mock notifier for testing.
#[derive(Debug, Default)]
pub struct MockNotifier {
    /// Task titles notified so far
    notifications: Mutex<Vec<String>>,
    /// Whether calls should return an error
    should_fail: AtomicBool,
}

impl MockNotifier {
    /// Creates a new mock notifier that succeeds on every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether subsequent calls should fail.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Returns the task titles notified so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Returns the number of notifications sent.
    #[must_use]
    pub fn notification_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl CompletionNotifier for MockNotifier {
    fn notify_finished(&self, task_title: &str) -> Result<(), NotificationError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(NotificationError::SendFailed("Mock failure".to_string()));
        }
        self.lock().push(task_title.to_string());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
