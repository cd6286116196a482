//! Core data types for the focus timer.
//!
//! This module defines the data structures used for:
//! - Timer state (the single mutable countdown record)
//! - Immutable snapshots handed to observers
//! - Events pushed to attached display surfaces
//! - IPC request/response serialization

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};
use uuid::Uuid;

// ============================================================================
// TimerPhase
// ============================================================================

/// Lifecycle phase of the timer, derived from the state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    /// No session exists
    #[default]
    Idle,
    /// Counting down
    Active,
    /// Countdown frozen
    Paused,
    /// Countdown reached zero
    Finished,
}

impl TimerPhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerPhase::Idle => "idle",
            TimerPhase::Active => "active",
            TimerPhase::Paused => "paused",
            TimerPhase::Finished => "finished",
        }
    }

    /// Returns true if a session exists in this phase.
    pub fn has_session(&self) -> bool {
        !matches!(self, TimerPhase::Idle)
    }
}

impl std::fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TimerState
// ============================================================================

/// The single source of truth for countdown progress.
///
/// Only the timer controller holds a mutable instance. Everything else sees
/// [`TimerSnapshot`] copies.
#[derive(Debug, Clone)]
pub struct TimerState {
    /// Identifier of this session, fresh on every start
    pub session_id: Uuid,
    /// Task the session is attached to
    pub task_id: String,
    /// Task label captured at start
    pub task_title: String,
    /// Total duration fixed at start
    pub original_seconds: u32,
    /// Seconds left in the countdown
    pub remaining_seconds: u32,
    /// Counting down
    pub is_active: bool,
    /// Frozen by pause
    pub is_paused: bool,
    /// Wall-clock time of the last start/restart
    pub started_at: DateTime<Utc>,
    /// Monotonic stamp elapsed time is measured from
    last_tick_at: Instant,
}

impl TimerState {
    /// Creates a new active session.
    pub fn new(
        task_id: impl Into<String>,
        task_title: impl Into<String>,
        duration_seconds: u32,
        now: Instant,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            task_id: task_id.into(),
            task_title: task_title.into(),
            original_seconds: duration_seconds,
            remaining_seconds: duration_seconds,
            is_active: true,
            is_paused: false,
            started_at: Utc::now(),
            last_tick_at: now,
        }
    }

    /// Returns the phase implied by the flags.
    pub fn phase(&self) -> TimerPhase {
        if self.is_active {
            TimerPhase::Active
        } else if self.is_paused {
            TimerPhase::Paused
        } else {
            TimerPhase::Finished
        }
    }

    /// Freezes the countdown.
    ///
    /// Only works if the timer is currently active.
    pub fn pause(&mut self) {
        if self.is_active {
            self.is_active = false;
            self.is_paused = true;
        }
    }

    /// Unfreezes the countdown, measuring elapsed time from `now` onward.
    ///
    /// Only works if the timer is currently paused.
    pub fn resume(&mut self, now: Instant) {
        if self.is_paused {
            self.is_paused = false;
            self.is_active = true;
            self.last_tick_at = now;
        }
    }

    /// Resets the countdown to its original duration and reactivates it.
    pub fn restart(&mut self, now: Instant) {
        self.remaining_seconds = self.original_seconds;
        self.is_active = true;
        self.is_paused = false;
        self.started_at = Utc::now();
        self.last_tick_at = now;
    }

    /// Charges the whole seconds elapsed since the last tick.
    ///
    /// Returns the number of seconds subtracted. The sub-second remainder is
    /// kept for the next call, so late ticks catch up and early ones charge
    /// nothing. Deactivates the timer when the countdown reaches zero.
    pub fn advance(&mut self, now: Instant) -> u32 {
        if !self.is_active {
            return 0;
        }

        let elapsed = now.saturating_duration_since(self.last_tick_at).as_secs();
        if elapsed == 0 {
            return 0;
        }

        self.last_tick_at += Duration::from_secs(elapsed);

        let charged = u32::try_from(elapsed)
            .unwrap_or(u32::MAX)
            .min(self.remaining_seconds);
        self.remaining_seconds -= charged;

        if self.remaining_seconds == 0 {
            self.is_active = false;
        }

        charged
    }

    /// Returns the monotonic stamp of the last charged tick.
    pub fn last_tick_at(&self) -> Instant {
        self.last_tick_at
    }

    /// Returns true if the countdown has run out.
    pub fn is_finished(&self) -> bool {
        self.phase() == TimerPhase::Finished
    }

    /// Returns an immutable copy for observers.
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase(),
            session_id: Some(self.session_id),
            task_id: Some(self.task_id.clone()),
            task_title: Some(self.task_title.clone()),
            original_seconds: self.original_seconds,
            remaining_seconds: self.remaining_seconds,
            is_active: self.is_active,
            is_paused: self.is_paused,
            started_at: Some(self.started_at),
        }
    }
}

// ============================================================================
// TimerSnapshot
// ============================================================================

/// Immutable copy of the timer state at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    /// Derived lifecycle phase
    pub phase: TimerPhase,
    /// Session identifier (absent when idle)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    /// Task identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Task label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_title: Option<String>,
    /// Total duration
    pub original_seconds: u32,
    /// Seconds left
    pub remaining_seconds: u32,
    /// Counting down
    pub is_active: bool,
    /// Frozen by pause
    pub is_paused: bool,
    /// Wall-clock time of the last start/restart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl TimerSnapshot {
    /// Snapshot reported when no session exists.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Returns true if no session exists.
    pub fn is_idle(&self) -> bool {
        self.phase == TimerPhase::Idle
    }
}

// ============================================================================
// TimerEvent
// ============================================================================

/// Notifications pushed to attached observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimerEvent {
    /// Full state push after a tick or an accepted command
    StateChanged {
        /// Current state
        snapshot: TimerSnapshot,
    },
    /// Countdown reached zero
    Finished,
    /// Session was closed; observers must re-query before trusting new state
    SessionEnded {
        /// The session that ended
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
}

// ============================================================================
// IPC Types
// ============================================================================

/// Parameters for the start command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartParams {
    /// Task identifier
    pub task_id: String,
    /// Task label
    pub task_title: String,
    /// Session length; must be positive
    pub duration_seconds: i64,
}

impl StartParams {
    /// Creates start parameters.
    pub fn new(
        task_id: impl Into<String>,
        task_title: impl Into<String>,
        duration_seconds: i64,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            task_title: task_title.into(),
            duration_seconds,
        }
    }
}

/// IPC request from client to daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum IpcRequest {
    /// Start a new focus session
    Start {
        /// Start parameters
        #[serde(flatten)]
        params: StartParams,
    },
    /// Pause the running countdown
    Pause,
    /// Resume the paused countdown
    Resume,
    /// Reset the countdown to its original duration
    Restart,
    /// Tear down the session
    Close,
    /// Query the current snapshot
    Status,
    /// Hand a drag gesture to the display surface
    Drag,
    /// Attach this connection as an observer
    Subscribe,
    /// Detach this connection
    Unsubscribe,
}

impl IpcRequest {
    /// Returns the command name used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            IpcRequest::Start { .. } => "start",
            IpcRequest::Pause => "pause",
            IpcRequest::Resume => "resume",
            IpcRequest::Restart => "restart",
            IpcRequest::Close => "close",
            IpcRequest::Status => "status",
            IpcRequest::Drag => "drag",
            IpcRequest::Subscribe => "subscribe",
            IpcRequest::Unsubscribe => "unsubscribe",
        }
    }
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Machine-readable error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Snapshot after the command was applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TimerSnapshot>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<TimerSnapshot>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            code: None,
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            code: None,
            data: None,
        }
    }

    /// Creates an error response carrying a machine-readable code.
    pub fn error_with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::error(message)
        }
    }

    /// Returns true for success responses.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Any line written by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum DaemonMessage {
    /// Reply to a request on this connection
    Response(IpcResponse),
    /// Pushed event for subscribed connections
    Event(TimerEvent),
}

/// Serializes a message as a single JSON line (with trailing newline).
pub fn encode_line<T: Serialize>(msg: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    Ok(line)
}

/// Deserializes one JSON line. Returns `Ok(None)` for blank lines.
pub fn decode_line<T: serde::de::DeserializeOwned>(line: &str) -> serde_json::Result<Option<T>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some)
}

// ============================================================================
// Tests
// ============================================================================
