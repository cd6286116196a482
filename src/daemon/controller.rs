//! Timer controller for the focus timer.
//!
//! This module owns the single [`TimerState`] and provides:
//! - Session lifecycle (start, pause, resume, restart, close)
//! - The deadline-driven clock that schedules ticks
//! - Elapsed-time accounting from monotonic timestamps
//! - Snapshot publication through the [`EventBroadcaster`]
//!
//! Precondition checks live in the gateway. The controller only refuses
//! operations that are impossible without a session.

use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use crate::types::{TimerPhase, TimerSnapshot, TimerState};

use super::broadcast::EventBroadcaster;
use super::error::TimerError;

/// Tick period.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

// ============================================================================
// TickOutcome
// ============================================================================

/// Result of a single clock tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Clock was not armed or the timer was not counting down.
    Skipped,
    /// Countdown moved (or a sub-second tick charged nothing).
    Advanced {
        /// Whole seconds charged by this tick
        charged: u32,
        /// Seconds left afterwards
        remaining: u32,
    },
    /// Countdown reached zero on this tick.
    Finished {
        /// Final state
        snapshot: TimerSnapshot,
    },
}

// ============================================================================
// TimerController
// ============================================================================

/// Owns the timer state and its clock.
pub struct TimerController {
    /// Current session, `None` when idle
    state: Option<TimerState>,
    /// Next tick deadline, `None` when the clock is cancelled
    deadline: Option<Instant>,
    /// Observer fan-out
    broadcaster: EventBroadcaster,
}

impl TimerController {
    /// Creates an idle controller publishing through `broadcaster`.
    pub fn new(broadcaster: EventBroadcaster) -> Self {
        Self {
            state: None,
            deadline: None,
            broadcaster,
        }
    }

    /// Starts a new session, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidArgument`] for a zero duration.
    pub fn start(
        &mut self,
        task_id: impl Into<String>,
        task_title: impl Into<String>,
        duration_seconds: u32,
        now: Instant,
    ) -> Result<TimerSnapshot, TimerError> {
        if duration_seconds == 0 {
            return Err(TimerError::InvalidArgument(
                "duration must be positive".to_string(),
            ));
        }

        if let Some(previous) = self.state.take() {
            debug!(session = %previous.session_id, "replacing existing session");
        }

        let state = TimerState::new(task_id, task_title, duration_seconds, now);
        info!(
            session = %state.session_id,
            task = %state.task_title,
            seconds = duration_seconds,
            "focus session started"
        );

        self.state = Some(state);
        self.deadline = Some(now + TICK_PERIOD);
        Ok(self.publish())
    }

    /// Freezes the countdown.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::NoActiveSession`] when idle.
    pub fn pause(&mut self) -> Result<TimerSnapshot, TimerError> {
        let state = self.state.as_mut().ok_or(TimerError::NoActiveSession)?;
        state.pause();
        self.deadline = None;

        info!(remaining = state.remaining_seconds, "focus session paused");
        Ok(self.publish())
    }

    /// Unfreezes the countdown. Time spent paused is not charged.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::NoActiveSession`] when idle.
    pub fn resume(&mut self, now: Instant) -> Result<TimerSnapshot, TimerError> {
        let state = self.state.as_mut().ok_or(TimerError::NoActiveSession)?;
        state.resume(now);
        if state.is_active {
            self.deadline = Some(now + TICK_PERIOD);
        }

        info!(remaining = state.remaining_seconds, "focus session resumed");
        Ok(self.publish())
    }

    /// Resets the countdown to its original duration and reactivates it.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::NoActiveSession`] when idle.
    pub fn restart(&mut self, now: Instant) -> Result<TimerSnapshot, TimerError> {
        let state = self.state.as_mut().ok_or(TimerError::NoActiveSession)?;
        state.restart(now);
        self.deadline = Some(now + TICK_PERIOD);

        info!(seconds = state.original_seconds, "focus session restarted");
        Ok(self.publish())
    }

    /// Tears down the session and cancels the clock.
    ///
    /// Observers receive `session_ended` followed by the idle snapshot.
    pub fn close(&mut self) -> TimerSnapshot {
        self.deadline = None;

        if let Some(state) = self.state.take() {
            info!(session = %state.session_id, "focus session closed");
            self.broadcaster.end_session(state.session_id);
        }

        self.publish()
    }

    /// Applies one clock tick at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::NoActiveSession`] if the clock is armed without
    /// a session. Callers treat this as fatal to the session.
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome, TimerError> {
        if self.deadline.is_none() {
            return Ok(TickOutcome::Skipped);
        }

        let state = self.state.as_mut().ok_or(TimerError::NoActiveSession)?;

        if !state.is_active {
            self.deadline = None;
            return Ok(TickOutcome::Skipped);
        }

        let charged = state.advance(now);

        if state.is_finished() {
            self.deadline = None;
            info!(task = %state.task_title, "focus session finished");
            let snapshot = self.publish();
            self.broadcaster.publish_finished();
            return Ok(TickOutcome::Finished { snapshot });
        }

        let remaining = state.remaining_seconds;
        self.deadline = Some(state.last_tick_at() + TICK_PERIOD);

        if charged > 0 {
            debug!(charged, remaining, "tick");
            self.publish();
        }

        Ok(TickOutcome::Advanced { charged, remaining })
    }

    /// Returns the next tick deadline, if the clock is armed.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the current phase.
    pub fn phase(&self) -> TimerPhase {
        self.state
            .as_ref()
            .map_or(TimerPhase::Idle, TimerState::phase)
    }

    /// Returns the current snapshot (the idle snapshot without a session).
    pub fn snapshot(&self) -> TimerSnapshot {
        self.state
            .as_ref()
            .map_or_else(TimerSnapshot::idle, TimerState::snapshot)
    }

    /// Returns the current state, if a session exists.
    pub fn state(&self) -> Option<&TimerState> {
        self.state.as_ref()
    }

    /// Returns the broadcaster observers attach to.
    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    /// Arms the clock without touching the state (for testing).
    #[cfg(test)]
    pub(crate) fn force_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    fn publish(&self) -> TimerSnapshot {
        let snapshot = self.snapshot();
        self.broadcaster.publish(snapshot.clone());
        snapshot
    }
}

// ============================================================================
// Tests
// ============================================================================
