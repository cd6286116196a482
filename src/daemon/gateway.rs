//! Command gateway.
//!
//! The only path that mutates the timer. Each command is checked against the
//! current phase before it reaches the controller, and the display surface is
//! driven alongside the state change.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::notification::{CompletionNotifier, NullNotifier};
use crate::surface::{DisplaySurface, SurfaceError};
use crate::types::{StartParams, TimerPhase, TimerSnapshot};

use super::controller::{TickOutcome, TimerController};
use super::error::TimerError;

// ============================================================================
// TimerCommand
// ============================================================================

/// Commands accepted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCommand {
    /// Begin a new session, replacing any existing one
    Start {
        /// Task identifier
        task_id: String,
        /// Task label
        task_title: String,
        /// Requested length; validated before use
        duration_seconds: i64,
    },
    /// Freeze the countdown
    Pause,
    /// Unfreeze the countdown
    Resume,
    /// Reset to the original duration
    Restart,
    /// Tear down the session
    Close,
    /// Read the current snapshot
    GetState,
    /// Hand a drag gesture to the surface
    BeginSurfaceDrag,
}

impl TimerCommand {
    /// Returns the command name used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            TimerCommand::Start { .. } => "start",
            TimerCommand::Pause => "pause",
            TimerCommand::Resume => "resume",
            TimerCommand::Restart => "restart",
            TimerCommand::Close => "close",
            TimerCommand::GetState => "get_state",
            TimerCommand::BeginSurfaceDrag => "begin_surface_drag",
        }
    }
}

impl From<StartParams> for TimerCommand {
    fn from(params: StartParams) -> Self {
        TimerCommand::Start {
            task_id: params.task_id,
            task_title: params.task_title,
            duration_seconds: params.duration_seconds,
        }
    }
}

/// Checks whether `command` may run while the timer is in `phase`.
///
/// # Errors
///
/// Returns [`TimerError::NoActiveSession`] when the command needs a session
/// and there is none, or [`TimerError::InvalidTransition`] when the phase
/// does not permit it.
pub fn check_precondition(command: &TimerCommand, phase: TimerPhase) -> Result<(), TimerError> {
    let allowed = match command {
        TimerCommand::Start { .. }
        | TimerCommand::Close
        | TimerCommand::GetState
        | TimerCommand::BeginSurfaceDrag => return Ok(()),
        TimerCommand::Pause => phase == TimerPhase::Active,
        TimerCommand::Resume => phase == TimerPhase::Paused,
        TimerCommand::Restart => phase.has_session(),
    };

    if allowed {
        Ok(())
    } else if !phase.has_session() {
        Err(TimerError::NoActiveSession)
    } else {
        Err(TimerError::InvalidTransition {
            command: command.name(),
            phase,
        })
    }
}

// ============================================================================
// CommandGateway
// ============================================================================

/// Validates commands and forwards them to the controller.
pub struct CommandGateway {
    /// Timer state owner
    controller: TimerController,
    /// Presentation surface
    surface: Arc<dyn DisplaySurface>,
    /// Longest accepted session
    max_duration_seconds: u32,
    /// Close the surface when the countdown ends
    close_surface_on_finish: bool,
    /// Completion notice sender
    notifier: Arc<dyn CompletionNotifier>,
}

impl CommandGateway {
    /// Creates a gateway.
    pub fn new(
        controller: TimerController,
        surface: Arc<dyn DisplaySurface>,
        max_duration_seconds: u32,
    ) -> Self {
        Self {
            controller,
            surface,
            max_duration_seconds,
            close_surface_on_finish: true,
            notifier: Arc::new(NullNotifier),
        }
    }

    /// Sets the notifier told when a countdown finishes.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn CompletionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Sets whether the surface closes when the countdown finishes.
    #[must_use]
    pub fn with_close_surface_on_finish(mut self, close: bool) -> Self {
        self.close_surface_on_finish = close;
        self
    }

    /// Executes a command at `now`.
    ///
    /// On success returns the snapshot after the command was applied. On
    /// error the state is untouched.
    ///
    /// # Errors
    ///
    /// See [`check_precondition`]. `Start` also fails with
    /// [`TimerError::InvalidArgument`] for an out-of-range duration, and
    /// `BeginSurfaceDrag` with [`TimerError::SurfaceUnavailable`].
    pub fn execute(
        &mut self,
        command: TimerCommand,
        now: Instant,
    ) -> Result<TimerSnapshot, TimerError> {
        check_precondition(&command, self.controller.phase())?;

        match command {
            TimerCommand::Start {
                task_id,
                task_title,
                duration_seconds,
            } => {
                let duration = self.validate_duration(duration_seconds)?;
                let snapshot = self.controller.start(task_id, task_title, duration, now)?;
                self.notify_surface("open", |surface| surface.open());
                Ok(snapshot)
            }
            TimerCommand::Pause => self.controller.pause(),
            TimerCommand::Resume => {
                let snapshot = self.controller.resume(now)?;
                self.notify_surface("focus", |surface| surface.focus());
                Ok(snapshot)
            }
            TimerCommand::Restart => {
                let snapshot = self.controller.restart(now)?;
                self.notify_surface("focus", |surface| surface.focus());
                Ok(snapshot)
            }
            TimerCommand::Close => {
                let snapshot = self.controller.close();
                self.notify_surface("close", |surface| surface.close());
                Ok(snapshot)
            }
            TimerCommand::GetState => Ok(self.controller.snapshot()),
            TimerCommand::BeginSurfaceDrag => {
                self.surface.begin_move()?;
                Ok(self.controller.snapshot())
            }
        }
    }

    /// Applies a clock tick at `now`.
    ///
    /// A fault inside the tick closes the session; it is never retried.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        match self.controller.tick(now) {
            Ok(TickOutcome::Finished { snapshot }) => {
                let title = snapshot.task_title.as_deref().unwrap_or("(untitled)");
                info!("Time's up for: {}", title);
                if let Err(e) = self.notifier.notify_finished(title) {
                    warn!(
                        error = %e,
                        suggestion = e.suggestion(),
                        "completion notification failed; timer continues"
                    );
                }
                if self.close_surface_on_finish {
                    self.notify_surface("close", |surface| surface.close());
                }
                TickOutcome::Finished { snapshot }
            }
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "timer tick failed, closing session");
                self.controller.close();
                self.notify_surface("close", |surface| surface.close());
                TickOutcome::Skipped
            }
        }
    }

    /// Returns the next tick deadline, if the clock is armed.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.controller.next_deadline()
    }

    /// Returns the current snapshot.
    pub fn state(&self) -> TimerSnapshot {
        self.controller.snapshot()
    }

    /// Returns the controller (for testing).
    #[cfg(test)]
    pub(crate) fn controller_mut(&mut self) -> &mut TimerController {
        &mut self.controller
    }

    fn validate_duration(&self, duration_seconds: i64) -> Result<u32, TimerError> {
        if duration_seconds <= 0 {
            return Err(TimerError::InvalidArgument(format!(
                "duration must be positive, got {duration_seconds}"
            )));
        }

        u32::try_from(duration_seconds)
            .ok()
            .filter(|seconds| *seconds <= self.max_duration_seconds)
            .ok_or_else(|| {
                TimerError::InvalidArgument(format!(
                    "duration must not exceed {} seconds, got {duration_seconds}",
                    self.max_duration_seconds
                ))
            })
    }

    fn notify_surface<F>(&self, operation: &'static str, call: F)
    where
        F: FnOnce(&dyn DisplaySurface) -> Result<(), SurfaceError>,
    {
        if let Err(e) = call(self.surface.as_ref()) {
            warn!(
                operation,
                error = %e,
                suggestion = e.suggestion(),
                "display surface call failed; timer continues"
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::broadcast::EventBroadcaster;
    use crate::surface::{MockDisplaySurface, SurfaceRequest};
    use tokio::time::Duration;

    fn create_gateway() -> (CommandGateway, Arc<MockDisplaySurface>) {
        let surface = Arc::new(MockDisplaySurface::new());
        let controller = TimerController::new(EventBroadcaster::new(16));
        let gateway = CommandGateway::new(controller, surface.clone(), 3600);
        (gateway, surface)
    }

    fn start(seconds: i64) -> TimerCommand {
        TimerCommand::Start {
            task_id: "t1".to_string(),
            task_title: "Write report".to_string(),
            duration_seconds: seconds,
        }
    }

    // ------------------------------------------------------------------------
    // Precondition Tests
    // ------------------------------------------------------------------------

    mod precondition_tests {
        use super::*;

        #[test]
        fn test_always_allowed_commands() {
            for phase in [
                TimerPhase::Idle,
                TimerPhase::Active,
                TimerPhase::Paused,
                TimerPhase::Finished,
            ] {
                for command in [
                    start(60),
                    TimerCommand::Close,
                    TimerCommand::GetState,
                    TimerCommand::BeginSurfaceDrag,
                ] {
                    assert!(check_precondition(&command, phase).is_ok());
                }
            }
        }

        #[test]
        fn test_idle_rejects_session_commands() {
            for command in [TimerCommand::Pause, TimerCommand::Resume, TimerCommand::Restart] {
                assert_eq!(
                    check_precondition(&command, TimerPhase::Idle),
                    Err(TimerError::NoActiveSession)
                );
            }
        }

        #[test]
        fn test_pause_only_from_active() {
            assert!(check_precondition(&TimerCommand::Pause, TimerPhase::Active).is_ok());
            for phase in [TimerPhase::Paused, TimerPhase::Finished] {
                let err = check_precondition(&TimerCommand::Pause, phase).unwrap_err();
                assert_eq!(
                    err,
                    TimerError::InvalidTransition {
                        command: "pause",
                        phase
                    }
                );
            }
        }

        #[test]
        fn test_resume_only_from_paused() {
            assert!(check_precondition(&TimerCommand::Resume, TimerPhase::Paused).is_ok());
            for phase in [TimerPhase::Active, TimerPhase::Finished] {
                assert!(check_precondition(&TimerCommand::Resume, phase)
                    .unwrap_err()
                    .is_invalid_transition());
            }
        }

        #[test]
        fn test_restart_from_any_session_phase() {
            for phase in [TimerPhase::Active, TimerPhase::Paused, TimerPhase::Finished] {
                assert!(check_precondition(&TimerCommand::Restart, phase).is_ok());
            }
        }
    }

    // ------------------------------------------------------------------------
    // Execute Tests
    // ------------------------------------------------------------------------

    mod execute_tests {
        use super::*;

        #[test]
        fn test_start_opens_surface() {
            let (mut gateway, surface) = create_gateway();

            let snapshot = gateway.execute(start(1500), Instant::now()).unwrap();

            assert_eq!(snapshot.phase, TimerPhase::Active);
            assert_eq!(snapshot.remaining_seconds, 1500);
            assert_eq!(surface.calls(), vec![SurfaceRequest::Open]);
        }

        #[test]
        fn test_start_invalid_durations() {
            let (mut gateway, surface) = create_gateway();
            let now = Instant::now();

            for seconds in [0, -5, 3601, i64::MAX] {
                let err = gateway.execute(start(seconds), now).unwrap_err();
                assert!(matches!(err, TimerError::InvalidArgument(_)), "{seconds}");
            }

            assert!(gateway.state().is_idle());
            assert!(surface.calls().is_empty());
        }

        #[test]
        fn test_start_at_maximum_duration() {
            let (mut gateway, _surface) = create_gateway();
            let snapshot = gateway.execute(start(3600), Instant::now()).unwrap();
            assert_eq!(snapshot.original_seconds, 3600);
        }

        #[test]
        fn test_double_pause_leaves_state_unchanged() {
            let (mut gateway, _surface) = create_gateway();
            let now = Instant::now();
            gateway.execute(start(60), now).unwrap();
            let paused = gateway.execute(TimerCommand::Pause, now).unwrap();

            let err = gateway.execute(TimerCommand::Pause, now).unwrap_err();

            assert!(err.is_invalid_transition());
            assert_eq!(gateway.state(), paused);
        }

        #[test]
        fn test_resume_and_restart_focus_surface() {
            let (mut gateway, surface) = create_gateway();
            let now = Instant::now();
            gateway.execute(start(60), now).unwrap();
            gateway.execute(TimerCommand::Pause, now).unwrap();
            gateway.execute(TimerCommand::Resume, now).unwrap();
            gateway.execute(TimerCommand::Restart, now).unwrap();

            assert_eq!(surface.call_count(SurfaceRequest::Focus), 2);
        }

        #[test]
        fn test_close_closes_surface_and_returns_idle() {
            let (mut gateway, surface) = create_gateway();
            let now = Instant::now();
            gateway.execute(start(60), now).unwrap();

            let snapshot = gateway.execute(TimerCommand::Close, now).unwrap();

            assert!(snapshot.is_idle());
            assert_eq!(surface.call_count(SurfaceRequest::Close), 1);
            assert!(gateway.next_deadline().is_none());
        }

        #[test]
        fn test_get_state_while_idle() {
            let (mut gateway, _surface) = create_gateway();
            let snapshot = gateway
                .execute(TimerCommand::GetState, Instant::now())
                .unwrap();
            assert_eq!(snapshot, TimerSnapshot::idle());
        }

        #[test]
        fn test_surface_failure_does_not_fail_commands() {
            let (mut gateway, surface) = create_gateway();
            surface.set_should_fail(true);
            let now = Instant::now();

            assert!(gateway.execute(start(60), now).is_ok());
            assert!(gateway.execute(TimerCommand::Pause, now).is_ok());
            assert!(gateway.execute(TimerCommand::Resume, now).is_ok());
            assert!(gateway.execute(TimerCommand::Close, now).is_ok());
            assert_eq!(surface.calls().len(), 3);
        }

        #[test]
        fn test_drag_reports_surface_failure() {
            let (mut gateway, surface) = create_gateway();
            let now = Instant::now();

            assert!(gateway.execute(TimerCommand::BeginSurfaceDrag, now).is_ok());

            surface.set_should_fail(true);
            let err = gateway
                .execute(TimerCommand::BeginSurfaceDrag, now)
                .unwrap_err();
            assert_eq!(err.code(), "surface_unavailable");
            assert_eq!(surface.call_count(SurfaceRequest::BeginMove), 2);
        }

        #[test]
        fn test_start_params_conversion() {
            let command = TimerCommand::from(StartParams::new("t9", "Review", 300));
            assert_eq!(command.name(), "start");
            assert_eq!(
                command,
                TimerCommand::Start {
                    task_id: "t9".into(),
                    task_title: "Review".into(),
                    duration_seconds: 300
                }
            );
        }
    }

    // ------------------------------------------------------------------------
    // Tick Tests
    // ------------------------------------------------------------------------

    mod tick_tests {
        use super::*;

        #[test]
        fn test_finish_closes_surface() {
            let (mut gateway, surface) = create_gateway();
            let t0 = Instant::now();
            gateway.execute(start(1), t0).unwrap();

            let outcome = gateway.tick(t0 + Duration::from_secs(1));

            assert!(matches!(outcome, TickOutcome::Finished { .. }));
            assert_eq!(
                surface.calls(),
                vec![SurfaceRequest::Open, SurfaceRequest::Close]
            );
        }

        #[test]
        fn test_finish_keeps_surface_when_configured() {
            let (gateway, surface) = create_gateway();
            let mut gateway = gateway.with_close_surface_on_finish(false);
            let t0 = Instant::now();
            gateway.execute(start(1), t0).unwrap();

            gateway.tick(t0 + Duration::from_secs(1));

            assert_eq!(surface.call_count(SurfaceRequest::Close), 0);
            assert_eq!(gateway.state().phase, TimerPhase::Finished);
        }

        #[test]
        fn test_tick_fault_closes_session() {
            let (mut gateway, surface) = create_gateway();
            let t0 = Instant::now();
            gateway.controller_mut().force_deadline(Some(t0));

            assert_eq!(gateway.tick(t0), TickOutcome::Skipped);
            assert!(gateway.next_deadline().is_none());
            assert_eq!(surface.call_count(SurfaceRequest::Close), 1);
        }

        #[test]
        fn test_paused_then_finished_session_rejects_resume() {
            let (mut gateway, _surface) = create_gateway();
            let t0 = Instant::now();
            gateway.execute(start(1), t0).unwrap();
            gateway.tick(t0 + Duration::from_secs(1));

            let err = gateway
                .execute(TimerCommand::Resume, t0 + Duration::from_secs(2))
                .unwrap_err();
            assert!(err.is_invalid_transition());

            let snapshot = gateway
                .execute(TimerCommand::Restart, t0 + Duration::from_secs(2))
                .unwrap();
            assert_eq!(snapshot.phase, TimerPhase::Active);
            assert_eq!(snapshot.remaining_seconds, 1);
        }
    }

    // ------------------------------------------------------------------------
    // Notification Tests
    // ------------------------------------------------------------------------

    mod notification_tests {
        use super::*;
        use crate::notification::MockNotifier;

        fn create_notifying_gateway() -> (CommandGateway, Arc<MockNotifier>) {
            let (gateway, _surface) = create_gateway();
            let notifier = Arc::new(MockNotifier::new());
            (gateway.with_notifier(notifier.clone()), notifier)
        }

        #[test]
        fn test_finish_sends_notification_once() {
            let (mut gateway, notifier) = create_notifying_gateway();
            let t0 = Instant::now();
            gateway.execute(start(2), t0).unwrap();

            gateway.tick(t0 + Duration::from_secs(1));
            assert_eq!(notifier.notification_count(), 0);

            gateway.tick(t0 + Duration::from_secs(2));
            gateway.tick(t0 + Duration::from_secs(3));

            assert_eq!(notifier.notifications(), vec!["Write report"]);
        }

        #[test]
        fn test_close_and_pause_do_not_notify() {
            let (mut gateway, notifier) = create_notifying_gateway();
            let t0 = Instant::now();
            gateway.execute(start(5), t0).unwrap();
            gateway.execute(TimerCommand::Pause, t0).unwrap();
            gateway.tick(t0 + Duration::from_secs(10));
            gateway.execute(TimerCommand::Close, t0).unwrap();

            assert_eq!(notifier.notification_count(), 0);
        }

        #[test]
        fn test_notification_failure_is_not_fatal() {
            let (mut gateway, notifier) = create_notifying_gateway();
            notifier.set_should_fail(true);
            let t0 = Instant::now();
            gateway.execute(start(1), t0).unwrap();

            let outcome = gateway.tick(t0 + Duration::from_secs(1));

            assert!(matches!(outcome, TickOutcome::Finished { .. }));
            assert_eq!(gateway.state().phase, TimerPhase::Finished);
        }
    }
}
