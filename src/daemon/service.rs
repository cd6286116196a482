//! Timer service task.
//!
//! A single tokio task owns the [`CommandGateway`] and is the only writer of
//! timer state. Commands arrive through a bounded mailbox together with a
//! oneshot reply channel; ticks come from sleeping until the controller's
//! next deadline. Both are applied strictly one at a time, commands first.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::config::DaemonConfig;
use crate::notification::{CompletionNotifier, NullNotifier};
use crate::surface::DisplaySurface;
use crate::types::TimerSnapshot;

use super::broadcast::{EventBroadcaster, SubscriberId, Subscription};
use super::controller::TimerController;
use super::error::TimerError;
use super::gateway::{CommandGateway, TimerCommand};

type Reply = oneshot::Sender<Result<TimerSnapshot, TimerError>>;

struct Envelope {
    command: TimerCommand,
    reply: Reply,
}

// ============================================================================
// TimerHandle
// ============================================================================

/// Cloneable front door to the timer service.
#[derive(Clone)]
pub struct TimerHandle {
    mailbox: mpsc::Sender<Envelope>,
    broadcaster: EventBroadcaster,
}

impl TimerHandle {
    /// Starts a new session.
    pub async fn start(
        &self,
        task_id: impl Into<String>,
        task_title: impl Into<String>,
        duration_seconds: i64,
    ) -> Result<TimerSnapshot, TimerError> {
        self.execute(TimerCommand::Start {
            task_id: task_id.into(),
            task_title: task_title.into(),
            duration_seconds,
        })
        .await
    }

    /// Pauses the countdown.
    pub async fn pause(&self) -> Result<TimerSnapshot, TimerError> {
        self.execute(TimerCommand::Pause).await
    }

    /// Resumes the countdown.
    pub async fn resume(&self) -> Result<TimerSnapshot, TimerError> {
        self.execute(TimerCommand::Resume).await
    }

    /// Restarts the countdown from its original duration.
    pub async fn restart(&self) -> Result<TimerSnapshot, TimerError> {
        self.execute(TimerCommand::Restart).await
    }

    /// Closes the session.
    pub async fn close(&self) -> Result<TimerSnapshot, TimerError> {
        self.execute(TimerCommand::Close).await
    }

    /// Returns the current snapshot.
    pub async fn state(&self) -> Result<TimerSnapshot, TimerError> {
        self.execute(TimerCommand::GetState).await
    }

    /// Forwards a drag gesture to the display surface.
    pub async fn begin_surface_drag(&self) -> Result<TimerSnapshot, TimerError> {
        self.execute(TimerCommand::BeginSurfaceDrag).await
    }

    /// Sends any command and waits for its result.
    ///
    /// # Errors
    ///
    /// Returns the command's own error, or [`TimerError::ServiceStopped`] if
    /// the service is gone.
    pub async fn execute(&self, command: TimerCommand) -> Result<TimerSnapshot, TimerError> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(Envelope { command, reply })
            .await
            .map_err(|_| TimerError::ServiceStopped)?;
        response.await.map_err(|_| TimerError::ServiceStopped)?
    }

    /// Attaches an observer. Query [`TimerHandle::state`] afterwards to
    /// learn the current state.
    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    /// Detaches an observer.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.broadcaster.unsubscribe(id)
    }

    /// Returns the number of attached observers.
    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    /// Returns the broadcaster (for testing).
    #[cfg(test)]
    pub(crate) fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }
}

// ============================================================================
// TimerService
// ============================================================================

/// The single-writer timer task.
pub struct TimerService {
    gateway: CommandGateway,
    mailbox: mpsc::Receiver<Envelope>,
}

impl TimerService {
    /// Builds a service and its handle from the daemon config, without
    /// completion notifications.
    pub fn new(surface: Arc<dyn DisplaySurface>, config: &DaemonConfig) -> (Self, TimerHandle) {
        Self::with_notifier(surface, Arc::new(NullNotifier), config)
    }

    /// Builds a service that tells `notifier` when a countdown finishes.
    pub fn with_notifier(
        surface: Arc<dyn DisplaySurface>,
        notifier: Arc<dyn CompletionNotifier>,
        config: &DaemonConfig,
    ) -> (Self, TimerHandle) {
        let broadcaster = EventBroadcaster::new(config.subscriber_buffer);
        let controller = TimerController::new(broadcaster.clone());
        let gateway = CommandGateway::new(controller, surface, config.max_duration_seconds)
            .with_close_surface_on_finish(config.surface.close_on_finish)
            .with_notifier(notifier);

        let (tx, rx) = mpsc::channel(config.mailbox_capacity.max(1));

        (
            Self {
                gateway,
                mailbox: rx,
            },
            TimerHandle {
                mailbox: tx,
                broadcaster,
            },
        )
    }

    /// Spawns the service on the current runtime.
    pub fn spawn(
        surface: Arc<dyn DisplaySurface>,
        config: &DaemonConfig,
    ) -> (TimerHandle, JoinHandle<()>) {
        Self::spawn_with_notifier(surface, Arc::new(NullNotifier), config)
    }

    /// Spawns a service that tells `notifier` when a countdown finishes.
    pub fn spawn_with_notifier(
        surface: Arc<dyn DisplaySurface>,
        notifier: Arc<dyn CompletionNotifier>,
        config: &DaemonConfig,
    ) -> (TimerHandle, JoinHandle<()>) {
        let (service, handle) = Self::with_notifier(surface, notifier, config);
        let task = tokio::spawn(service.run());
        (handle, task)
    }

    /// Runs until every [`TimerHandle`] has been dropped.
    pub async fn run(mut self) {
        info!("timer service started");

        loop {
            let deadline = self.gateway.next_deadline();

            tokio::select! {
                biased;

                envelope = self.mailbox.recv() => {
                    let Some(Envelope { command, reply }) = envelope else {
                        break;
                    };
                    let name = command.name();
                    let result = self.gateway.execute(command, Instant::now());
                    if let Err(e) = &result {
                        debug!(command = name, error = %e, "command rejected");
                    }
                    // caller may have given up waiting
                    let _ = reply.send(result);
                }

                () = wait_for(deadline) => {
                    self.gateway.tick(Instant::now());
                }
            }
        }

        info!("timer service stopped");
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::MockNotifier;
    use crate::surface::{MockDisplaySurface, NullSurface, SurfaceRequest};
    use crate::types::{TimerEvent, TimerPhase};
    use tokio::time::{advance, Duration};

    fn spawn_service() -> TimerHandle {
        let (handle, _task) = TimerService::spawn(Arc::new(NullSurface), &DaemonConfig::default());
        handle
    }

    async fn next_snapshot(sub: &mut Subscription) -> TimerSnapshot {
        loop {
            match sub.recv().await {
                Some(TimerEvent::StateChanged { snapshot }) => return snapshot,
                Some(_) => continue,
                None => panic!("subscription closed"),
            }
        }
    }

    async fn wait_for_remaining(sub: &mut Subscription, remaining: u32) {
        while next_snapshot(sub).await.remaining_seconds != remaining {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_publishes_every_second() {
        let handle = spawn_service();
        let mut sub = handle.subscribe();

        handle.start("t1", "Write report", 3).await.unwrap();
        assert_eq!(next_snapshot(&mut sub).await.remaining_seconds, 3);

        for expected in [2, 1, 0] {
            assert_eq!(next_snapshot(&mut sub).await.remaining_seconds, expected);
        }
        assert_eq!(sub.recv().await, Some(TimerEvent::Finished));

        let state = handle.state().await.unwrap();
        assert_eq!(state.phase, TimerPhase::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_notifies_once() {
        let notifier = Arc::new(MockNotifier::new());
        let (handle, _task) = TimerService::spawn_with_notifier(
            Arc::new(NullSurface),
            notifier.clone(),
            &DaemonConfig::default(),
        );
        let mut sub = handle.subscribe();

        handle.start("t1", "Write report", 2).await.unwrap();
        while sub.recv().await != Some(TimerEvent::Finished) {}

        advance(Duration::from_secs(5)).await;
        handle.state().await.unwrap();
        assert_eq!(notifier.notifications(), vec!["Write report"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_time_is_not_charged() {
        let handle = spawn_service();
        let mut sub = handle.subscribe();

        handle.start("t1", "Task", 100).await.unwrap();
        wait_for_remaining(&mut sub, 95).await;
        handle.pause().await.unwrap();

        advance(Duration::from_secs(60)).await;
        let paused = handle.state().await.unwrap();
        assert_eq!(paused.remaining_seconds, 95);
        assert_eq!(paused.phase, TimerPhase::Paused);

        handle.resume().await.unwrap();
        wait_for_remaining(&mut sub, 94).await;
        let resumed = handle.state().await.unwrap();
        assert_eq!(resumed.remaining_seconds, 94);
        assert_eq!(resumed.phase, TimerPhase::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_the_clock() {
        let handle = spawn_service();
        let mut sub = handle.subscribe();

        let started = handle.start("t1", "Task", 10).await.unwrap();
        let closed = handle.close().await.unwrap();
        assert!(closed.is_idle());

        advance(Duration::from_secs(30)).await;
        assert!(handle.state().await.unwrap().is_idle());

        let mut saw_session_end = false;
        while let Some(event) = sub.try_recv() {
            match event {
                TimerEvent::SessionEnded { session_id } => {
                    assert_eq!(Some(session_id), started.session_id);
                    saw_session_end = true;
                }
                TimerEvent::StateChanged { .. } => {}
                TimerEvent::Finished => panic!("closed session must not finish"),
            }
        }
        assert!(saw_session_end);
    }

    #[tokio::test]
    async fn test_command_errors_reach_caller() {
        let handle = spawn_service();

        assert_eq!(handle.pause().await, Err(TimerError::NoActiveSession));
        assert!(matches!(
            handle.start("t1", "Task", 0).await,
            Err(TimerError::InvalidArgument(_))
        ));

        handle.start("t1", "Task", 60).await.unwrap();
        assert!(handle.resume().await.unwrap_err().is_invalid_transition());
    }

    #[tokio::test]
    async fn test_drag_uses_surface() {
        let surface = Arc::new(MockDisplaySurface::new());
        let (handle, _task) = TimerService::spawn(surface.clone(), &DaemonConfig::default());

        handle.begin_surface_drag().await.unwrap();
        assert_eq!(surface.calls(), vec![SurfaceRequest::BeginMove]);
    }

    #[tokio::test]
    async fn test_concurrent_commands_are_serialized() {
        let handle = spawn_service();
        handle.start("t1", "Task", 600).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move { handle.pause().await }));
        }

        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(handle.state().await.unwrap().phase, TimerPhase::Paused);
    }

    #[tokio::test]
    async fn test_stopped_service_reports_error() {
        let (service, handle) = TimerService::new(Arc::new(NullSurface), &DaemonConfig::default());
        drop(service);

        assert_eq!(handle.state().await, Err(TimerError::ServiceStopped));
    }

    #[tokio::test]
    async fn test_service_exits_when_handles_dropped() {
        let (handle, task) = TimerService::spawn(Arc::new(NullSurface), &DaemonConfig::default());
        handle.start("t1", "Task", 60).await.unwrap();
        drop(handle);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("service should exit")
            .unwrap();
    }
}
