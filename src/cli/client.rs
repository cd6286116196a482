//! IPC client for communicating with the focus-timer daemon.
//!
//! This module provides:
//! - Unix Domain Socket client speaking newline-delimited JSON
//! - Connection retry logic
//! - Timeout handling
//! - A subscribed event stream for live display

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::cli::commands::StartArgs;
use crate::config::DaemonConfig;
use crate::types::{
    decode_line, encode_line, DaemonMessage, IpcRequest, IpcResponse, StartParams, TimerEvent,
    TimerSnapshot,
};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum connection attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
}

impl IpcClient {
    /// Creates a new IPC client with the default socket path.
    pub fn new() -> Self {
        Self::with_socket_path(DaemonConfig::default_socket_path())
    }

    /// Creates a new IPC client with a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sends a start command to the daemon.
    pub async fn start(&self, args: &StartArgs) -> Result<IpcResponse> {
        let params = StartParams::new(
            args.task_id.clone(),
            args.title.clone(),
            args.duration_seconds(),
        );
        self.send_request(&IpcRequest::Start { params }).await
    }

    /// Sends a pause command to the daemon.
    pub async fn pause(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Pause).await
    }

    /// Sends a resume command to the daemon.
    pub async fn resume(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Resume).await
    }

    /// Sends a restart command to the daemon.
    pub async fn restart(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Restart).await
    }

    /// Sends a close command to the daemon.
    pub async fn close(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Close).await
    }

    /// Sends a status query to the daemon.
    pub async fn status(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Status).await
    }

    /// Asks the daemon to hand a drag gesture to its display surface.
    pub async fn drag(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Drag).await
    }

    /// Subscribes to timer events.
    ///
    /// The returned stream carries the snapshot taken right after
    /// subscribing, followed by every event the daemon pushes.
    pub async fn watch(&self) -> Result<EventStream> {
        let stream = self.connect_with_retry().await?;
        let mut connection = Connection::new(stream);

        let response = connection.request(&IpcRequest::Subscribe).await?;
        let initial = response.data.unwrap_or_default();

        Ok(EventStream {
            connection,
            initial: Some(initial),
        })
    }

    /// Sends a single request and waits for its response.
    ///
    /// Only the connection attempt is retried; a request that reached the
    /// daemon is never sent twice.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let stream = self.connect_with_retry().await?;
        Connection::new(stream).request(request).await
    }

    /// Connects to the daemon, retrying with a linear backoff.
    async fn connect_with_retry(&self) -> Result<UnixStream> {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.connect().await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::debug!("connection failed (attempt {}/{}): {:#}", attempt, MAX_RETRIES, e);
                    last_error = Some(e);

                    if attempt < MAX_RETRIES {
                        let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("no connection attempt was made")))
    }

    async fn connect(&self) -> Result<UnixStream> {
        timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timed out")?
            .with_context(|| {
                format!(
                    "Cannot connect to the daemon at {:?}. Start it with 'focus-timer daemon'",
                    self.socket_path
                )
            })
    }
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Connection
// ============================================================================

/// One line-framed connection to the daemon.
struct Connection {
    lines: Lines<BufReader<OwnedReadHalf>>,
    // Dropping the write half would end the subscription
    writer: OwnedWriteHalf,
}

impl Connection {
    fn new(stream: UnixStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn request(&mut self, request: &IpcRequest) -> Result<IpcResponse> {
        let line = encode_line(request).context("Failed to serialize request")?;

        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            self.writer.write_all(line.as_bytes()),
        )
        .await
        .context("Write timed out")?
        .context("Failed to send request")?;

        loop {
            let message = timeout(Duration::from_secs(IO_TIMEOUT_SECS), self.next_message())
                .await
                .context("Read timed out")??
                .context("The daemon closed the connection without responding")?;

            if let DaemonMessage::Response(response) = message {
                if !response.is_success() {
                    anyhow::bail!("{}", response.message);
                }
                return Ok(response);
            }
        }
    }

    async fn next_message(&mut self) -> Result<Option<DaemonMessage>> {
        loop {
            let Some(line) = self
                .lines
                .next_line()
                .await
                .context("Failed to read from daemon")?
            else {
                return Ok(None);
            };

            if let Some(message) =
                decode_line::<DaemonMessage>(&line).context("Failed to parse daemon message")?
            {
                return Ok(Some(message));
            }
        }
    }
}

// ============================================================================
// EventStream
// ============================================================================

/// Live feed of timer events from a subscribed connection.
pub struct EventStream {
    connection: Connection,
    initial: Option<TimerSnapshot>,
}

impl EventStream {
    /// Returns the snapshot taken when the subscription was made.
    pub fn initial_snapshot(&self) -> Option<&TimerSnapshot> {
        self.initial.as_ref()
    }

    /// Waits for the next event. Returns `None` when the daemon goes away.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or a line cannot be parsed.
    pub async fn next_event(&mut self) -> Result<Option<TimerEvent>> {
        loop {
            match self.connection.next_message().await? {
                Some(DaemonMessage::Event(event)) => return Ok(Some(event)),
                Some(DaemonMessage::Response(_)) => continue,
                None => return Ok(None),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    use crate::types::TimerPhase;

    // ------------------------------------------------------------------------
    // Helper functions
    // ------------------------------------------------------------------------

    fn create_temp_socket_path() -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        // Keep the directory so it's not deleted
        std::mem::forget(dir);
        path
    }

    /// Accepts one connection, answers each request line with `replies` in
    /// order, and returns the request lines it saw.
    fn spawn_mock_server(socket_path: &Path, replies: Vec<String>) -> tokio::task::JoinHandle<Vec<String>> {
        let listener = UnixListener::bind(socket_path).unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();
            let mut seen = Vec::new();

            for reply in replies {
                let Ok(Some(line)) = lines.next_line().await else {
                    break;
                };
                seen.push(line);
                writer.write_all(reply.as_bytes()).await.unwrap();
            }
            seen
        })
    }

    fn response_line(response: IpcResponse) -> String {
        encode_line(&DaemonMessage::Response(response)).unwrap()
    }

    fn event_line(event: TimerEvent) -> String {
        encode_line(&DaemonMessage::Event(event)).unwrap()
    }

    // ------------------------------------------------------------------------
    // IpcClient Tests
    // ------------------------------------------------------------------------

    mod client_tests {
        use super::*;

        #[test]
        fn test_with_socket_path() {
            let path = PathBuf::from("/tmp/test.sock");
            let client = IpcClient::with_socket_path(path.clone());
            assert_eq!(client.socket_path(), path.as_path());
        }

        #[test]
        fn test_default_uses_config_socket() {
            let client = IpcClient::default();
            assert_eq!(client.socket_path(), DaemonConfig::default_socket_path().as_path());
        }

        #[tokio::test]
        async fn test_status_success() {
            let socket_path = create_temp_socket_path();
            let server = spawn_mock_server(
                &socket_path,
                vec![response_line(IpcResponse::success("", Some(TimerSnapshot::idle())))],
            );

            let client = IpcClient::with_socket_path(socket_path);
            let response = client.status().await.unwrap();

            assert!(response.is_success());
            assert!(response.data.unwrap().is_idle());
            assert_eq!(server.await.unwrap(), vec![r#"{"command":"status"}"#.to_string()]);
        }

        #[tokio::test]
        async fn test_start_sends_duration_in_seconds() {
            let socket_path = create_temp_socket_path();
            let server = spawn_mock_server(
                &socket_path,
                vec![response_line(IpcResponse::success("Focus session started", None))],
            );

            let client = IpcClient::with_socket_path(socket_path);
            let args = StartArgs {
                task_id: "t1".into(),
                title: "Write report".into(),
                minutes: Some(25),
                seconds: None,
            };
            client.start(&args).await.unwrap();

            let seen = server.await.unwrap();
            let request: IpcRequest = decode_line(&seen[0]).unwrap().unwrap();
            assert_eq!(
                request,
                IpcRequest::Start {
                    params: StartParams::new("t1", "Write report", 1500)
                }
            );
        }

        #[tokio::test]
        async fn test_error_response_becomes_error() {
            let socket_path = create_temp_socket_path();
            let _server = spawn_mock_server(
                &socket_path,
                vec![response_line(IpcResponse::error_with_code(
                    "invalid_transition",
                    "cannot pause while the timer is paused",
                ))],
            );

            let client = IpcClient::with_socket_path(socket_path);
            let err = client.pause().await.unwrap_err();

            assert!(err.to_string().contains("cannot pause"));
        }

        #[tokio::test]
        async fn test_events_before_response_are_skipped() {
            let socket_path = create_temp_socket_path();
            let reply = format!(
                "{}{}",
                event_line(TimerEvent::Finished),
                response_line(IpcResponse::success("", Some(TimerSnapshot::idle())))
            );
            let _server = spawn_mock_server(&socket_path, vec![reply]);

            let client = IpcClient::with_socket_path(socket_path);
            assert!(client.status().await.unwrap().is_success());
        }

        #[tokio::test]
        async fn test_connection_failure_after_retries() {
            let socket_path = create_temp_socket_path();
            let client = IpcClient::with_socket_path(socket_path);

            let err = client.status().await.unwrap_err();
            assert!(format!("{:#}", err).contains("focus-timer daemon"));
        }

        #[tokio::test]
        async fn test_daemon_hangs_up_without_response() {
            let socket_path = create_temp_socket_path();
            let listener = UnixListener::bind(&socket_path).unwrap();
            tokio::spawn(async move {
                let (stream, _) = listener.accept().await.unwrap();
                drop(stream);
            });

            let client = IpcClient::with_socket_path(socket_path);
            assert!(client.status().await.is_err());
        }
    }

    // ------------------------------------------------------------------------
    // EventStream Tests
    // ------------------------------------------------------------------------

    mod event_stream_tests {
        use super::*;

        #[tokio::test]
        async fn test_watch_yields_initial_snapshot_and_events() {
            let socket_path = create_temp_socket_path();
            let snapshot = TimerSnapshot {
                phase: TimerPhase::Active,
                remaining_seconds: 90,
                original_seconds: 90,
                is_active: true,
                ..TimerSnapshot::default()
            };
            let reply = format!(
                "{}{}",
                response_line(IpcResponse::success("Subscribed", Some(snapshot.clone()))),
                event_line(TimerEvent::Finished)
            );
            let _server = spawn_mock_server(&socket_path, vec![reply]);

            let client = IpcClient::with_socket_path(socket_path);
            let mut stream = client.watch().await.unwrap();

            assert_eq!(stream.initial_snapshot(), Some(&snapshot));
            assert_eq!(stream.next_event().await.unwrap(), Some(TimerEvent::Finished));
            assert_eq!(stream.next_event().await.unwrap(), None);
        }
    }
}
