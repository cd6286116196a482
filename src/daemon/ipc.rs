//! IPC server for the focus timer.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Newline-delimited JSON request/response handling
//! - Event streaming to connections that subscribe
//!
//! Each connection gets a writer task fed by a bounded channel, so
//! responses and pushed events are written in order and a slow socket never
//! blocks the timer. Events are only pulled from a subscription while the
//! writer queue has room; a client that stops reading fills its subscriber
//! queue and the broadcaster skips it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::types::{encode_line, DaemonMessage, IpcRequest, IpcResponse};

use super::broadcast::SubscriberId;
use super::service::TimerHandle;

// ============================================================================
// Constants
// ============================================================================

/// Maximum request line size in bytes (4KB)
pub const MAX_REQUEST_SIZE: usize = 4096;

/// Idle timeout for connections that are not subscribed
const READ_TIMEOUT_SECS: u64 = 5;

/// A write blocked this long drops the connection
const WRITE_TIMEOUT_SECS: u64 = 5;

/// Lines queued per connection ahead of its socket writer
const WRITER_QUEUE_CAPACITY: usize = 32;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// Write error
    #[error("Failed to write response: {0}")]
    WriteError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// A stale socket file is removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Accepts connections forever, serving each on its own task.
    pub async fn serve(&self, handler: RequestHandler) {
        loop {
            match self.accept().await {
                Ok(stream) => {
                    tokio::spawn(handler.clone().handle_connection(stream));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Reads one request line, enforcing [`MAX_REQUEST_SIZE`].
///
/// Returns `Ok(None)` at end of stream. Blank lines are skipped.
///
/// # Errors
///
/// Returns an error if reading fails, the line is too long, the idle
/// timeout elapses (when `idle_timeout` is set) or the JSON is invalid.
pub async fn receive_request(
    reader: &mut BufReader<OwnedReadHalf>,
    idle_timeout: Option<Duration>,
) -> Result<Option<IpcRequest>, IpcError> {
    loop {
        let mut line = String::new();
        let limit = (MAX_REQUEST_SIZE + 1) as u64;
        let mut limited = (&mut *reader).take(limit);
        let read = limited.read_line(&mut line);

        let n = match idle_timeout {
            Some(duration) => timeout(duration, read)
                .await
                .map_err(|_| IpcError::Timeout)?,
            None => read.await,
        }
        .map_err(|e| IpcError::ReadError(e.to_string()))?;

        if n == 0 {
            return Ok(None);
        }
        if n as u64 == limit && !line.ends_with('\n') {
            return Err(IpcError::RequestTooLarge);
        }

        match crate::types::decode_line::<IpcRequest>(&line) {
            Ok(Some(request)) => return Ok(Some(request)),
            Ok(None) => continue,
            Err(e) => return Err(IpcError::SerializationError(e.to_string())),
        }
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to the timer service.
#[derive(Clone)]
pub struct RequestHandler {
    /// Front door of the timer service
    timer: TimerHandle,
}

impl RequestHandler {
    /// Creates a new request handler for the given timer service.
    pub fn new(timer: TimerHandle) -> Self {
        Self { timer }
    }

    /// Handles a one-shot IPC request and returns the response.
    ///
    /// `subscribe`/`unsubscribe` only make sense on a live connection and
    /// are answered with an error here.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        let message = success_message(&request);
        let result = match request {
            IpcRequest::Start { params } => self.timer.execute(params.into()).await,
            IpcRequest::Pause => self.timer.pause().await,
            IpcRequest::Resume => self.timer.resume().await,
            IpcRequest::Restart => self.timer.restart().await,
            IpcRequest::Close => self.timer.close().await,
            IpcRequest::Status => self.timer.state().await,
            IpcRequest::Drag => self.timer.begin_surface_drag().await,
            IpcRequest::Subscribe | IpcRequest::Unsubscribe => {
                return IpcResponse::error_with_code(
                    "unsupported",
                    "subscriptions require a persistent connection",
                );
            }
        };

        match result {
            Ok(snapshot) => IpcResponse::success(message, Some(snapshot)),
            Err(e) => IpcResponse::error_with_code(e.code(), e.to_string()),
        }
    }

    /// Serves a single client connection until it disconnects.
    pub async fn handle_connection(self, stream: UnixStream) {
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let (tx, rx) = mpsc::channel::<String>(WRITER_QUEUE_CAPACITY);
        let write_task = tokio::spawn(async move {
            if let Err(e) = write_lines(writer, rx).await {
                debug!(error = %e, "client went away");
            }
        });

        let mut subscription: Option<(SubscriberId, JoinHandle<()>)> = None;

        loop {
            let idle_timeout = subscription
                .is_none()
                .then(|| Duration::from_secs(READ_TIMEOUT_SECS));

            let received = tokio::select! {
                received = receive_request(&mut reader, idle_timeout) => received,
                // writer gave up on this client
                () = tx.closed() => break,
            };

            let request = match received {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(e @ IpcError::SerializationError(_)) => {
                    let response = IpcResponse::error_with_code("bad_request", e.to_string());
                    if send(&tx, &response).await.is_err() {
                        break;
                    }
                    continue;
                }
                Err(e @ IpcError::RequestTooLarge) => {
                    let response = IpcResponse::error_with_code("bad_request", e.to_string());
                    let _ = send(&tx, &response).await;
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "closing connection");
                    break;
                }
            };

            debug!(command = request.name(), "request received");

            let response = match request {
                IpcRequest::Subscribe => {
                    if subscription.is_none() {
                        subscription = Some(self.attach(&tx));
                    }
                    let mut response = self.handle(IpcRequest::Status).await;
                    response.message = "Subscribed to timer events".to_string();
                    response
                }
                IpcRequest::Unsubscribe => {
                    if let Some((id, forwarder)) = subscription.take() {
                        forwarder.abort();
                        self.timer.unsubscribe(id);
                    }
                    IpcResponse::success("Unsubscribed", None)
                }
                request => self.handle(request).await,
            };

            if send(&tx, &response).await.is_err() {
                break;
            }
        }

        if let Some((id, forwarder)) = subscription.take() {
            forwarder.abort();
            self.timer.unsubscribe(id);
            info!(subscriber = id, "observer disconnected");
        }

        // Let queued responses drain before the socket closes
        drop(tx);
        let _ = write_task.await;
    }

    /// Subscribes and forwards events into this connection's writer.
    ///
    /// Subscribing happens before the state query that answers the request,
    /// so no event after that snapshot is missed. A writer slot is reserved
    /// before each event is taken, so a stalled writer leaves events in the
    /// bounded subscriber queue.
    fn attach(&self, tx: &mpsc::Sender<String>) -> (SubscriberId, JoinHandle<()>) {
        let mut subscription = self.timer.subscribe();
        let id = subscription.id();
        let tx = tx.clone();
        info!(subscriber = id, "observer attached over IPC");

        let forwarder = tokio::spawn(async move {
            loop {
                let Ok(permit) = tx.reserve().await else {
                    break;
                };
                let Some(event) = subscription.recv().await else {
                    break;
                };
                match encode_line(&DaemonMessage::Event(event)) {
                    Ok(line) => permit.send(line),
                    Err(e) => warn!(error = %e, "failed to encode event"),
                }
            }
        });

        (id, forwarder)
    }
}

fn success_message(request: &IpcRequest) -> &'static str {
    match request {
        IpcRequest::Start { .. } => "Focus session started",
        IpcRequest::Pause => "Focus session paused",
        IpcRequest::Resume => "Focus session resumed",
        IpcRequest::Restart => "Focus session restarted",
        IpcRequest::Close => "Focus session closed",
        IpcRequest::Drag => "Drag handed to the display surface",
        IpcRequest::Status | IpcRequest::Subscribe | IpcRequest::Unsubscribe => "",
    }
}

/// Queues a response for the writer. Fails once the writer has stopped.
async fn send(tx: &mpsc::Sender<String>, response: &IpcResponse) -> Result<(), IpcError> {
    match encode_line(&DaemonMessage::Response(response.clone())) {
        Ok(line) => tx
            .send(line)
            .await
            .map_err(|_| IpcError::WriteError("connection writer stopped".to_string())),
        Err(e) => {
            warn!(error = %IpcError::SerializationError(e.to_string()), "dropping response");
            Ok(())
        }
    }
}

/// Writes queued lines to the socket until the queue closes.
///
/// # Errors
///
/// Returns [`IpcError::WriteError`] if the socket fails, or
/// [`IpcError::Timeout`] if a single write stalls for
/// [`WRITE_TIMEOUT_SECS`].
async fn write_lines(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<String>,
) -> Result<(), IpcError> {
    while let Some(line) = rx.recv().await {
        timeout(
            Duration::from_secs(WRITE_TIMEOUT_SECS),
            writer.write_all(line.as_bytes()),
        )
        .await
        .map_err(|_| IpcError::Timeout)?
        .map_err(|e| IpcError::WriteError(e.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
