//! Channel-backed surface and its host thread.
//!
//! The timer task only ever pushes a [`SurfaceRequest`] into an unbounded
//! crossbeam channel. The [`SurfaceHost`] thread on the other end owns the
//! presentation process: it launches the configured command on open,
//! relaunches it on focus if it has exited, and terminates it on close.

use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

use super::{DisplaySurface, SurfaceError, SurfaceRequest};

// ============================================================================
// ChannelSurface
// ============================================================================

/// [`DisplaySurface`] that forwards requests to a [`SurfaceHost`] thread.
#[derive(Debug, Clone)]
pub struct ChannelSurface {
    request_tx: Sender<SurfaceRequest>,
}

impl ChannelSurface {
    /// Creates a surface sending into `request_tx`.
    pub fn new(request_tx: Sender<SurfaceRequest>) -> Self {
        Self { request_tx }
    }

    /// Asks the host thread to close the surface and exit.
    pub fn shutdown(&self) -> Result<(), SurfaceError> {
        self.send(SurfaceRequest::Shutdown)
    }

    fn send(&self, request: SurfaceRequest) -> Result<(), SurfaceError> {
        self.request_tx
            .send(request)
            .map_err(|_| SurfaceError::HostDisconnected)
    }
}

impl DisplaySurface for ChannelSurface {
    fn open(&self) -> Result<(), SurfaceError> {
        self.send(SurfaceRequest::Open)
    }

    fn focus(&self) -> Result<(), SurfaceError> {
        self.send(SurfaceRequest::Focus)
    }

    fn close(&self) -> Result<(), SurfaceError> {
        self.send(SurfaceRequest::Close)
    }

    fn begin_move(&self) -> Result<(), SurfaceError> {
        self.send(SurfaceRequest::BeginMove)
    }
}

// ============================================================================
// SurfaceHost
// ============================================================================

/// Owns the presentation process and applies surface requests in order.
pub struct SurfaceHost {
    /// Command line launched on open (empty: log only)
    launch: Vec<String>,
    /// Running presentation process
    child: Option<Child>,
    /// Incoming requests
    request_rx: Receiver<SurfaceRequest>,
}

impl SurfaceHost {
    /// Creates a host that launches `launch` as the presentation surface.
    pub fn new(launch: Vec<String>, request_rx: Receiver<SurfaceRequest>) -> Self {
        Self {
            launch,
            child: None,
            request_rx,
        }
    }

    /// Processes requests until shutdown or until every sender is dropped.
    pub fn run(mut self) {
        info!("surface host started");

        while let Ok(request) = self.request_rx.recv() {
            if !self.handle_request(request) {
                break;
            }
        }

        if let Err(e) = self.close_surface() {
            warn!(error = %e, "failed to close surface during shutdown");
        }
        info!("surface host stopped");
    }

    /// Handles a single request, logging failures.
    ///
    /// Returns `false` when the host should stop.
    pub fn handle_request(&mut self, request: SurfaceRequest) -> bool {
        debug!(request = request.as_str(), "surface request");

        let result = match request {
            SurfaceRequest::Open => self.open_surface(),
            SurfaceRequest::Focus => self.focus_surface(),
            SurfaceRequest::Close => self.close_surface(),
            SurfaceRequest::BeginMove => {
                debug!("move gesture handed to the window manager");
                Ok(())
            }
            SurfaceRequest::Shutdown => return false,
        };

        if let Err(e) = result {
            warn!(
                request = request.as_str(),
                error = %e,
                suggestion = e.suggestion(),
                "surface request failed"
            );
        }
        true
    }

    /// Returns true if the presentation process is still running.
    pub fn is_open(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };

        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(%status, "presentation surface exited");
                self.child = None;
                false
            }
            Err(e) => {
                warn!(error = %e, "failed to poll presentation surface");
                self.child = None;
                false
            }
        }
    }

    fn open_surface(&mut self) -> Result<(), SurfaceError> {
        if self.is_open() {
            debug!("surface already open");
            return Ok(());
        }

        let Some((program, args)) = self.launch.split_first() else {
            info!("no presentation command configured; surface open is a no-op");
            return Ok(());
        };

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SurfaceError::LaunchFailed(format!("{program}: {e}")))?;

        info!(pid = child.id(), program = %program, "presentation surface launched");
        self.child = Some(child);
        Ok(())
    }

    fn focus_surface(&mut self) -> Result<(), SurfaceError> {
        if self.is_open() {
            debug!("surface focus requested");
            return Ok(());
        }
        self.open_surface()
    }

    fn close_surface(&mut self) -> Result<(), SurfaceError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        // kill() fails with InvalidInput once the process has already exited
        if let Err(e) = child.kill() {
            if e.kind() != std::io::ErrorKind::InvalidInput {
                return Err(SurfaceError::Other(e.to_string()));
            }
        }
        child
            .wait()
            .map_err(|e| SurfaceError::Other(e.to_string()))?;

        info!("presentation surface closed");
        Ok(())
    }
}

/// Starts a [`SurfaceHost`] on its own thread.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_surface_host(
    launch: Vec<String>,
) -> std::io::Result<(ChannelSurface, JoinHandle<()>)> {
    let (request_tx, request_rx) = unbounded();
    let host = SurfaceHost::new(launch, request_rx);

    let handle = thread::Builder::new()
        .name("surface-host".to_string())
        .spawn(move || host.run())?;

    Ok((ChannelSurface::new(request_tx), handle))
}
