//! Daemon process wiring.
//!
//! Starts the surface host (when configured), the timer service and the IPC
//! server, then runs until SIGINT or SIGTERM. A session in progress when the
//! daemon stops is discarded; the next daemon starts idle.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use crate::config::DaemonConfig;
use crate::notification::{CompletionNotifier, DesktopNotifier, NullNotifier};
use crate::surface::{spawn_surface_host, DisplaySurface, NullSurface};

use super::ipc::{IpcServer, RequestHandler};
use super::service::TimerService;

/// Runs the daemon until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the surface host cannot start or the socket cannot
/// be bound.
pub async fn run_daemon(config: DaemonConfig) -> Result<()> {
    let (surface, surface_host): (Arc<dyn DisplaySurface>, _) = if config.surface.enabled {
        let (surface, thread) = spawn_surface_host(config.surface.launch.clone())
            .context("Failed to start surface host thread")?;
        (Arc::new(surface.clone()), Some((surface, thread)))
    } else {
        info!("display surface disabled; running headless");
        (Arc::new(NullSurface), None)
    };

    let notifier: Arc<dyn CompletionNotifier> = if config.notification.enabled {
        Arc::new(DesktopNotifier::default())
    } else {
        info!("completion notifications disabled");
        Arc::new(NullNotifier)
    };

    let (timer, service_task) = TimerService::spawn_with_notifier(surface, notifier, &config);

    let server = IpcServer::new(&config.socket_path)?;
    info!(socket = ?server.socket_path(), "focus-timer daemon listening");

    tokio::select! {
        () = server.serve(RequestHandler::new(timer)) => {}
        () = shutdown_signal() => info!("shutdown signal received"),
    }

    drop(server);
    service_task.abort();

    if let Some((surface, thread)) = surface_host {
        if let Err(e) = surface.shutdown() {
            warn!(error = %e, "surface host already stopped");
        }
        let joined = tokio::task::spawn_blocking(move || thread.join()).await;
        if !matches!(joined, Ok(Ok(()))) {
            warn!("surface host did not exit cleanly");
        }
    }

    info!("focus-timer daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
