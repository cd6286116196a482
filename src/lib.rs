//! Focus Timer Library
//!
//! This library provides the core functionality for the focus timer.
//! It includes:
//! - Timer controller owning the single countdown session
//! - Event broadcasting to any number of display surfaces
//! - IPC server/client for daemon-CLI communication
//! - Display surface abstraction and host process management
//! - Desktop notification when a countdown finishes
//! - CLI command parsing and display utilities
//! - Type definitions for state, snapshots and wire messages

pub mod cli;
pub mod config;
pub mod daemon;
pub mod notification;
pub mod surface;
pub mod types;

// Re-export commonly used types for convenience
pub use config::{DaemonConfig, NotificationConfig, SurfaceConfig};
pub use daemon::{
    CommandGateway, EventBroadcaster, TimerCommand, TimerController, TimerError, TimerHandle,
    TimerService,
};
pub use notification::{
    CompletionNotifier, DesktopNotifier, MockNotifier, NotificationError, NullNotifier,
};
pub use surface::{DisplaySurface, MockDisplaySurface, NullSurface, SurfaceError};
pub use types::{
    DaemonMessage, IpcRequest, IpcResponse, StartParams, TimerEvent, TimerPhase, TimerSnapshot,
    TimerState,
};
