//! Display surface error types.
//!
//! Surface failures never stop the countdown. Callers log them and carry on.

use thiserror::Error;

/// Errors reported by a display surface implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The surface host thread is gone.
    #[error("surface host is not running")]
    HostDisconnected,

    /// The presentation command could not be started.
    #[error("failed to launch presentation surface: {0}")]
    LaunchFailed(String),

    /// The surface does not support the requested operation.
    #[error("surface does not support {0}")]
    Unsupported(&'static str),

    /// Generic surface error.
    #[error("surface error: {0}")]
    Other(String),
}

impl SurfaceError {
    /// Returns true if the host thread is gone.
    #[must_use]
    pub fn is_host_disconnected(&self) -> bool {
        matches!(self, Self::HostDisconnected)
    }

    /// Returns true if the timer should continue after this error.
    ///
    /// Always true: the countdown does not depend on the surface.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Returns a user-facing hint for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::HostDisconnected => "restart the daemon to bring the surface host back",
            Self::LaunchFailed(_) => "check the [surface] launch command in config.toml",
            Self::Unsupported(_) => "use a surface that implements this operation",
            Self::Other(_) => "check the daemon log for details",
        }
    }
}
