//! Timer command error types.
//!
//! Every rejected command leaves the timer state untouched and reports one
//! of these variants to the immediate caller.

use thiserror::Error;

use crate::surface::SurfaceError;
use crate::types::TimerPhase;

/// Errors returned by timer commands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// The current phase does not permit the command.
    #[error("cannot {command} while the timer is {phase}")]
    InvalidTransition {
        /// Rejected command
        command: &'static str,
        /// Phase at the time of rejection
        phase: TimerPhase,
    },

    /// A command argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No timer session has been started.
    #[error("no focus session has been started")]
    NoActiveSession,

    /// The display surface collaborator failed.
    #[error("display surface unavailable: {0}")]
    SurfaceUnavailable(#[from] SurfaceError),

    /// The timer service is no longer running.
    #[error("timer service has stopped")]
    ServiceStopped,
}

impl TimerError {
    /// Returns the machine-readable code sent over IPC.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NoActiveSession => "no_active_session",
            Self::SurfaceUnavailable(_) => "surface_unavailable",
            Self::ServiceStopped => "service_stopped",
        }
    }

    /// Returns true if the error was caused by the current timer phase.
    #[must_use]
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}
