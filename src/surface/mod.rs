//! Display surface integration.
//!
//! The timer core does not create, move, or destroy windows. It consumes a
//! [`DisplaySurface`] capability with four operations and treats every
//! failure as non-fatal.
//!
//! # Architecture
//!
//! - `error.rs`: [`SurfaceError`]
//! - `host.rs`: [`ChannelSurface`] forwards requests over a crossbeam channel
//!   to a [`SurfaceHost`] thread, which owns the presentation process. Slow
//!   process work there never stalls the timer task.
//! - [`NullSurface`]: headless mode
//! - [`MockDisplaySurface`]: records calls for tests
//!
//! ```ignore
//! use focus_timer::surface::{spawn_surface_host, DisplaySurface};
//!
//! let (surface, _host) = spawn_surface_host(vec!["alacritty".into(), "-e".into(),
//!     "focus-timer".into(), "watch".into()])?;
//! surface.open()?;
//! ```

pub mod error;
pub mod host;

pub use error::SurfaceError;
pub use host::{spawn_surface_host, ChannelSurface, SurfaceHost};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

// ============================================================================
// DisplaySurface
// ============================================================================

/// Lifecycle capability of the external presentation surface.
///
/// Implementations must return promptly. Anything slow belongs on another
/// thread.
pub trait DisplaySurface: Send + Sync {
    /// Shows the surface, creating it if needed.
    fn open(&self) -> Result<(), SurfaceError>;
    /// Brings an existing surface to the front.
    fn focus(&self) -> Result<(), SurfaceError>;
    /// Dismisses the surface.
    fn close(&self) -> Result<(), SurfaceError>;
    /// Hands a drag gesture to the windowing system.
    fn begin_move(&self) -> Result<(), SurfaceError>;
}

/// Requests understood by a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRequest {
    /// Show the surface
    Open,
    /// Raise the surface
    Focus,
    /// Dismiss the surface
    Close,
    /// Start a drag gesture
    BeginMove,
    /// Stop the host thread
    Shutdown,
}

impl SurfaceRequest {
    /// Returns the operation name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceRequest::Open => "open",
            SurfaceRequest::Focus => "focus",
            SurfaceRequest::Close => "close",
            SurfaceRequest::BeginMove => "begin_move",
            SurfaceRequest::Shutdown => "shutdown",
        }
    }
}

// ============================================================================
// NullSurface
// ============================================================================

/// Surface for headless daemons. Every call succeeds and does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl DisplaySurface for NullSurface {
    fn open(&self) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn focus(&self) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn close(&self) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn begin_move(&self) -> Result<(), SurfaceError> {
        Ok(())
    }
}

// ============================================================================
// MockDisplaySurface
// ============================================================================

/// Mock display surface for testing.
///
/// Records every request in order and can be told to fail.
#[derive(Debug, Default)]
pub struct MockDisplaySurface {
    /// Requests received so far
    calls: Mutex<Vec<SurfaceRequest>>,
    /// Whether calls should return an error
    should_fail: AtomicBool,
}

impl MockDisplaySurface {
    /// Creates a new mock surface that succeeds on every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether subsequent calls should fail.
    ///
    /// Failing calls are still recorded.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Returns the recorded requests in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<SurfaceRequest> {
        self.lock_calls().clone()
    }

    /// Returns how many times `request` was received.
    #[must_use]
    pub fn call_count(&self, request: SurfaceRequest) -> usize {
        self.lock_calls()
            .iter()
            .filter(|call| **call == request)
            .count()
    }

    /// Clears the recorded requests.
    pub fn reset(&self) {
        self.lock_calls().clear();
    }

    fn lock_calls(&self) -> MutexGuard<'_, Vec<SurfaceRequest>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, request: SurfaceRequest) -> Result<(), SurfaceError> {
        self.lock_calls().push(request);
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(SurfaceError::Other("simulated failure".to_string()));
        }
        Ok(())
    }
}

impl DisplaySurface for MockDisplaySurface {
    fn open(&self) -> Result<(), SurfaceError> {
        self.record(SurfaceRequest::Open)
    }

    fn focus(&self) -> Result<(), SurfaceError> {
        self.record(SurfaceRequest::Focus)
    }

    fn close(&self) -> Result<(), SurfaceError> {
        self.record(SurfaceRequest::Close)
    }

    fn begin_move(&self) -> Result<(), SurfaceError> {
        self.record(SurfaceRequest::BeginMove)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_surface_always_succeeds() {
        let surface = NullSurface;
        assert!(surface.open().is_ok());
        assert!(surface.focus().is_ok());
        assert!(surface.close().is_ok());
        assert!(surface.begin_move().is_ok());
    }

    #[test]
    fn test_mock_records_calls_in_order() {
        let mock = MockDisplaySurface::new();
        mock.open().unwrap();
        mock.begin_move().unwrap();
        mock.close().unwrap();

        assert_eq!(
            mock.calls(),
            vec![
                SurfaceRequest::Open,
                SurfaceRequest::BeginMove,
                SurfaceRequest::Close
            ]
        );
        assert_eq!(mock.call_count(SurfaceRequest::Open), 1);
        assert_eq!(mock.call_count(SurfaceRequest::Focus), 0);
    }

    #[test]
    fn test_mock_failure_still_records() {
        let mock = MockDisplaySurface::new();
        mock.set_should_fail(true);

        assert!(mock.open().is_err());
        assert_eq!(mock.call_count(SurfaceRequest::Open), 1);

        mock.set_should_fail(false);
        mock.reset();
        assert!(mock.focus().is_ok());
        assert_eq!(mock.calls(), vec![SurfaceRequest::Focus]);
    }

    #[test]
    fn test_request_names() {
        assert_eq!(SurfaceRequest::Open.as_str(), "open");
        assert_eq!(SurfaceRequest::BeginMove.as_str(), "begin_move");
        assert_eq!(SurfaceRequest::Shutdown.as_str(), "shutdown");
    }
}
