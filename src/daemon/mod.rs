//! Daemon module for the focus timer.
//!
//! This module contains the core daemon functionality:
//! - `controller`: Timer state owner, clock and elapsed-time accounting
//! - `broadcast`: Non-blocking fan-out of timer events to observers
//! - `gateway`: Precondition checks and display surface coordination
//! - `service`: Single-writer task and its cloneable handle
//! - `ipc`: Unix socket server speaking newline-delimited JSON
//! - `runner`: Process wiring and signal handling

pub mod broadcast;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod ipc;
pub mod runner;
pub mod service;

pub use broadcast::{EventBroadcaster, SubscriberId, Subscription};
pub use controller::{TickOutcome, TimerController, TICK_PERIOD};
pub use error::TimerError;
pub use gateway::{check_precondition, CommandGateway, TimerCommand};
pub use ipc::{IpcServer, RequestHandler};
pub use runner::run_daemon;
pub use service::{TimerHandle, TimerService};
