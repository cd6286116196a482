//! Command definitions for the focus-timer CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

/// Default session length in minutes.
pub const DEFAULT_MINUTES: u32 = 25;

// ============================================================================
// CLI Structure
// ============================================================================

/// Focus timer CLI
#[derive(Parser, Debug)]
#[command(
    name = "focus-timer",
    version,
    about = "Single-session focus timer with live display surfaces",
    long_about = "A focus timer daemon and its command-line client.\n\
                  One countdown is owned by the daemon; any number of display surfaces \
                  can watch it and send commands over a Unix socket.",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the daemon socket
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start a focus session for a task
    Start(StartArgs),

    /// Pause the running countdown
    Pause,

    /// Resume a paused countdown
    Resume,

    /// Restart the countdown from its original duration
    Restart,

    /// Close the session
    Close,

    /// Show current timer status
    Status,

    /// Hand a drag gesture to the display surface
    Drag,

    /// Follow the countdown live
    Watch,

    /// Run the timer daemon
    Daemon(DaemonArgs),

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Start Command Arguments
// ============================================================================

/// Arguments for the start command
#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("duration").args(["minutes", "seconds"])))]
pub struct StartArgs {
    /// Identifier of the task being worked on
    #[arg(long, value_parser = validate_non_empty)]
    pub task_id: String,

    /// Task title shown on display surfaces
    #[arg(short, long, value_parser = validate_task_title)]
    pub title: String,

    /// Session length in minutes (default 25)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=1440))]
    pub minutes: Option<u32>,

    /// Session length in seconds
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=86_400))]
    pub seconds: Option<u32>,
}

impl StartArgs {
    /// Returns the requested session length in seconds.
    pub fn duration_seconds(&self) -> i64 {
        match (self.seconds, self.minutes) {
            (Some(seconds), _) => i64::from(seconds),
            (None, Some(minutes)) => i64::from(minutes) * 60,
            (None, None) => i64::from(DEFAULT_MINUTES) * 60,
        }
    }
}

// ============================================================================
// Daemon Command Arguments
// ============================================================================

/// Arguments for the daemon command
#[derive(Args, Debug, Clone, Default)]
pub struct DaemonArgs {
    /// Config file (defaults to the platform config dir)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

// ============================================================================
// Validation Functions
// ============================================================================

fn validate_non_empty(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        return Err("value must not be empty".to_string());
    }
    Ok(s.to_string())
}

/// Validates the task title.
///
/// - Must not be empty
/// - Must not exceed 200 characters
fn validate_task_title(s: &str) -> Result<String, String> {
    validate_non_empty(s)?;
    if s.chars().count() > 200 {
        return Err("task title must be at most 200 characters".to_string());
    }
    Ok(s.to_string())
}

// ============================================================================
// Tests
// ============================================================================
