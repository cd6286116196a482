//! Display utilities for the focus-timer CLI.
//!
//! This module provides formatted output for:
//! - Command results
//! - Error messages
//! - Status display
//! - Live watch lines

use crate::types::{IpcResponse, TimerEvent, TimerPhase, TimerSnapshot};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows a success message for session start.
    pub fn show_start_success(response: &IpcResponse) {
        println!("* Focus session started");

        if let Some(data) = &response.data {
            if let Some(title) = &data.task_title {
                println!("  Task: {}", title);
            }
            println!("  Remaining: {}", Self::format_time(data.remaining_seconds));
        }
    }

    /// Shows a success message for pause.
    pub fn show_pause_success(response: &IpcResponse) {
        println!("|| Timer paused");
        Self::show_remaining(response);
    }

    /// Shows a success message for resume.
    pub fn show_resume_success(response: &IpcResponse) {
        println!("> Timer resumed");
        Self::show_remaining(response);
    }

    /// Shows a success message for restart.
    pub fn show_restart_success(response: &IpcResponse) {
        println!("<< Timer restarted");
        Self::show_remaining(response);
    }

    /// Shows a success message for close.
    pub fn show_close_success(_response: &IpcResponse) {
        println!("[] Session closed");
    }

    /// Shows a success message for a surface drag request.
    pub fn show_drag_success(_response: &IpcResponse) {
        println!("Drag handed to the display surface");
    }

    /// Shows the current timer status.
    pub fn show_status(response: &IpcResponse) {
        println!("Focus timer status");
        println!("─────────────────────────────");

        match &response.data {
            Some(data) if !data.is_idle() => {
                println!("State: {}", Self::phase_label(data.phase));
                if let Some(title) = &data.task_title {
                    println!("Task: {}", title);
                }
                println!(
                    "Remaining: {} / {}",
                    Self::format_time(data.remaining_seconds),
                    Self::format_time(data.original_seconds)
                );
                if let Some(started_at) = data.started_at {
                    println!("Started: {}", started_at.format("%Y-%m-%d %H:%M:%S UTC"));
                }
            }
            _ => println!("No focus session"),
        }
    }

    /// Renders one line of `watch` output, or `None` for events that carry
    /// nothing to print.
    pub fn watch_line(event: &TimerEvent) -> Option<String> {
        match event {
            TimerEvent::StateChanged { snapshot } => Some(Self::snapshot_line(snapshot)),
            TimerEvent::Finished => Some("Time's up!".to_string()),
            TimerEvent::SessionEnded { .. } => Some("Session closed".to_string()),
        }
    }

    /// Renders a snapshot as a single status line.
    pub fn snapshot_line(snapshot: &TimerSnapshot) -> String {
        if snapshot.is_idle() {
            return "No focus session".to_string();
        }

        let title = snapshot.task_title.as_deref().unwrap_or("");
        format!(
            "{} {} {}",
            Self::format_time(snapshot.remaining_seconds),
            Self::phase_label(snapshot.phase),
            title
        )
        .trim_end()
        .to_string()
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("Error: {}", message);
    }

    /// Formats seconds as zero-padded `MM:SS`. Minutes are not wrapped into
    /// hours.
    pub fn format_time(total_seconds: u32) -> String {
        format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
    }

    fn show_remaining(response: &IpcResponse) {
        if let Some(data) = &response.data {
            println!("  Remaining: {}", Self::format_time(data.remaining_seconds));
        }
    }

    fn phase_label(phase: TimerPhase) -> &'static str {
        match phase {
            TimerPhase::Idle => "idle",
            TimerPhase::Active => "running",
            TimerPhase::Paused => "paused",
            TimerPhase::Finished => "finished",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
