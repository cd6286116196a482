//! Daemon configuration.
//!
//! Loaded from `config.toml` in the platform config directory
//! (`~/.config/focus-timer/config.toml` on Linux). A missing file means
//! defaults; every field falls back to its default when omitted.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Directory under `$HOME` holding the socket.
const RUNTIME_DIR: &str = ".focus-timer";

/// Socket file name.
const SOCKET_FILE: &str = "focus-timer.sock";

/// Application directory name under the config dir.
const APP_DIR: &str = "focus-timer";

fn default_socket_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(RUNTIME_DIR)
        .join(SOCKET_FILE)
}

fn default_subscriber_buffer() -> usize {
    16
}

fn default_mailbox_capacity() -> usize {
    64
}

fn default_max_duration_seconds() -> u32 {
    24 * 60 * 60
}

fn default_close_on_finish() -> bool {
    true
}

fn default_notification_enabled() -> bool {
    true
}

// ============================================================================
// SurfaceConfig
// ============================================================================

/// Presentation surface settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SurfaceConfig {
    /// Whether the daemon drives a surface host at all.
    #[serde(default)]
    pub enabled: bool,

    /// Command line launched when a session opens the surface,
    /// e.g. `["alacritty", "-e", "focus-timer", "watch"]`.
    #[serde(default)]
    pub launch: Vec<String>,

    /// Close the surface when the countdown reaches zero.
    #[serde(default = "default_close_on_finish")]
    pub close_on_finish: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            launch: Vec::new(),
            close_on_finish: default_close_on_finish(),
        }
    }
}

// ============================================================================
// NotificationConfig
// ============================================================================

/// Completion notification settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Show a desktop notification when a countdown finishes.
    #[serde(default = "default_notification_enabled")]
    pub enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_notification_enabled(),
        }
    }
}

// ============================================================================
// DaemonConfig
// ============================================================================

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Unix socket the IPC server listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Queue depth per attached observer; full queues skip events.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    /// Queue depth of the timer command mailbox.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Longest accepted session in seconds.
    #[serde(default = "default_max_duration_seconds")]
    pub max_duration_seconds: u32,

    /// Presentation surface settings.
    #[serde(default)]
    pub surface: SurfaceConfig,

    /// Completion notification settings.
    #[serde(default)]
    pub notification: NotificationConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            subscriber_buffer: default_subscriber_buffer(),
            mailbox_capacity: default_mailbox_capacity(),
            max_duration_seconds: default_max_duration_seconds(),
            surface: SurfaceConfig::default(),
            notification: NotificationConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Returns the default config file location, if a config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Returns the default socket path.
    pub fn default_socket_path() -> PathBuf {
        default_socket_path()
    }

    /// Loads the config from `path`, or from the default location.
    ///
    /// A missing file yields defaults. An explicitly given path must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Parses a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file: {:?}", path))
    }

    /// Parses config from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.subscriber_buffer == 0 {
            anyhow::bail!("subscriber_buffer must be at least 1");
        }
        if self.mailbox_capacity == 0 {
            anyhow::bail!("mailbox_capacity must be at least 1");
        }
        if self.max_duration_seconds == 0 {
            anyhow::bail!("max_duration_seconds must be at least 1");
        }
        if self.surface.enabled && self.surface.launch.iter().any(|arg| arg.is_empty()) {
            anyhow::bail!("surface.launch must not contain empty arguments");
        }
        Ok(())
    }

    /// Overrides the socket path.
    #[must_use]
    pub fn with_socket_path(mut self, socket_path: impl Into<PathBuf>) -> Self {
        self.socket_path = socket_path.into();
        self
    }
}
