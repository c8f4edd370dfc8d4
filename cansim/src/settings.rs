//! Application settings
//!
//! Settings are read once at startup and never written back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use can_frame::ChannelInput;
use can_sched::{SendErrorPolicy, TransmitterOptions, DEFAULT_EVENT_CAPACITY};
use serde::{Deserialize, Serialize};

/// Number of channels configured when no settings file exists
pub const DEFAULT_CHANNEL_COUNT: usize = 4;

/// Frames the virtual bus keeps for inspection
pub const DEFAULT_BUS_HISTORY: usize = 1024;

/// One configured channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelSettings {
    /// Channel identifier (positive)
    pub channel_id: u16,
    /// Raw input fields for the channel
    #[serde(flatten)]
    pub input: ChannelInput,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Name of the simulated bus interface
    #[serde(default = "default_interface")]
    pub interface: String,
    /// Stop a channel on its first send failure
    #[serde(default)]
    pub stop_on_error: bool,
    /// Upper bound on a single send, in milliseconds
    #[serde(default)]
    pub send_timeout_ms: Option<u64>,
    /// Number of recent frames the virtual bus records
    #[serde(default = "default_bus_history")]
    pub bus_history: usize,
    /// Event buffer size for observers
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Channels started at launch
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelSettings>,
}

fn default_interface() -> String {
    "vcan0".to_string()
}

fn default_bus_history() -> usize {
    DEFAULT_BUS_HISTORY
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_channels() -> Vec<ChannelSettings> {
    ChannelInput::default_rows(DEFAULT_CHANNEL_COUNT)
        .into_iter()
        .zip(1u16..)
        .map(|(input, channel_id)| ChannelSettings { channel_id, input })
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            stop_on_error: false,
            send_timeout_ms: None,
            bus_history: default_bus_history(),
            event_buffer: default_event_buffer(),
            channels: default_channels(),
        }
    }
}

impl Settings {
    /// Get the XDG config directory for cansim
    /// Uses $XDG_CONFIG_HOME/cansim on Linux/macOS, falls back to ~/.config/cansim
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("cansim"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("cansim"))
    }

    /// Get the default settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Load settings from an explicit path
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Parse settings from JSON text
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Options applied to every transmitter
    pub fn transmitter_options(&self) -> TransmitterOptions {
        TransmitterOptions {
            error_policy: if self.stop_on_error {
                SendErrorPolicy::StopOnError
            } else {
                SendErrorPolicy::Continue
            },
            send_timeout: self.send_timeout_ms.map(Duration::from_millis),
        }
    }
}
