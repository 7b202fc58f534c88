//! Configuration file support for shawzin-keys
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/shawzin-keys/config.toml`
//! - macOS: `~/Library/Application Support/shawzin-keys/config.toml`
//! - Windows: `%APPDATA%\shawzin-keys\config.toml`

use crate::actuator::DEFAULT_VIBRATO_HOLD_MS;
use crate::error::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default interval between focus checks while paused
pub const DEFAULT_FOCUS_POLL_MS: u64 = 100;

/// Default pause after each synthetic key event
pub const DEFAULT_KEY_DELAY_MS: u64 = 5;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Playback behaviour
    pub playback: PlaybackSettings,
    /// Target window
    pub window: WindowSettings,
    /// Instrument key bindings
    pub keys: KeySettings,
    /// MIDI input
    pub midi: MidiSettings,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Save configuration to the default config file location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "shawzin-keys") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        Self::write_default_config_file(&path)?;
        Ok(path)
    }

    /// Write the commented default config to `path`
    pub fn write_default_config_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = r#"# shawzin-keys configuration file

[playback]
# Hold the vibrato key for notes that need it
enable_vibrato = true

# Fold notes outside the shawzin's range into its lowest/highest octave
# (when false, such notes are skipped)
transpose_notes = true

# Playback speed multiplier for MIDI files
speed = 1.0

# How often to check whether the game window is focused again (ms)
focus_poll_ms = 100

# How long the vibrato key is held (ms)
vibrato_hold_ms = 100

# Pause after every synthetic key event (ms)
key_delay_ms = 5

[window]
# Title (or part of it) of the game window
title = "Warframe"

# Only send keys while the game window has focus
check_focus = true

[keys]
# Key names: letters, digits, Left/Right/Up/Down, Space, Tab, F1-F12, Kp0-Kp9, ...
strings = ["1", "2", "3"]
frets = ["Left", "Down", "Right"]
scale = "Tab"
vibrato = "Space"

# Pressing this key anywhere stops playback
stop = "Delete"

[midi]
# Live MIDI input device (partial name match, optional)
# input_device = "Keystation"
"#;

        fs::write(path, content)?;
        Ok(())
    }
}

/// Playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Hold the vibrato key for notes that need it
    pub enable_vibrato: bool,
    /// Fold out-of-range notes into range instead of dropping them
    pub transpose_notes: bool,
    /// Playback speed multiplier
    pub speed: f64,
    /// Focus poll interval while paused, in milliseconds
    pub focus_poll_ms: u64,
    /// Vibrato hold time in milliseconds
    pub vibrato_hold_ms: u64,
    /// Pause after each synthetic key event, in milliseconds
    pub key_delay_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            enable_vibrato: true,
            transpose_notes: true,
            speed: 1.0,
            focus_poll_ms: DEFAULT_FOCUS_POLL_MS,
            vibrato_hold_ms: DEFAULT_VIBRATO_HOLD_MS,
            key_delay_ms: DEFAULT_KEY_DELAY_MS,
        }
    }
}

impl PlaybackSettings {
    pub fn focus_poll_interval(&self) -> Duration {
        Duration::from_millis(self.focus_poll_ms.max(1))
    }

    pub fn vibrato_hold(&self) -> Duration {
        Duration::from_millis(self.vibrato_hold_ms)
    }

    pub fn key_delay(&self) -> Duration {
        Duration::from_millis(self.key_delay_ms)
    }
}

/// Target window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Window title to search for
    pub title: String,
    /// Gate key output on window focus
    pub check_focus: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Warframe".to_string(),
            check_focus: true,
        }
    }
}

/// Key bindings by name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySettings {
    /// String keys, first to third
    pub strings: Vec<String>,
    /// Fret keys, first to third
    pub frets: Vec<String>,
    /// Scale advance key
    pub scale: String,
    /// Vibrato key
    pub vibrato: String,
    /// Global stop hotkey
    pub stop: String,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            strings: vec!["1".to_string(), "2".to_string(), "3".to_string()],
            frets: vec!["Left".to_string(), "Down".to_string(), "Right".to_string()],
            scale: "Tab".to_string(),
            vibrato: "Space".to_string(),
            stop: "Delete".to_string(),
        }
    }
}

/// MIDI settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiSettings {
    /// Live input device name (partial match)
    pub input_device: Option<String>,
}
