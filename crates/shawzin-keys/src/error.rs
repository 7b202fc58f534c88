//! Error types for shawzin-keys

use thiserror::Error;

/// Result type alias for shawzin-keys operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in shawzin-keys
///
/// Unplayable notes and lost focus are not errors; they are reported
/// through [`crate::engine::PlayOutcome`].
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown key name in the key bindings
    #[error("Unknown key name: {0}")]
    UnknownKey(String),

    /// No window matched the requested title
    #[error("No window found matching '{0}'")]
    WindowNotFound(String),

    /// Window system query or activation failed
    #[error("Window system error: {0}")]
    Window(String),

    /// Synthetic key event could not be injected
    #[error("Key injection failed: {0}")]
    KeyInjection(String),

    /// MIDI device error
    #[error("MIDI error: {0}")]
    Midi(String),

    /// MIDI file parsing error
    #[error("MIDI file error: {0}")]
    MidiFile(#[from] midly::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}
