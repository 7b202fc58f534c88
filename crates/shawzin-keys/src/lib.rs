//! shawzin-keys - Play MIDI on the Warframe shawzin
//!
//! Translates MIDI notes into the key gestures the in-game shawzin expects
//! (scale, fret, string, vibrato) and sends them as synthetic key presses
//! while the game window has focus.
//!
//! - Fixed pitch table covering MIDI 48-75 across nine scales
//! - Out-of-range notes folded into range by octave (optional)
//! - Scale tracking with the fewest scale-key taps
//! - Focus gating with automatic pause and resume
//! - MIDI file playback and live MIDI input
//! - Configurable via TOML file
//!
//! # Usage as a Library
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use shawzin_keys::{
//!     DryRunKeySink, Engine, FocusGate, KeyActuator, KeyBindings, UncheckedWindows,
//! };
//!
//! let actuator = KeyActuator::new(
//!     Arc::new(DryRunKeySink),
//!     KeyBindings::default(),
//!     Duration::from_millis(100),
//! );
//! let mut engine = Engine::new(actuator, FocusGate::new(Box::new(UncheckedWindows)));
//! engine.arm_window("Warframe")?;
//! engine.poll_focus();
//!
//! let outcome = engine.play_note(60, true, true)?;
//! println!("{:?}, now on {}", outcome, engine.current_scale_name());
//! # Ok::<(), shawzin_keys::Error>(())
//! ```

pub mod actuator;
pub mod config;
pub mod engine;
pub mod error;
pub mod focus;
pub mod instrument;
pub mod keys;
pub mod midi;
pub mod os_keyboard;
pub mod playback;
pub mod range;
pub mod scale;
pub mod session;

// Re-export main types
pub use actuator::{KeyAction, KeyActuator};
pub use config::Config;
pub use engine::{Engine, EngineState, PlayOutcome};
pub use error::{Error, Result};
pub use focus::{FocusGate, UncheckedWindows, WindowId, WindowSystem, XdotoolWindows};
pub use instrument::{lookup, Fret, Gesture, InstrumentString, HIGHEST_PITCH, LOWEST_PITCH, SCALE_NAMES};
pub use keys::{parse_key, DryRunKeySink, KeyBindings, KeySink, RdevKeySink};
pub use midi::{LiveInput, NoteEvent};
pub use os_keyboard::HotkeyListener;
pub use playback::{Player, PlayerEvent, Song};
pub use scale::ScaleTracker;
pub use session::{Session, SessionCommand, SessionOptions, SessionStatus};
