//! Key names, key bindings and synthetic key output
//!
//! Keys are identified by `rdev::Key`. Bindings are written in the config
//! file by name (`"1"`, `"Left"`, `"Space"`, ...) and parsed here.

use crate::config::KeySettings;
use crate::error::{Error, Result};
use crate::instrument::{Fret, InstrumentString};
use rdev::{simulate, EventType, Key};
use std::thread;
use std::time::Duration;

/// Parse a key name into an `rdev::Key`
///
/// Names are case-insensitive. Single letters and digits map to their key,
/// `F1`..`F12` to function keys, `Kp0`..`Kp9` to the keypad.
pub fn parse_key(name: &str) -> Result<Key> {
    let lower = name.trim().to_ascii_lowercase();
    let key = match lower.as_str() {
        "0" => Key::Num0,
        "1" => Key::Num1,
        "2" => Key::Num2,
        "3" => Key::Num3,
        "4" => Key::Num4,
        "5" => Key::Num5,
        "6" => Key::Num6,
        "7" => Key::Num7,
        "8" => Key::Num8,
        "9" => Key::Num9,
        "a" => Key::KeyA,
        "b" => Key::KeyB,
        "c" => Key::KeyC,
        "d" => Key::KeyD,
        "e" => Key::KeyE,
        "f" => Key::KeyF,
        "g" => Key::KeyG,
        "h" => Key::KeyH,
        "i" => Key::KeyI,
        "j" => Key::KeyJ,
        "k" => Key::KeyK,
        "l" => Key::KeyL,
        "m" => Key::KeyM,
        "n" => Key::KeyN,
        "o" => Key::KeyO,
        "p" => Key::KeyP,
        "q" => Key::KeyQ,
        "r" => Key::KeyR,
        "s" => Key::KeyS,
        "t" => Key::KeyT,
        "u" => Key::KeyU,
        "v" => Key::KeyV,
        "w" => Key::KeyW,
        "x" => Key::KeyX,
        "y" => Key::KeyY,
        "z" => Key::KeyZ,
        "left" | "leftarrow" => Key::LeftArrow,
        "right" | "rightarrow" => Key::RightArrow,
        "up" | "uparrow" => Key::UpArrow,
        "down" | "downarrow" => Key::DownArrow,
        "space" => Key::Space,
        "tab" => Key::Tab,
        "return" | "enter" => Key::Return,
        "escape" | "esc" => Key::Escape,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "insert" => Key::Insert,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "shift" | "shiftleft" => Key::ShiftLeft,
        "shiftright" => Key::ShiftRight,
        "ctrl" | "control" | "controlleft" => Key::ControlLeft,
        "controlright" => Key::ControlRight,
        "alt" => Key::Alt,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        "kp0" => Key::Kp0,
        "kp1" => Key::Kp1,
        "kp2" => Key::Kp2,
        "kp3" => Key::Kp3,
        "kp4" => Key::Kp4,
        "kp5" => Key::Kp5,
        "kp6" => Key::Kp6,
        "kp7" => Key::Kp7,
        "kp8" => Key::Kp8,
        "kp9" => Key::Kp9,
        _ => return Err(Error::UnknownKey(name.to_string())),
    };
    Ok(key)
}

/// Keys the instrument is played with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyBindings {
    /// String keys, first to third
    pub strings: [Key; 3],
    /// Fret keys, first to third
    pub frets: [Key; 3],
    /// Advances to the next scale
    pub scale: Key,
    /// Vibrato modifier
    pub vibrato: Key,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            strings: [Key::Num1, Key::Num2, Key::Num3],
            frets: [Key::LeftArrow, Key::DownArrow, Key::RightArrow],
            scale: Key::Tab,
            vibrato: Key::Space,
        }
    }
}

impl KeyBindings {
    /// Build bindings from the `[keys]` config section
    pub fn from_settings(settings: &KeySettings) -> Result<Self> {
        Ok(Self {
            strings: parse_three(&settings.strings, "strings")?,
            frets: parse_three(&settings.frets, "frets")?,
            scale: parse_key(&settings.scale)?,
            vibrato: parse_key(&settings.vibrato)?,
        })
    }

    /// Key that sounds a string
    pub fn string_key(&self, string: InstrumentString) -> Key {
        self.strings[string.key_index()]
    }

    /// Key held for a fret, `None` for an open string
    pub fn fret_key(&self, fret: Fret) -> Option<Key> {
        fret.key_index().map(|i| self.frets[i])
    }
}

fn parse_three(names: &[String], what: &str) -> Result<[Key; 3]> {
    match names {
        [a, b, c] => Ok([parse_key(a)?, parse_key(b)?, parse_key(c)?]),
        _ => Err(Error::Config(format!(
            "expected exactly 3 {} keys, got {}",
            what,
            names.len()
        ))),
    }
}

/// Destination for synthetic key events
pub trait KeySink: Send + Sync {
    /// Press a key
    fn press(&self, key: Key) -> Result<()>;

    /// Release a key
    fn release(&self, key: Key) -> Result<()>;

    /// Short name for logging
    fn name(&self) -> &str;
}

/// Injects key events at the OS level via `rdev::simulate`
pub struct RdevKeySink {
    /// Pause after each event so the target application can register it
    event_delay: Duration,
}

impl RdevKeySink {
    pub fn new(event_delay: Duration) -> Self {
        Self { event_delay }
    }

    fn send(&self, event: EventType) -> Result<()> {
        simulate(&event).map_err(|e| Error::KeyInjection(format!("{:?}: {:?}", event, e)))?;
        if !self.event_delay.is_zero() {
            thread::sleep(self.event_delay);
        }
        Ok(())
    }
}

impl KeySink for RdevKeySink {
    fn press(&self, key: Key) -> Result<()> {
        self.send(EventType::KeyPress(key))
    }

    fn release(&self, key: Key) -> Result<()> {
        self.send(EventType::KeyRelease(key))
    }

    fn name(&self) -> &str {
        "rdev"
    }
}

/// Logs key events without sending them (for trying out songs)
pub struct DryRunKeySink;

impl KeySink for DryRunKeySink {
    fn press(&self, key: Key) -> Result<()> {
        log::debug!("key down {:?}", key);
        Ok(())
    }

    fn release(&self, key: Key) -> Result<()> {
        log::debug!("key up {:?}", key);
        Ok(())
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}

/// Check if synthetic key events are likely to work on this system
pub fn injection_available() -> bool {
    // On Linux, rdev requires X11
    #[cfg(target_os = "linux")]
    {
        std::env::var("DISPLAY").is_ok()
    }

    #[cfg(not(target_os = "linux"))]
    {
        true
    }
}

/// Records key events in memory
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingKeySink {
    events: std::sync::Mutex<Vec<crate::actuator::KeyAction>>,
    /// Fail the n-th event (0-based) and every event after it
    pub fail_from: Option<usize>,
    /// Fail every event for this key
    pub fail_key: Option<Key>,
}

#[cfg(test)]
impl RecordingKeySink {
    pub fn failing_from(n: usize) -> Self {
        Self {
            fail_from: Some(n),
            ..Self::default()
        }
    }

    pub fn failing_key(key: Key) -> Self {
        Self {
            fail_key: Some(key),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<crate::actuator::KeyAction> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, key: Key, action: crate::actuator::KeyAction) -> Result<()> {
        let mut events = self.events.lock().unwrap();
        if self.fail_from.is_some_and(|n| events.len() >= n) || self.fail_key == Some(key) {
            return Err(Error::KeyInjection(format!("{:?}", action)));
        }
        events.push(action);
        Ok(())
    }
}

#[cfg(test)]
impl KeySink for RecordingKeySink {
    fn press(&self, key: Key) -> Result<()> {
        self.record(key, crate::actuator::KeyAction::Down(key))
    }

    fn release(&self, key: Key) -> Result<()> {
        self.record(key, crate::actuator::KeyAction::Up(key))
    }

    fn name(&self) -> &str {
        "recording"
    }
}
