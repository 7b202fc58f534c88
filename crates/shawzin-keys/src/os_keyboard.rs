//! Global stop hotkey using rdev
//!
//! During playback the game window has focus, so the terminal never sees
//! key presses. This listener watches key presses at the OS level and
//! reports the configured stop key.

use crossbeam_channel::{unbounded, Receiver, Sender};
use rdev::{listen, Event, EventType, Key};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// OS-level listener for a single hotkey
pub struct HotkeyListener {
    /// Receives one message per hotkey press
    event_rx: Receiver<()>,
    /// Shutdown flag
    shutdown: Arc<AtomicBool>,
    /// Listener thread handle
    _thread: JoinHandle<()>,
}

impl HotkeyListener {
    /// Start listening for `hotkey`
    ///
    /// Returns None if the listener couldn't be started (e.g., on systems without X11)
    pub fn new(hotkey: Key) -> Option<Self> {
        if !crate::keys::injection_available() {
            return None;
        }

        let (tx, rx) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let thread = thread::spawn(move || {
            run_listener(hotkey, tx, shutdown_clone);
        });

        Some(Self {
            event_rx: rx,
            shutdown,
            _thread: thread,
        })
    }

    /// Receiver for use in select!
    pub fn receiver(&self) -> &Receiver<()> {
        &self.event_rx
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Whether an OS event is a press of `hotkey`
fn is_hotkey_press(event: &EventType, hotkey: Key) -> bool {
    matches!(event, EventType::KeyPress(key) if *key == hotkey)
}

/// Run the rdev listener (blocking - runs in its own thread)
fn run_listener(hotkey: Key, tx: Sender<()>, shutdown: Arc<AtomicBool>) {
    let callback = move |event: Event| {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        if is_hotkey_press(&event.event_type, hotkey) {
            let _ = tx.send(());
        }
    };

    // This blocks until an error occurs
    if let Err(e) = listen(callback) {
        log::error!("OS keyboard listener error: {:?}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hotkey_matching() {
        assert!(is_hotkey_press(&EventType::KeyPress(Key::Delete), Key::Delete));
        assert!(!is_hotkey_press(&EventType::KeyRelease(Key::Delete), Key::Delete));
        assert!(!is_hotkey_press(&EventType::KeyPress(Key::Num1), Key::Delete));
    }
}
