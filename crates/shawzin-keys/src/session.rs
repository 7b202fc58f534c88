//! Playback session thread
//!
//! A session owns the [`Engine`] on a dedicated thread. File playback and
//! live MIDI input both send their notes to the same session, so notes are
//! translated one at a time and the selected scale has a single owner.
//!
//! While the target window is unfocused the session polls the focus at a
//! fixed interval and reports `Paused`/`Playing` so the caller can hold and
//! resume its note source.

use crate::config::PlaybackSettings;
use crate::engine::{Engine, EngineState, PlayOutcome};
use crate::midi::NoteEvent;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Per-session playback options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    pub enable_vibrato: bool,
    pub transpose: bool,
    /// Focus poll interval while paused
    pub focus_poll: Duration,
}

impl From<&PlaybackSettings> for SessionOptions {
    fn from(settings: &PlaybackSettings) -> Self {
        Self {
            enable_vibrato: settings.enable_vibrato,
            transpose: settings.transpose_notes,
            focus_poll: settings.focus_poll_interval(),
        }
    }
}

/// Commands sent to the session thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Translate and play a note
    Note(NoteEvent),
    /// Stop playing; focus is no longer polled
    Stop,
    /// End the session
    Shutdown,
}

/// Status reported by the session thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Target window is focused, notes are played
    Playing,
    /// Target window lost focus, hold the note source
    Paused,
    /// A note was played
    Played { pitch: u8, scale: usize },
    /// A note was out of range and dropped
    Dropped { pitch: u8 },
    /// Key injection failed for a note
    Failed(String),
    /// Stopped on request
    Stopped,
}

/// Handle to a running session
pub struct Session {
    tx: Sender<SessionCommand>,
    thread: Option<JoinHandle<Engine>>,
}

impl Session {
    /// Move `engine` onto a new session thread
    pub fn spawn(engine: Engine, options: SessionOptions, status_tx: Sender<SessionStatus>) -> Self {
        let (tx, rx) = unbounded();
        let thread = thread::spawn(move || run_session(engine, options, rx, status_tx));
        Self {
            tx,
            thread: Some(thread),
        }
    }

    /// Sender for note sources
    pub fn sender(&self) -> Sender<SessionCommand> {
        self.tx.clone()
    }

    /// Queue a note
    pub fn play(&self, note: NoteEvent) {
        let _ = self.tx.send(SessionCommand::Note(note));
    }

    /// Stop playing
    pub fn stop(&self) {
        let _ = self.tx.send(SessionCommand::Stop);
    }

    /// End the session and get the engine back
    pub fn shutdown(mut self) -> Option<Engine> {
        let _ = self.tx.send(SessionCommand::Shutdown);
        self.thread.take().and_then(|handle| handle.join().ok())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.tx.send(SessionCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Session loop (runs in its own thread)
fn run_session(
    mut engine: Engine,
    options: SessionOptions,
    rx: Receiver<SessionCommand>,
    status_tx: Sender<SessionStatus>,
) -> Engine {
    let report = |status: SessionStatus| {
        let _ = status_tx.send(status);
    };

    let mut stopped = false;
    let mut last_state = engine.state();
    if last_state != EngineState::Idle {
        engine.poll_focus();
    }

    loop {
        let state = engine.state();
        if state != last_state {
            match state {
                EngineState::Playing => report(SessionStatus::Playing),
                EngineState::Paused if !stopped => report(SessionStatus::Paused),
                _ => {}
            }
            last_state = state;
        }

        let waiting = !stopped && matches!(state, EngineState::Armed | EngineState::Paused);
        let command = if waiting {
            rx.recv_timeout(options.focus_poll)
        } else {
            rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
        };

        match command {
            Ok(SessionCommand::Note(note)) => {
                if stopped || note.velocity == 0 {
                    continue;
                }
                match engine.play_note(note.pitch, options.enable_vibrato, options.transpose) {
                    Ok(PlayOutcome::Played { pitch, .. }) => report(SessionStatus::Played {
                        pitch,
                        scale: engine.current_scale(),
                    }),
                    Ok(PlayOutcome::Unplayable) => report(SessionStatus::Dropped { pitch: note.pitch }),
                    Ok(PlayOutcome::Unfocused) | Ok(PlayOutcome::NotArmed) => {}
                    Err(e) => {
                        log::error!("Failed to play note {}: {}", note.pitch, e);
                        report(SessionStatus::Failed(e.to_string()));
                    }
                }
            }
            Ok(SessionCommand::Stop) => {
                if !stopped {
                    engine.stop();
                    stopped = true;
                    report(SessionStatus::Stopped);
                }
            }
            Ok(SessionCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => return engine,
            Err(RecvTimeoutError::Timeout) => {
                engine.poll_focus();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::KeyActuator;
    use crate::focus::{FakeWindows, FocusGate, WindowId};
    use crate::keys::{KeyBindings, RecordingKeySink};
    use std::sync::Arc;

    const GAME: WindowId = WindowId(5);
    const WAIT: Duration = Duration::from_secs(2);

    fn options() -> SessionOptions {
        SessionOptions {
            enable_vibrato: true,
            transpose: false,
            focus_poll: Duration::from_millis(10),
        }
    }

    fn armed_session() -> (Session, Receiver<SessionStatus>, FakeWindows, Arc<RecordingKeySink>) {
        let sink = Arc::new(RecordingKeySink::default());
        let windows = FakeWindows::with_window("Warframe", GAME.0);
        let actuator = KeyActuator::new(sink.clone(), KeyBindings::default(), Duration::from_millis(10));
        let mut engine = Engine::new(actuator, FocusGate::new(Box::new(windows.clone())));
        engine.arm_target(GAME);

        let (status_tx, status_rx) = unbounded();
        let session = Session::spawn(engine, options(), status_tx);
        (session, status_rx, windows, sink)
    }

    fn note(pitch: u8) -> NoteEvent {
        NoteEvent { pitch, velocity: 100 }
    }

    #[test]
    fn test_waits_for_focus_then_plays() {
        let (session, status_rx, windows, _) = armed_session();
        assert!(status_rx.recv_timeout(Duration::from_millis(50)).is_err());

        windows.focus(Some(GAME));
        assert_eq!(status_rx.recv_timeout(WAIT).unwrap(), SessionStatus::Playing);

        session.play(note(60));
        assert_eq!(
            status_rx.recv_timeout(WAIT).unwrap(),
            SessionStatus::Played { pitch: 60, scale: 8 }
        );

        session.play(note(100));
        assert_eq!(
            status_rx.recv_timeout(WAIT).unwrap(),
            SessionStatus::Dropped { pitch: 100 }
        );

        let engine = session.shutdown().unwrap();
        assert_eq!(engine.current_scale(), 8);
    }

    #[test]
    fn test_pauses_and_resumes_on_focus() {
        let (session, status_rx, windows, sink) = armed_session();
        windows.focus(Some(GAME));
        assert_eq!(status_rx.recv_timeout(WAIT).unwrap(), SessionStatus::Playing);

        windows.focus(Some(WindowId(99)));
        session.play(note(48));
        assert_eq!(status_rx.recv_timeout(WAIT).unwrap(), SessionStatus::Paused);
        assert!(sink.events().is_empty());

        windows.focus(Some(GAME));
        assert_eq!(status_rx.recv_timeout(WAIT).unwrap(), SessionStatus::Playing);
    }

    #[test]
    fn test_stop_ends_polling() {
        let (session, status_rx, windows, sink) = armed_session();
        windows.focus(Some(GAME));
        assert_eq!(status_rx.recv_timeout(WAIT).unwrap(), SessionStatus::Playing);

        session.stop();
        assert_eq!(status_rx.recv_timeout(WAIT).unwrap(), SessionStatus::Stopped);

        session.play(note(48));
        assert!(status_rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_notes_from_several_sources_are_serialized() {
        let (session, status_rx, windows, _) = armed_session();
        windows.focus(Some(GAME));
        assert_eq!(status_rx.recv_timeout(WAIT).unwrap(), SessionStatus::Playing);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let tx = session.sender();
                thread::spawn(move || {
                    for pitch in [60, 71, 48] {
                        let _ = tx.send(SessionCommand::Note(note(pitch)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let played = (0..6)
            .filter(|_| {
                matches!(
                    status_rx.recv_timeout(WAIT),
                    Ok(SessionStatus::Played { .. })
                )
            })
            .count();
        assert_eq!(played, 6);

        let engine = session.shutdown().unwrap();
        assert_eq!(engine.current_scale(), 0);
    }
}
