//! Note translation engine
//!
//! The engine owns everything a playback session mutates: the selected
//! scale, the target window and the key actuator. Feed it one note at a
//! time from a single thread.
//!
//! ```text
//!   Idle --arm--> Armed --focus--> Playing <--poll-- Paused
//!                                     |                 ^
//!                                     +--focus lost-----+
//!                                     +--stop-----------+
//! ```

use crate::actuator::KeyActuator;
use crate::error::Result;
use crate::focus::{FocusGate, WindowId};
use crate::instrument::{self, Gesture};
use crate::range;
use crate::scale::ScaleTracker;

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No target window
    Idle,
    /// Target captured, focus not confirmed yet
    Armed,
    /// Target focused, notes are played
    Playing,
    /// Focus lost or stopped; waiting for a focus poll
    Paused,
}

/// What happened to a note handed to [`Engine::play_note`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Keys were sent for the note
    Played {
        /// Pitch after transposition
        pitch: u8,
        gesture: Gesture,
    },
    /// Out of range with transposition off
    Unplayable,
    /// Target window doesn't have focus (engine is paused)
    Unfocused,
    /// No target window armed
    NotArmed,
}

impl PlayOutcome {
    /// Whether keys were actually sent
    pub fn played(&self) -> bool {
        matches!(self, PlayOutcome::Played { .. })
    }
}

/// Translates notes into instrument key presses
pub struct Engine {
    state: EngineState,
    tracker: ScaleTracker,
    actuator: KeyActuator,
    focus: FocusGate,
}

impl Engine {
    /// Create an idle engine. The instrument is assumed to be on scale 0.
    pub fn new(actuator: KeyActuator, focus: FocusGate) -> Self {
        Self {
            state: EngineState::Idle,
            tracker: ScaleTracker::default(),
            actuator,
            focus,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Scale the instrument currently has selected
    pub fn current_scale(&self) -> usize {
        self.tracker.active()
    }

    /// Display name of the selected scale
    pub fn current_scale_name(&self) -> &'static str {
        self.tracker.active_name()
    }

    /// Tell the engine which scale the instrument is really on
    ///
    /// Use this after the scale was changed by hand in the game.
    pub fn sync_scale(&mut self, scale: usize) {
        self.tracker.reset(scale);
    }

    /// Target window, if armed
    pub fn target(&self) -> Option<WindowId> {
        self.focus.target()
    }

    /// Capture a target window
    pub fn arm_target(&mut self, window: WindowId) {
        self.focus.set_target(window);
        self.state = EngineState::Armed;
        log::info!("Armed target window {}", window);
    }

    /// Find a window by title, capture it and bring it to the front
    ///
    /// Fails with [`crate::Error::WindowNotFound`] when nothing matches.
    pub fn arm_window(&mut self, title: &str) -> Result<WindowId> {
        let window = self.focus.find(title)?;
        self.arm_target(window);
        if let Err(e) = self.focus.activate(window) {
            // playback still starts once the user focuses the window
            log::warn!("Could not activate window {}: {}", window, e);
        }
        Ok(window)
    }

    /// Drop the target window and go idle
    pub fn release_target(&mut self) {
        self.focus.clear_target();
        self.state = EngineState::Idle;
        log::info!("Released target window");
    }

    /// Stop playing until the next successful focus poll
    pub fn stop(&mut self) {
        if matches!(self.state, EngineState::Armed | EngineState::Playing) {
            self.state = EngineState::Paused;
            log::info!("Stopped");
        }
    }

    /// Re-check focus and update the state
    pub fn poll_focus(&mut self) -> EngineState {
        let focused = self.focus.is_target_focused();
        match (self.state, focused) {
            (EngineState::Armed | EngineState::Paused, true) => {
                log::info!("Target window focused, playing");
                self.state = EngineState::Playing;
            }
            (EngineState::Playing, false) => {
                log::info!("Target window lost focus, pausing");
                self.state = EngineState::Paused;
            }
            _ => {}
        }
        self.state
    }

    /// Play a note
    ///
    /// Expected non-actuation (unplayable pitch, no focus, not armed) is
    /// reported through [`PlayOutcome`]; `Err` means key injection failed.
    pub fn play_note(&mut self, pitch: u8, enable_vibrato: bool, transpose: bool) -> Result<PlayOutcome> {
        match self.state {
            EngineState::Idle => return Ok(PlayOutcome::NotArmed),
            EngineState::Paused => return Ok(PlayOutcome::Unfocused),
            EngineState::Armed | EngineState::Playing => {}
        }

        if !self.focus.is_target_focused() {
            if self.state == EngineState::Playing {
                log::info!("Target window lost focus, pausing");
                self.state = EngineState::Paused;
            }
            return Ok(PlayOutcome::Unfocused);
        }
        self.state = EngineState::Playing;

        let Some(resolved) = range::resolve(pitch, transpose) else {
            log::debug!("Dropping note {} (out of range)", pitch);
            return Ok(PlayOutcome::Unplayable);
        };
        let Some(gesture) = instrument::lookup(resolved) else {
            return Ok(PlayOutcome::Unplayable);
        };

        if resolved != pitch {
            log::debug!("Note {} -> {}: {}", pitch, resolved, gesture);
        } else {
            log::debug!("Note {}: {}", pitch, gesture);
        }
        self.actuator.play_gesture(&mut self.tracker, &gesture, enable_vibrato)?;

        Ok(PlayOutcome::Played {
            pitch: resolved,
            gesture,
        })
    }
}
