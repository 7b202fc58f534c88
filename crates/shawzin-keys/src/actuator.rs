//! Key actuation for instrument gestures
//!
//! Turns a [`Gesture`] into the ordered key events the game expects:
//!
//! ```text
//!   scale  tap x N      (until the gesture's scale is selected)
//!   vibrato down        (released 100ms later by the scheduler)
//!   fret   down
//!   string down/up
//!   fret   up
//! ```
//!
//! Vibrato releases run on a scheduler thread owned by the actuator, so the
//! caller never waits for them.

use crate::error::Result;
use crate::instrument::Gesture;
use crate::keys::{KeyBindings, KeySink};
use crate::scale::ScaleTracker;
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use rdev::Key;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default vibrato hold time in milliseconds
pub const DEFAULT_VIBRATO_HOLD_MS: u64 = 100;

/// A single step of a key sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyAction {
    /// Press a key and keep it down
    Down(Key),
    /// Release a key
    Up(Key),
    /// Press and immediately release
    Tap(Key),
    /// Press now, release after the duration without blocking
    HoldThenRelease(Key, Duration),
}

/// Latest press generation per held key
type HeldKeys = Arc<Mutex<Vec<(Key, u64)>>>;

/// Issues key events for gestures
pub struct KeyActuator {
    sink: Arc<dyn KeySink>,
    bindings: KeyBindings,
    vibrato_hold: Duration,
    held: HeldKeys,
    next_generation: u64,
    scheduler_tx: Sender<SchedulerCommand>,
    scheduler: Option<JoinHandle<()>>,
}

impl KeyActuator {
    /// Create an actuator and start its release scheduler
    pub fn new(sink: Arc<dyn KeySink>, bindings: KeyBindings, vibrato_hold: Duration) -> Self {
        let (tx, rx) = unbounded();
        let held: HeldKeys = Arc::new(Mutex::new(Vec::new()));

        let thread_sink = sink.clone();
        let thread_held = held.clone();
        let scheduler = thread::spawn(move || {
            run_scheduler(rx, thread_sink, thread_held);
        });

        Self {
            sink,
            bindings,
            vibrato_hold,
            held,
            next_generation: 0,
            scheduler_tx: tx,
            scheduler: Some(scheduler),
        }
    }

    /// Key bindings in use
    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    /// Press a key
    pub fn down(&self, key: Key) -> Result<()> {
        self.sink.press(key)
    }

    /// Release a key
    pub fn up(&self, key: Key) -> Result<()> {
        self.sink.release(key)
    }

    /// Press and release a key
    pub fn tap(&self, key: Key) -> Result<()> {
        self.sink.press(key)?;
        self.sink.release(key)
    }

    /// Press a key now and release it after `duration`
    ///
    /// Returns as soon as the key is down. If the same key is pressed again
    /// before the release fires, only the newest press is released.
    pub fn hold_then_release(&mut self, key: Key, duration: Duration) -> Result<()> {
        self.next_generation += 1;
        let generation = self.next_generation;
        {
            // hold the lock across the press so an older release can't land in between
            let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
            self.sink.press(key)?;
            match held.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = generation,
                None => held.push((key, generation)),
            }
        }

        let release = PendingRelease {
            key,
            due: Instant::now() + duration,
            generation,
        };
        if self.scheduler_tx.send(SchedulerCommand::Schedule(release)).is_err() {
            // scheduler is gone, don't leave the key stuck
            log::warn!("Release scheduler stopped, releasing {:?} immediately", key);
            self.sink.release(key)?;
        }
        Ok(())
    }

    /// Perform one action
    pub fn perform(&mut self, action: KeyAction) -> Result<()> {
        match action {
            KeyAction::Down(key) => self.down(key),
            KeyAction::Up(key) => self.up(key),
            KeyAction::Tap(key) => self.tap(key),
            KeyAction::HoldThenRelease(key, duration) => self.hold_then_release(key, duration),
        }
    }

    /// Actions that sound a gesture once its scale is selected
    pub fn note_actions(&self, gesture: &Gesture, enable_vibrato: bool) -> Vec<KeyAction> {
        let mut actions = Vec::with_capacity(4);
        if gesture.vibrato && enable_vibrato {
            actions.push(KeyAction::HoldThenRelease(self.bindings.vibrato, self.vibrato_hold));
        }
        let fret_key = self.bindings.fret_key(gesture.fret);
        if let Some(key) = fret_key {
            actions.push(KeyAction::Down(key));
        }
        actions.push(KeyAction::Tap(self.bindings.string_key(gesture.string)));
        if let Some(key) = fret_key {
            actions.push(KeyAction::Up(key));
        }
        actions
    }

    /// Play a gesture: select its scale, then sound the note
    ///
    /// The tracker only advances for scale taps that were actually sent.
    /// A held fret is released even when the string tap fails.
    pub fn play_gesture(
        &mut self,
        tracker: &mut ScaleTracker,
        gesture: &Gesture,
        enable_vibrato: bool,
    ) -> Result<()> {
        let scale_key = self.bindings.scale;
        let taps = tracker.advance_with(gesture.scale, || self.tap(scale_key))?;
        if taps > 0 {
            log::debug!("Advanced {} scale(s) to {}", taps, tracker.active_name());
        }

        let mut held_fret = None;
        for action in self.note_actions(gesture, enable_vibrato) {
            let result = self.perform(action);
            if result.is_err() {
                if let Some(key) = held_fret {
                    let _ = self.up(key);
                }
                return result;
            }
            match action {
                KeyAction::Down(key) => held_fret = Some(key),
                KeyAction::Up(_) => held_fret = None,
                _ => {}
            }
        }
        Ok(())
    }
}

impl Drop for KeyActuator {
    fn drop(&mut self) {
        let _ = self.scheduler_tx.send(SchedulerCommand::Shutdown);
        if let Some(handle) = self.scheduler.take() {
            let _ = handle.join();
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingRelease {
    key: Key,
    due: Instant,
    generation: u64,
}

enum SchedulerCommand {
    Schedule(PendingRelease),
    Shutdown,
}

/// Release scheduler loop (runs in its own thread)
fn run_scheduler(
    rx: crossbeam_channel::Receiver<SchedulerCommand>,
    sink: Arc<dyn KeySink>,
    held: HeldKeys,
) {
    let mut pending: Vec<PendingRelease> = Vec::new();

    loop {
        let next_due = pending.iter().map(|p| p.due).min();
        let command = match next_due {
            Some(due) => rx.recv_timeout(due.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match command {
            Ok(SchedulerCommand::Schedule(release)) => pending.push(release),
            Ok(SchedulerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                // Tearing down: lift everything still held right away
                for release in pending.drain(..) {
                    fire(&release, sink.as_ref(), &held);
                }
                return;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        let now = Instant::now();
        let (due, waiting): (Vec<_>, Vec<_>) = pending.drain(..).partition(|p| p.due <= now);
        pending = waiting;
        for release in due {
            fire(&release, sink.as_ref(), &held);
        }
    }
}

/// Release a key unless a newer press has taken it over
fn fire(release: &PendingRelease, sink: &dyn KeySink, held: &HeldKeys) {
    let mut held = held.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(index) = held
        .iter()
        .position(|&(key, generation)| key == release.key && generation == release.generation)
    else {
        return;
    };
    held.swap_remove(index);
    if let Err(e) = sink.release(release.key) {
        log::error!("Failed to release {:?}: {}", release.key, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{self, Fret, InstrumentString};
    use crate::keys::RecordingKeySink;

    fn actuator(sink: Arc<RecordingKeySink>, hold_ms: u64) -> KeyActuator {
        KeyActuator::new(sink, KeyBindings::default(), Duration::from_millis(hold_ms))
    }

    #[test]
    fn test_open_string_has_no_fret() {
        let sink = Arc::new(RecordingKeySink::default());
        let mut act = actuator(sink.clone(), 10);
        let mut tracker = ScaleTracker::default();

        let gesture = instrument::lookup(48).unwrap();
        assert_eq!(gesture.fret, Fret::Open);
        act.play_gesture(&mut tracker, &gesture, true).unwrap();

        assert_eq!(
            sink.events(),
            vec![KeyAction::Down(Key::Num1), KeyAction::Up(Key::Num1)]
        );
    }

    #[test]
    fn test_pitch_60_sequence() {
        let sink = Arc::new(RecordingKeySink::default());
        let mut act = actuator(sink.clone(), 10);
        let mut tracker = ScaleTracker::new(0);

        let gesture = instrument::lookup(60).unwrap();
        act.play_gesture(&mut tracker, &gesture, true).unwrap();

        let mut expected = Vec::new();
        for _ in 0..8 {
            expected.push(KeyAction::Down(Key::Tab));
            expected.push(KeyAction::Up(Key::Tab));
        }
        expected.extend([
            KeyAction::Down(Key::LeftArrow),
            KeyAction::Down(Key::Num3),
            KeyAction::Up(Key::Num3),
            KeyAction::Up(Key::LeftArrow),
        ]);
        assert_eq!(sink.events(), expected);
        assert_eq!(tracker.active(), 8);
    }

    #[test]
    fn test_vibrato_held_before_fret_and_released_later() {
        let sink = Arc::new(RecordingKeySink::default());
        let mut act = actuator(sink.clone(), 20);
        let mut tracker = ScaleTracker::new(4);

        let gesture = instrument::lookup(71).unwrap();
        act.play_gesture(&mut tracker, &gesture, true).unwrap();

        assert_eq!(
            sink.events(),
            vec![
                KeyAction::Down(Key::Space),
                KeyAction::Down(Key::RightArrow),
                KeyAction::Down(Key::Num2),
                KeyAction::Up(Key::Num2),
                KeyAction::Up(Key::RightArrow),
            ]
        );

        thread::sleep(Duration::from_millis(150));
        assert_eq!(sink.events().last(), Some(&KeyAction::Up(Key::Space)));
    }

    #[test]
    fn test_vibrato_disabled() {
        let sink = Arc::new(RecordingKeySink::default());
        let act = actuator(sink, 10);
        let gesture = instrument::lookup(71).unwrap();
        let actions = act.note_actions(&gesture, false);
        assert!(!actions
            .iter()
            .any(|a| matches!(a, KeyAction::HoldThenRelease(..))));
    }

    #[test]
    fn test_newer_hold_is_not_cut_short() {
        let sink = Arc::new(RecordingKeySink::default());
        let mut act = actuator(sink.clone(), 0);

        act.hold_then_release(Key::Space, Duration::from_millis(30)).unwrap();
        thread::sleep(Duration::from_millis(10));
        act.hold_then_release(Key::Space, Duration::from_millis(200)).unwrap();

        // first release is due now but belongs to the older press
        thread::sleep(Duration::from_millis(60));
        let ups = sink
            .events()
            .iter()
            .filter(|a| **a == KeyAction::Up(Key::Space))
            .count();
        assert_eq!(ups, 0);

        thread::sleep(Duration::from_millis(250));
        assert_eq!(
            sink.events(),
            vec![
                KeyAction::Down(Key::Space),
                KeyAction::Down(Key::Space),
                KeyAction::Up(Key::Space),
            ]
        );
    }

    #[test]
    fn test_drop_releases_pending_holds() {
        let sink = Arc::new(RecordingKeySink::default());
        {
            let mut act = actuator(sink.clone(), 0);
            act.hold_then_release(Key::Space, Duration::from_secs(60)).unwrap();
        }
        assert_eq!(
            sink.events(),
            vec![KeyAction::Down(Key::Space), KeyAction::Up(Key::Space)]
        );
    }

    #[test]
    fn test_failed_scale_tap_keeps_tracker_consistent() {
        // third event fails: one full scale tap (down+up) goes through
        let sink = Arc::new(RecordingKeySink::failing_from(2));
        let mut act = actuator(sink.clone(), 10);
        let mut tracker = ScaleTracker::new(0);

        let gesture = instrument::lookup(60).unwrap();
        assert!(act.play_gesture(&mut tracker, &gesture, true).is_err());
        assert_eq!(tracker.active(), 1);
    }

    #[test]
    fn test_failed_string_tap_releases_fret() {
        let gesture = Gesture {
            scale: 0,
            fret: Fret::Second,
            string: InstrumentString::First,
            vibrato: false,
        };
        let sink = Arc::new(RecordingKeySink::failing_key(Key::Num1));
        let mut act = actuator(sink.clone(), 10);
        let mut tracker = ScaleTracker::new(0);

        assert!(act.play_gesture(&mut tracker, &gesture, false).is_err());
        assert_eq!(
            sink.events(),
            vec![KeyAction::Down(Key::DownArrow), KeyAction::Up(Key::DownArrow)]
        );
    }
}
