//! MIDI file loading and playback
//!
//! Loads standard MIDI files (.mid) with midly, flattens the note-ons of the
//! selected tracks into one time-ordered list and plays it back on a player
//! thread at an adjustable speed.

use crate::error::Result;
use crate::midi::NoteEvent;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Tempo assumed until the first tempo event (120 BPM)
const DEFAULT_MICROS_PER_BEAT: u32 = 500_000;

/// Information about a single track in a MIDI file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    /// Track index (0-based)
    pub index: usize,
    /// Track name from MIDI meta event (if present)
    pub name: Option<String>,
    /// Number of note-on events in this track
    pub note_count: usize,
}

/// A note-on at an absolute time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedNote {
    /// Time from the start of the song
    pub time: Duration,
    /// Track the note came from
    pub track: usize,
    pub note: NoteEvent,
}

/// A parsed MIDI file
#[derive(Debug, Clone)]
pub struct Song {
    /// Song name (file name without extension)
    pub name: String,
    pub tracks: Vec<TrackInfo>,
    /// All note-ons, sorted by time
    pub notes: Vec<TimedNote>,
    /// Time of the last note-off (or last event)
    pub duration: Duration,
}

impl Song {
    /// Load a MIDI file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(&name, &data)
    }

    /// Parse MIDI file contents
    pub fn parse(name: &str, data: &[u8]) -> Result<Self> {
        let smf = Smf::parse(data)?;
        let clock = TempoMap::from_smf(&smf);

        let mut tracks = Vec::with_capacity(smf.tracks.len());
        let mut notes = Vec::new();
        let mut duration = Duration::ZERO;

        for (index, track) in smf.tracks.iter().enumerate() {
            let mut track_name = None;
            let mut note_count = 0;
            let mut tick: u64 = 0;
            let mut last_off = None;

            for event in track {
                tick += event.delta.as_int() as u64;
                match event.kind {
                    TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
                        if let Ok(n) = std::str::from_utf8(bytes) {
                            track_name = Some(n.trim().to_string());
                        }
                    }
                    TrackEventKind::Midi { message, .. } => match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            note_count += 1;
                            notes.push(TimedNote {
                                time: clock.time_at(tick),
                                track: index,
                                note: NoteEvent {
                                    pitch: key.as_int(),
                                    velocity: vel.as_int(),
                                },
                            });
                        }
                        MidiMessage::NoteOn { .. } | MidiMessage::NoteOff { .. } => {
                            last_off = Some(tick);
                        }
                        _ => {}
                    },
                    _ => {}
                }
            }

            let end = clock.time_at(last_off.unwrap_or(tick));
            duration = duration.max(end);
            tracks.push(TrackInfo {
                index,
                name: track_name,
                note_count,
            });
        }

        // stable sort keeps same-time notes in track order
        notes.sort_by_key(|n| n.time);

        log::debug!(
            "Parsed '{}': {} tracks, {} notes, {:.1}s",
            name,
            tracks.len(),
            notes.len(),
            duration.as_secs_f64()
        );

        Ok(Self {
            name: name.to_string(),
            tracks,
            notes,
            duration,
        })
    }

    /// Notes of the selected tracks; an empty selection means all tracks
    pub fn notes_for(&self, selected: &[usize]) -> Vec<TimedNote> {
        self.notes
            .iter()
            .filter(|n| selected.is_empty() || selected.contains(&n.track))
            .copied()
            .collect()
    }

    /// Tracks that contain notes
    pub fn playable_tracks(&self) -> impl Iterator<Item = &TrackInfo> {
        self.tracks.iter().filter(|t| t.note_count > 0)
    }
}

/// Converts ticks to wall time
struct TempoMap {
    timing: Timing,
    /// (tick, microseconds per beat), sorted by tick
    changes: Vec<(u64, u32)>,
}

impl TempoMap {
    fn from_smf(smf: &Smf) -> Self {
        let mut changes = Vec::new();
        for track in &smf.tracks {
            let mut tick: u64 = 0;
            for event in track {
                tick += event.delta.as_int() as u64;
                if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                    changes.push((tick, tempo.as_int()));
                }
            }
        }
        changes.sort_by_key(|&(tick, _)| tick);
        Self {
            timing: smf.header.timing,
            changes,
        }
    }

    fn time_at(&self, tick: u64) -> Duration {
        match self.timing {
            Timing::Metrical(tpb) => {
                let tpb = tpb.as_int().max(1) as f64;
                let mut micros = 0.0;
                let mut last_tick = 0;
                let mut tempo = DEFAULT_MICROS_PER_BEAT;
                for &(change_tick, change_tempo) in &self.changes {
                    if change_tick >= tick {
                        break;
                    }
                    micros += (change_tick - last_tick) as f64 * tempo as f64 / tpb;
                    last_tick = change_tick;
                    tempo = change_tempo;
                }
                micros += (tick - last_tick) as f64 * tempo as f64 / tpb;
                Duration::from_secs_f64(micros / 1_000_000.0)
            }
            Timing::Timecode(fps, ticks_per_frame) => {
                let ticks_per_second = (fps.as_f32() * ticks_per_frame as f32).max(1.0) as f64;
                Duration::from_secs_f64(tick as f64 / ticks_per_second)
            }
        }
    }
}

/// Events reported by the player thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// A note is due
    Note(NoteEvent),
    /// All notes were played
    Finished,
}

enum PlayerCommand {
    Pause,
    Resume,
    Stop,
}

/// Plays a list of timed notes on its own thread
pub struct Player {
    tx: Sender<PlayerCommand>,
    /// Song position in microseconds
    position: Arc<AtomicU64>,
    duration: Duration,
    thread: Option<JoinHandle<()>>,
}

impl Player {
    /// Start playing `notes` (sorted by time) at `speed`, calling `on_event`
    /// from the player thread
    pub fn start<F>(notes: Vec<TimedNote>, speed: f64, on_event: F) -> Self
    where
        F: FnMut(PlayerEvent) + Send + 'static,
    {
        Self::spawn(notes, speed, false, on_event)
    }

    /// Like [`Player::start`], but wait for [`Player::resume`] before the first note
    pub fn paused<F>(notes: Vec<TimedNote>, speed: f64, on_event: F) -> Self
    where
        F: FnMut(PlayerEvent) + Send + 'static,
    {
        Self::spawn(notes, speed, true, on_event)
    }

    fn spawn<F>(notes: Vec<TimedNote>, speed: f64, paused: bool, on_event: F) -> Self
    where
        F: FnMut(PlayerEvent) + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let position = Arc::new(AtomicU64::new(0));
        let duration = notes.last().map(|n| n.time).unwrap_or_default();
        let speed = if speed.is_finite() && speed > 0.0 { speed } else { 1.0 };

        let thread_position = position.clone();
        let thread = thread::spawn(move || {
            run_player(notes, speed, paused, rx, thread_position, on_event);
        });

        Self {
            tx,
            position,
            duration,
            thread: Some(thread),
        }
    }

    pub fn pause(&self) {
        let _ = self.tx.send(PlayerCommand::Pause);
    }

    pub fn resume(&self) {
        let _ = self.tx.send(PlayerCommand::Resume);
    }

    /// Current song position
    pub fn position(&self) -> Duration {
        Duration::from_micros(self.position.load(Ordering::Relaxed))
    }

    /// Time of the last note
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Stop playback and wait for the player thread
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.tx.send(PlayerCommand::Stop);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Player loop (runs in its own thread)
fn run_player<F>(
    notes: Vec<TimedNote>,
    speed: f64,
    mut paused: bool,
    rx: Receiver<PlayerCommand>,
    position: Arc<AtomicU64>,
    mut on_event: F,
) where
    F: FnMut(PlayerEvent),
{
    let mut song_pos = Duration::ZERO;
    let mut anchor = Instant::now();
    let mut next = 0;

    while next < notes.len() {
        if paused {
            match rx.recv() {
                Ok(PlayerCommand::Resume) => {
                    paused = false;
                    anchor = Instant::now();
                }
                Ok(PlayerCommand::Pause) => {}
                Ok(PlayerCommand::Stop) | Err(_) => return,
            }
            continue;
        }

        let now = Instant::now();
        song_pos += now.duration_since(anchor).mul_f64(speed);
        anchor = now;
        position.store(song_pos.as_micros() as u64, Ordering::Relaxed);

        let due = notes[next].time;
        if due <= song_pos {
            on_event(PlayerEvent::Note(notes[next].note));
            next += 1;
            continue;
        }

        match rx.recv_timeout((due - song_pos).div_f64(speed)) {
            Ok(PlayerCommand::Pause) => {
                let now = Instant::now();
                song_pos += now.duration_since(anchor).mul_f64(speed);
                anchor = now;
                position.store(song_pos.as_micros() as u64, Ordering::Relaxed);
                paused = true;
            }
            Ok(PlayerCommand::Resume) | Err(RecvTimeoutError::Timeout) => {}
            Ok(PlayerCommand::Stop) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }

    on_event(PlayerEvent::Finished);
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{Format, Header, TrackEvent};
    use std::sync::Mutex;

    fn note_on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(vel),
                },
            },
        }
    }

    fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Meta(message),
        }
    }

    /// Two tracks at 480 ticks per beat; tempo doubles after beat 2
    fn test_file() -> Vec<u8> {
        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(480))));
        smf.tracks.push(vec![
            meta(0, MetaMessage::TrackName(b"Lead")),
            meta(0, MetaMessage::Tempo(u24::new(500_000))),
            note_on(0, 60, 100),
            note_on(480, 60, 0),
            note_on(0, 62, 90),
            meta(480, MetaMessage::Tempo(u24::new(250_000))),
            note_on(0, 62, 0),
            note_on(0, 64, 80),
            note_on(480, 64, 0),
            meta(0, MetaMessage::EndOfTrack),
        ]);
        smf.tracks.push(vec![
            meta(0, MetaMessage::TrackName(b"Bass")),
            note_on(240, 36, 70),
            note_on(240, 36, 0),
            meta(0, MetaMessage::EndOfTrack),
        ]);
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_parse_tracks_and_notes() {
        let song = Song::parse("test", &test_file()).unwrap();

        assert_eq!(song.tracks.len(), 2);
        assert_eq!(song.tracks[0].name.as_deref(), Some("Lead"));
        assert_eq!(song.tracks[0].note_count, 3);
        assert_eq!(song.tracks[1].name.as_deref(), Some("Bass"));
        assert_eq!(song.tracks[1].note_count, 1);

        let pitches: Vec<u8> = song.notes.iter().map(|n| n.note.pitch).collect();
        assert_eq!(pitches, vec![60, 36, 62, 64]);
    }

    #[test]
    fn test_tempo_map() {
        let song = Song::parse("test", &test_file()).unwrap();
        let times: Vec<u128> = song.notes.iter().map(|n| n.time.as_millis()).collect();
        // 120 BPM for two beats, then 240 BPM
        assert_eq!(times, vec![0, 250, 500, 1000]);
        assert_eq!(song.duration.as_millis(), 1250);
    }

    #[test]
    fn test_track_selection() {
        let song = Song::parse("test", &test_file()).unwrap();
        assert_eq!(song.notes_for(&[]).len(), 4);
        let bass = song.notes_for(&[1]);
        assert_eq!(bass.len(), 1);
        assert_eq!(bass[0].note.pitch, 36);
    }

    #[test]
    fn test_zero_velocity_never_emitted() {
        let song = Song::parse("test", &test_file()).unwrap();
        assert!(song.notes.iter().all(|n| n.note.velocity > 0));
    }

    #[test]
    fn test_invalid_file() {
        assert!(matches!(
            Song::parse("bad", b"not a midi file"),
            Err(crate::Error::MidiFile(_))
        ));
    }

    fn collect_player(notes: Vec<TimedNote>, speed: f64) -> (Player, Arc<Mutex<Vec<PlayerEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let player = Player::start(notes, speed, move |e| sink.lock().unwrap().push(e));
        (player, events)
    }

    fn timed(ms: u64, pitch: u8) -> TimedNote {
        TimedNote {
            time: Duration::from_millis(ms),
            track: 0,
            note: NoteEvent { pitch, velocity: 100 },
        }
    }

    #[test]
    fn test_player_plays_in_order_and_finishes() {
        let (_player, events) = collect_player(vec![timed(0, 60), timed(20, 62), timed(40, 64)], 2.0);
        thread::sleep(Duration::from_millis(200));

        let events = events.lock().unwrap().clone();
        let pitches: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                PlayerEvent::Note(n) => Some(n.pitch),
                PlayerEvent::Finished => None,
            })
            .collect();
        assert_eq!(pitches, vec![60, 62, 64]);
        assert_eq!(events.last(), Some(&PlayerEvent::Finished));
    }

    #[test]
    fn test_player_pause_and_resume() {
        let (player, events) = collect_player(vec![timed(0, 60), timed(100, 62)], 1.0);
        thread::sleep(Duration::from_millis(30));
        player.pause();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(events.lock().unwrap().len(), 1);

        let paused_at = player.position();
        assert!(paused_at < Duration::from_millis(100));

        player.resume();
        thread::sleep(Duration::from_millis(250));
        assert_eq!(events.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_player_starts_paused() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let player = Player::paused(vec![timed(0, 60)], 1.0, move |e| sink.lock().unwrap().push(e));
        thread::sleep(Duration::from_millis(50));
        assert!(events.lock().unwrap().is_empty());

        player.resume();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_player_stop() {
        let (player, events) = collect_player(vec![timed(0, 60), timed(5_000, 62)], 1.0);
        thread::sleep(Duration::from_millis(30));
        player.stop();
        assert_eq!(*events.lock().unwrap(), vec![PlayerEvent::Note(NoteEvent { pitch: 60, velocity: 100 })]);
    }
}
