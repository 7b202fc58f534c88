//! Shawzin instrument layout
//!
//! The shawzin sounds a note by tapping one of three strings, optionally
//! while holding one of three frets. Which pitch comes out depends on the
//! currently selected scale, and some pitches additionally need the vibrato
//! modifier held. This module holds the fixed table from MIDI pitch to the
//! gesture the instrument needs for it.
//!
//! ```text
//!  pitch  scale  fret  string  vibrato
//!   48      0     -      1
//!   60      8     1      3
//!   71      4     3      2        ~
//!   75      0     3      3        ~
//! ```

/// Lowest directly playable MIDI pitch (C3)
pub const LOWEST_PITCH: u8 = 48;

/// Highest directly playable MIDI pitch (D#5)
pub const HIGHEST_PITCH: u8 = 75;

/// Number of scales the instrument rotates through
pub const SCALE_COUNT: usize = 9;

/// Display names of the scales, indexed by scale number
pub const SCALE_NAMES: [&str; SCALE_COUNT] = [
    "Pentatonic Minor",
    "Pentatonic Major",
    "Chromatic",
    "Hexatonic",
    "Major",
    "Minor",
    "Hirajoshi",
    "Phrygian Dominant",
    "Yo",
];

/// Fret held while tapping a string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fret {
    /// No fret held (open string)
    Open,
    First,
    Second,
    Third,
}

impl Fret {
    /// Fret number as used in the layout table (0 = open)
    pub fn number(self) -> u8 {
        match self {
            Fret::Open => 0,
            Fret::First => 1,
            Fret::Second => 2,
            Fret::Third => 3,
        }
    }

    /// Index into the three fret key bindings, `None` for an open string
    pub fn key_index(self) -> Option<usize> {
        match self {
            Fret::Open => None,
            fret => Some(fret.number() as usize - 1),
        }
    }
}

/// One of the three strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentString {
    First,
    Second,
    Third,
}

impl InstrumentString {
    /// String number as used in the layout table (1-based)
    pub fn number(self) -> u8 {
        match self {
            InstrumentString::First => 1,
            InstrumentString::Second => 2,
            InstrumentString::Third => 3,
        }
    }

    /// Index into the three string key bindings
    pub fn key_index(self) -> usize {
        self.number() as usize - 1
    }
}

/// Everything the instrument needs to sound one pitch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gesture {
    /// Scale that must be selected (0..SCALE_COUNT)
    pub scale: usize,
    /// Fret to hold
    pub fret: Fret,
    /// String to tap
    pub string: InstrumentString,
    /// Whether the vibrato modifier is part of the note
    pub vibrato: bool,
}

impl Gesture {
    const fn new(scale: usize, fret: Fret, string: InstrumentString, vibrato: bool) -> Self {
        Self { scale, fret, string, vibrato }
    }

    /// Name of the scale this gesture is played in
    pub fn scale_name(&self) -> &'static str {
        SCALE_NAMES[self.scale]
    }
}

impl std::fmt::Display for Gesture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scale {} ({}), fret {}, string {}{}",
            self.scale,
            self.scale_name(),
            self.fret.number(),
            self.string.number(),
            if self.vibrato { ", vibrato" } else { "" }
        )
    }
}

use Fret::{First as F1, Open as F0, Second as F2, Third as F3};
use InstrumentString::{First as S1, Second as S2, Third as S3};

/// Gestures for LOWEST_PITCH..=HIGHEST_PITCH, in pitch order.
///
/// These are the positions the game expects; they must not be reordered.
static GESTURES: [Gesture; (HIGHEST_PITCH - LOWEST_PITCH + 1) as usize] = [
    Gesture::new(0, F0, S1, false), // 48 C3
    Gesture::new(2, F0, S2, false), // 49 C#3
    Gesture::new(2, F0, S3, false), // 50 D3
    Gesture::new(0, F0, S2, false), // 51 D#3
    Gesture::new(1, F0, S3, false), // 52 E3
    Gesture::new(0, F0, S3, false), // 53 F3
    Gesture::new(2, F1, S3, false), // 54 F#3
    Gesture::new(0, F1, S1, false), // 55 G3
    Gesture::new(2, F2, S1, false), // 56 G#3
    Gesture::new(1, F1, S2, false), // 57 A3
    Gesture::new(0, F1, S2, false), // 58 A#3
    Gesture::new(4, F1, S3, true),  // 59 B3
    Gesture::new(8, F1, S3, false), // 60 C4
    Gesture::new(2, F2, S3, false), // 61 C#4
    Gesture::new(0, F2, S1, false), // 62 D4
    Gesture::new(0, F2, S2, false), // 63 D#4
    Gesture::new(1, F2, S3, false), // 64 E4
    Gesture::new(0, F2, S3, false), // 65 F4
    Gesture::new(6, F2, S2, true),  // 66 F#4
    Gesture::new(0, F3, S1, false), // 67 G4
    Gesture::new(7, F3, S1, false), // 68 G#4
    Gesture::new(1, F3, S2, false), // 69 A4
    Gesture::new(0, F3, S2, false), // 70 A#4
    Gesture::new(4, F3, S2, true),  // 71 B4
    Gesture::new(0, F3, S3, false), // 72 C5
    Gesture::new(7, F3, S3, true),  // 73 C#5
    Gesture::new(1, F3, S3, true),  // 74 D5
    Gesture::new(0, F3, S3, true),  // 75 D#5
];

/// Look up the gesture for a pitch
///
/// Returns `None` for pitches outside `LOWEST_PITCH..=HIGHEST_PITCH`; use
/// [`crate::range::resolve`] first to fold such pitches into range.
pub fn lookup(pitch: u8) -> Option<Gesture> {
    if !is_playable(pitch) {
        return None;
    }
    GESTURES.get((pitch - LOWEST_PITCH) as usize).copied()
}

/// Whether a pitch can be played without transposition
pub fn is_playable(pitch: u8) -> bool {
    (LOWEST_PITCH..=HIGHEST_PITCH).contains(&pitch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_table() {
        // (pitch, scale, fret, string, vibrato)
        let expected: [(u8, usize, u8, u8, bool); 28] = [
            (48, 0, 0, 1, false),
            (49, 2, 0, 2, false),
            (50, 2, 0, 3, false),
            (51, 0, 0, 2, false),
            (52, 1, 0, 3, false),
            (53, 0, 0, 3, false),
            (54, 2, 1, 3, false),
            (55, 0, 1, 1, false),
            (56, 2, 2, 1, false),
            (57, 1, 1, 2, false),
            (58, 0, 1, 2, false),
            (59, 4, 1, 3, true),
            (60, 8, 1, 3, false),
            (61, 2, 2, 3, false),
            (62, 0, 2, 1, false),
            (63, 0, 2, 2, false),
            (64, 1, 2, 3, false),
            (65, 0, 2, 3, false),
            (66, 6, 2, 2, true),
            (67, 0, 3, 1, false),
            (68, 7, 3, 1, false),
            (69, 1, 3, 2, false),
            (70, 0, 3, 2, false),
            (71, 4, 3, 2, true),
            (72, 0, 3, 3, false),
            (73, 7, 3, 3, true),
            (74, 1, 3, 3, true),
            (75, 0, 3, 3, true),
        ];

        for (pitch, scale, fret, string, vibrato) in expected {
            let gesture = lookup(pitch).unwrap_or_else(|| panic!("pitch {} unmapped", pitch));
            assert_eq!(gesture.scale, scale, "scale of {}", pitch);
            assert_eq!(gesture.fret.number(), fret, "fret of {}", pitch);
            assert_eq!(gesture.string.number(), string, "string of {}", pitch);
            assert_eq!(gesture.vibrato, vibrato, "vibrato of {}", pitch);
        }
    }

    #[test]
    fn test_unmapped_pitches() {
        assert_eq!(lookup(0), None);
        assert_eq!(lookup(LOWEST_PITCH - 1), None);
        assert_eq!(lookup(HIGHEST_PITCH + 1), None);
        assert_eq!(lookup(127), None);
    }

    #[test]
    fn test_key_indices() {
        assert_eq!(Fret::Open.key_index(), None);
        assert_eq!(Fret::First.key_index(), Some(0));
        assert_eq!(Fret::Third.key_index(), Some(2));
        assert_eq!(InstrumentString::First.key_index(), 0);
        assert_eq!(InstrumentString::Third.key_index(), 2);
    }

    #[test]
    fn test_scales_in_range() {
        for pitch in LOWEST_PITCH..=HIGHEST_PITCH {
            let gesture = lookup(pitch).unwrap();
            assert!(gesture.scale < SCALE_COUNT);
        }
        assert_eq!(lookup(60).unwrap().scale_name(), "Yo");
    }
}
