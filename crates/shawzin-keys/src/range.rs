//! Range policy for pitches the instrument cannot play directly
//!
//! Pitches below the playable range are folded into its lowest octave,
//! pitches above it into its highest octave. With transposition disabled
//! they are dropped.

use crate::instrument::{HIGHEST_PITCH, LOWEST_PITCH};

/// Resolve a pitch to one the instrument can play
///
/// Returns `None` when the pitch is out of range and `transpose` is off.
/// A `Some` result is always inside `LOWEST_PITCH..=HIGHEST_PITCH`.
pub fn resolve(pitch: u8, transpose: bool) -> Option<u8> {
    let pitch = pitch as i16;
    let lowest = LOWEST_PITCH as i16;
    let highest = HIGHEST_PITCH as i16;

    let resolved = if (lowest..=highest).contains(&pitch) {
        pitch
    } else if !transpose {
        return None;
    } else if pitch < lowest {
        lowest + pitch.rem_euclid(12)
    } else {
        (highest - 11) + pitch.rem_euclid(12)
    };

    Some(resolved as u8)
}
