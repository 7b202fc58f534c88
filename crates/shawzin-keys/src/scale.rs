//! Scale selection tracking
//!
//! The instrument has no "previous scale" key: the only way to change scale
//! is to advance forward through the list, wrapping after the last one.

use crate::instrument::{SCALE_COUNT, SCALE_NAMES};

/// Tracks which scale the instrument currently has selected
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScaleTracker {
    active: usize,
}

impl ScaleTracker {
    /// Create a tracker assuming the instrument is on `scale`
    pub fn new(scale: usize) -> Self {
        Self { active: scale % SCALE_COUNT }
    }

    /// Currently selected scale
    pub fn active(&self) -> usize {
        self.active
    }

    /// Display name of the currently selected scale
    pub fn active_name(&self) -> &'static str {
        SCALE_NAMES[self.active]
    }

    /// Number of forward advances needed to reach `target`
    pub fn distance_to(&self, target: usize) -> usize {
        (target % SCALE_COUNT + SCALE_COUNT - self.active) % SCALE_COUNT
    }

    /// Select `target`, returning how many advances that takes
    pub fn advance_to(&mut self, target: usize) -> usize {
        let taps = self.distance_to(target);
        self.active = target % SCALE_COUNT;
        taps
    }

    /// Select `target` by calling `tap` once per advance
    ///
    /// The tracker moves one scale per successful tap. If a tap fails the
    /// error is returned and the tracker stays on the scale the instrument
    /// actually reached.
    pub fn advance_with<F, E>(&mut self, target: usize, mut tap: F) -> std::result::Result<usize, E>
    where
        F: FnMut() -> std::result::Result<(), E>,
    {
        let taps = self.distance_to(target);
        for _ in 0..taps {
            tap()?;
            self.active = (self.active + 1) % SCALE_COUNT;
        }
        Ok(taps)
    }

    /// Forget the tracked scale and assume `scale` is selected
    pub fn reset(&mut self, scale: usize) {
        self.active = scale % SCALE_COUNT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_is_forward_and_circular() {
        for active in 0..SCALE_COUNT {
            for target in 0..SCALE_COUNT {
                let mut tracker = ScaleTracker::new(active);
                let expected = (target + SCALE_COUNT - active) % SCALE_COUNT;
                assert_eq!(tracker.advance_to(target), expected);
                assert_eq!(tracker.active(), target);
            }
        }
    }

    #[test]
    fn test_same_scale_is_noop() {
        let mut tracker = ScaleTracker::new(5);
        let mut taps = 0;
        let issued = tracker
            .advance_with(5, || -> Result<(), ()> {
                taps += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(issued, 0);
        assert_eq!(taps, 0);
        assert_eq!(tracker.active(), 5);
    }

    #[test]
    fn test_wraps_around() {
        let mut tracker = ScaleTracker::new(8);
        assert_eq!(tracker.advance_to(0), 1);
        assert_eq!(tracker.advance_to(8), 8);
    }

    #[test]
    fn test_failed_tap_keeps_reached_scale() {
        let mut tracker = ScaleTracker::new(0);
        let mut taps = 0;
        let result = tracker.advance_with(6, || {
            taps += 1;
            if taps == 3 {
                Err("injection failed")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("injection failed"));
        // two taps landed before the failure
        assert_eq!(tracker.active(), 2);
        assert_eq!(tracker.distance_to(6), 4);
    }

    #[test]
    fn test_active_name() {
        let tracker = ScaleTracker::default();
        assert_eq!(tracker.active_name(), "Pentatonic Minor");
    }
}
