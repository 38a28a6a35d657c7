use std::collections::BTreeSet;

use crate::pitch::{ChordEvent, PitchClass};
use crate::tracker::ActiveNotes;

/// Shortest hold, measured back from a release, for a key to count as part
/// of an intended chord.
pub const MIN_HOLD_MS: u64 = 100;

/// Decides on each note-off whether the keys held at that moment form a
/// chord event.
///
/// A key brushed briefly while a chord is held is dropped from the chord,
/// and its own release produces nothing. Once a release finds every held
/// key past the threshold, the remaining releases of that group are
/// ignored until the next note-on.
#[derive(Clone, Debug)]
pub struct ChordFilter {
    min_hold_ms: u64,
    continue_processing: bool,
}

impl Default for ChordFilter {
    fn default() -> Self {
        Self::new(MIN_HOLD_MS)
    }
}

impl ChordFilter {
    pub fn new(min_hold_ms: u64) -> Self {
        ChordFilter {min_hold_ms, continue_processing: true}
    }

    pub fn min_hold_ms(&self) -> u64 {
        self.min_hold_ms
    }

    pub fn is_processing(&self) -> bool {
        self.continue_processing
    }

    pub fn note_pressed(&mut self) {
        self.continue_processing = true;
    }

    /// Must be called before `released` leaves `active`. Returns `None`
    /// without touching any state when the previous release closed the chord
    /// or when `released` was never pressed.
    pub fn on_release(&mut self, active: &ActiveNotes, released: PitchClass, release_ms: u64) -> Option<ChordEvent> {
        if !self.continue_processing || !active.contains(released) {
            return None;
        }

        if active.len() == 1 {
            self.continue_processing = true;
            return ChordEvent::new(BTreeSet::from([released]));
        }

        self.continue_processing = false;
        let qualifying: BTreeSet<PitchClass> = active
            .iter()
            .filter(|(_, pressed)| release_ms.saturating_sub(*pressed) >= self.min_hold_ms)
            .map(|(p, _)| p)
            .collect();
        if qualifying.len() != active.len() {
            self.continue_processing = true;
        }
        if !qualifying.contains(&released) {
            return None;
        }
        ChordEvent::new(qualifying)
    }
}
