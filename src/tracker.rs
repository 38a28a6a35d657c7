use std::collections::BTreeMap;

use crate::pitch::PitchClass;

/// Keys currently held down, keyed by pitch class, with the press time in ms.
#[derive(Clone, Default, Debug)]
pub struct ActiveNotes {
    pressed: BTreeMap<PitchClass, u64>,
}

impl ActiveNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, pitch: PitchClass, time_ms: u64) {
        self.pressed.insert(pitch, time_ms);
    }

    /// Releasing a pitch that is not held does nothing.
    pub fn release(&mut self, pitch: PitchClass) -> Option<u64> {
        self.pressed.remove(&pitch)
    }

    pub fn press_time(&self, pitch: PitchClass) -> Option<u64> {
        self.pressed.get(&pitch).copied()
    }

    pub fn contains(&self, pitch: PitchClass) -> bool {
        self.pressed.contains_key(&pitch)
    }

    pub fn len(&self) -> usize {
        self.pressed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PitchClass, u64)> + '_ {
        self.pressed.iter().map(|(p, t)| (*p, *t))
    }
}
