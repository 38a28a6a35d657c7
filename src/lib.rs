pub mod pitch;
pub mod tracker;
pub mod chord_filter;
pub mod melody;
pub mod session;
pub mod midi;
pub mod config;
pub mod runtime;

pub use pitch::{ChordAtom, ChordEvent, NoteName, PitchClass};
pub use chord_filter::{ChordFilter, MIN_HOLD_MS};
pub use melody::{MatchOutcome, Melody, MelodyError, MelodyMatcher, OutcomePolicy};
pub use session::{ChordObserver, KeyboardSession, NoteOffResult};
