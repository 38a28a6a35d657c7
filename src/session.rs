use crate::chord_filter::ChordFilter;
use crate::melody::{MatchOutcome, Melody, MelodyError, MelodyMatcher};
use crate::pitch::{ChordEvent, PitchClass};
use crate::tracker::ActiveNotes;

/// Receives every chord event after the matchers have seen it.
pub trait ChordObserver {
    fn on_chord(&mut self, chord: &ChordEvent);

    /// Called for MIDI events that are neither note-on nor note-off.
    fn on_other_event(&mut self) {}
}

#[derive(Clone, Default, Debug, Eq, PartialEq)]
pub struct NoteOffResult {
    pub chord: Option<ChordEvent>,
    pub outcomes: Vec<MatchOutcome>,
}

impl NoteOffResult {
    /// Name of the first melody whose match should end the session.
    pub fn terminated(&self) -> Option<&str> {
        self.outcomes.iter().find_map(|o| match o {
            MatchOutcome::Terminate(name) => Some(name.as_str()),
            MatchOutcome::Report(_) => None,
        })
    }

    pub fn reported(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|o| match o {
            MatchOutcome::Report(name) => Some(name.as_str()),
            MatchOutcome::Terminate(_) => None,
        })
    }
}

/// All mutable state of one keyboard input session.
pub struct KeyboardSession {
    active: ActiveNotes,
    filter: ChordFilter,
    matchers: Vec<MelodyMatcher>,
    observer: Option<Box<dyn ChordObserver + Send>>,
    started: bool,
}

impl Default for KeyboardSession {
    fn default() -> Self {
        Self::new(ChordFilter::default())
    }
}

impl KeyboardSession {
    pub fn new(filter: ChordFilter) -> Self {
        KeyboardSession {
            active: ActiveNotes::new(),
            filter,
            matchers: vec![],
            observer: None,
            started: false,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn ChordObserver + Send>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn register_melody(&mut self, melody: Melody) -> Result<(), MelodyError> {
        self.register_matcher(MelodyMatcher::new(melody))
    }

    pub fn register_matcher(&mut self, matcher: MelodyMatcher) -> Result<(), MelodyError> {
        if self.started {
            return Err(MelodyError::SessionStarted);
        }
        log::debug!("registered {}", matcher.melody().to_line());
        self.matchers.push(matcher);
        Ok(())
    }

    pub fn matchers(&self) -> &[MelodyMatcher] {
        &self.matchers
    }

    pub fn active_notes(&self) -> &ActiveNotes {
        &self.active
    }

    pub fn handle_note_on(&mut self, pitch: PitchClass, time_ms: u64) {
        self.started = true;
        self.active.press(pitch, time_ms);
        self.filter.note_pressed();
    }

    pub fn handle_note_off(&mut self, pitch: PitchClass, time_ms: u64) -> NoteOffResult {
        self.started = true;
        let chord = if self.filter.is_processing() {
            self.filter.on_release(&self.active, pitch, time_ms)
        } else {
            None
        };
        self.active.release(pitch);

        let outcomes = match chord.as_ref() {
            Some(chord) => self.dispatch(chord),
            None => vec![],
        };
        NoteOffResult {chord, outcomes}
    }

    pub fn handle_other_event(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_other_event();
        }
    }

    fn dispatch(&mut self, chord: &ChordEvent) -> Vec<MatchOutcome> {
        log::debug!("chord {chord}");
        let outcomes = self
            .matchers
            .iter_mut()
            .filter_map(|m| m.transition(chord))
            .collect();
        if let Some(observer) = self.observer.as_mut() {
            observer.on_chord(chord);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use crate::chord_filter::ChordFilter;
    use crate::melody::{builtin_melodies, MatchOutcome, Melody, MelodyError, OutcomePolicy};
    use crate::pitch::{parse_atoms, ChordAtom, ChordEvent, NoteName, NoteName::*, PitchClass};
    use crate::session::{ChordObserver, KeyboardSession};
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};

    fn pc(name: NoteName) -> PitchClass {
        name.pitch_class()
    }

    fn melody(name: &str, atoms: &str, policy: OutcomePolicy) -> Melody {
        Melody::new(name, parse_atoms(atoms).unwrap(), policy).unwrap()
    }

    /// Presses and releases one key per note, 200ms apart.
    fn play(session: &mut KeyboardSession, notes: &[NoteName], start: u64) -> Vec<MatchOutcome> {
        let mut outcomes = vec![];
        for (i, n) in notes.iter().enumerate() {
            let t = start + 200 * i as u64;
            session.handle_note_on(pc(*n), t);
            outcomes.extend(session.handle_note_off(pc(*n), t + 120).outcomes);
        }
        outcomes
    }

    fn chord_names(chord: &Option<ChordEvent>) -> Option<String> {
        chord.as_ref().map(|c| c.to_string())
    }

    #[test]
    fn test_idempotent_release() {
        let mut session = KeyboardSession::default();
        session.handle_note_on(pc(C), 0);
        assert_eq!(chord_names(&session.handle_note_off(pc(C), 50).chord), Some("C".to_owned()));
        assert!(session.handle_note_off(pc(C), 60).chord.is_none());
        assert!(session.active_notes().is_empty());
    }

    #[test]
    fn test_single_note_fast_path() {
        let mut session = KeyboardSession::default();
        session.handle_note_on(pc(Fsharp), 1000);
        assert_eq!(chord_names(&session.handle_note_off(pc(Fsharp), 1001).chord), Some("F#".to_owned()));
    }

    #[test]
    fn test_short_chord_suppression() {
        let mut session = KeyboardSession::default();
        session.handle_note_on(pc(C), 0);
        session.handle_note_on(pc(E), 0);
        assert!(session.handle_note_off(pc(C), 10).chord.is_none());
        assert_eq!(chord_names(&session.handle_note_off(pc(E), 150).chord), Some("E".to_owned()));
    }

    #[test]
    fn test_clean_chord_any_order() {
        for order in [[C, E, G], [G, C, E], [E, G, C]] {
            let mut session = KeyboardSession::default();
            for n in [C, E, G] {
                session.handle_note_on(pc(n), 0);
            }
            let chords: Vec<_> = order
                .iter()
                .filter_map(|n| session.handle_note_off(pc(*n), 150).chord)
                .collect();
            assert_eq!(chords.len(), 1);
            assert_eq!(chords[0].to_string(), "{C, E, G}");
        }
    }

    #[test]
    fn test_staggered_settling_emits_overlapping_chords() {
        let mut session = KeyboardSession::default();
        session.handle_note_on(pc(C), 0);
        session.handle_note_on(pc(E), 0);
        session.handle_note_on(pc(G), 80);
        assert_eq!(chord_names(&session.handle_note_off(pc(C), 120).chord), Some("{C, E}".to_owned()));
        assert_eq!(chord_names(&session.handle_note_off(pc(E), 200).chord), Some("{E, G}".to_owned()));
        assert!(session.handle_note_off(pc(G), 210).chord.is_none());
    }

    #[test]
    fn test_terminate_propagates() {
        let mut session = KeyboardSession::default();
        for m in builtin_melodies().unwrap() {
            session.register_melody(m).unwrap();
        }
        let outcomes = play(&mut session, &[D, D, E, D, G, F], 0);
        assert_eq!(outcomes, vec![MatchOutcome::Terminate("Happy Birthday".to_owned())]);

        session.handle_note_on(pc(D), 5000);
        assert!(session.handle_note_off(pc(D), 5100).terminated().is_none());
    }

    #[test]
    fn test_chord_melody_through_session() {
        let mut session = KeyboardSession::new(ChordFilter::new(100));
        session.register_melody(melody("chords", "[{C, E, G}, D]", OutcomePolicy::Report)).unwrap();
        for n in [C, E, G] {
            session.handle_note_on(pc(n), 0);
        }
        for n in [G, E, C] {
            assert!(session.handle_note_off(pc(n), 300).outcomes.is_empty());
        }
        session.handle_note_on(pc(D), 400);
        let result = session.handle_note_off(pc(D), 450);
        assert_eq!(result.reported().collect::<Vec<_>>(), vec!["chords"]);
        assert_eq!(result.terminated(), None);
    }

    #[test]
    fn test_matcher_independence() {
        let mut session = KeyboardSession::default();
        session.register_melody(melody("first", "[C, D]", OutcomePolicy::Report)).unwrap();
        session.register_melody(melody("second", "[C, D, E]", OutcomePolicy::Report)).unwrap();

        let outcomes = play(&mut session, &[C, D], 0);
        assert_eq!(outcomes, vec![MatchOutcome::Report("first".to_owned())]);
        assert_eq!(session.matchers()[0].progress().0, 0);
        assert_eq!(session.matchers()[1].progress().0, 2);

        let outcomes = play(&mut session, &[E], 1000);
        assert_eq!(outcomes, vec![MatchOutcome::Report("second".to_owned())]);
        assert_eq!(session.matchers()[0].progress().0, 0);
        assert_eq!(session.matchers()[1].progress().0, 0);
    }

    #[test]
    fn test_register_after_start_rejected() {
        let mut session = KeyboardSession::default();
        session.handle_note_on(pc(A), 0);
        assert_eq!(session.register_melody(melody("late", "A", OutcomePolicy::Report)),
                   Err(MelodyError::SessionStarted));
    }

    #[test]
    fn test_undersized_chord_never_registered() {
        let mut session = KeyboardSession::default();
        for pitches in [BTreeSet::new(), BTreeSet::from([pc(C)])] {
            let registered = Melody::new("bad", vec![ChordAtom::Chord(pitches)], OutcomePolicy::Report)
                .and_then(|m| session.register_melody(m));
            assert!(registered.is_err());
        }
        assert!(session.matchers().is_empty());
    }

    struct Recorder {
        chords: Arc<Mutex<Vec<String>>>,
        others: Arc<Mutex<usize>>,
    }

    impl ChordObserver for Recorder {
        fn on_chord(&mut self, chord: &ChordEvent) {
            self.chords.lock().unwrap().push(chord.to_string());
        }

        fn on_other_event(&mut self) {
            *self.others.lock().unwrap() += 1;
        }
    }

    #[test]
    fn test_observer() {
        let chords = Arc::new(Mutex::new(vec![]));
        let others = Arc::new(Mutex::new(0));
        let mut session = KeyboardSession::default()
            .with_observer(Box::new(Recorder {chords: chords.clone(), others: others.clone()}));
        play(&mut session, &[B, Asharp], 0);
        session.handle_other_event();
        assert_eq!(*chords.lock().unwrap(), vec!["B".to_owned(), "A#".to_owned()]);
        assert_eq!(*others.lock().unwrap(), 1);
    }
}
