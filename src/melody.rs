use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

use crate::pitch::{format_atoms, parse_atoms, ChordAtom, ChordEvent, NoteName, NoteName::*};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MelodyError {
    #[error("melody `{0}` has no atoms")]
    EmptyMelody(String),

    #[error("a chord must contain at least one pitch")]
    EmptyChord,

    #[error("chord atom {{{0}}} needs at least two pitches; write a lone pitch without braces")]
    SingletonChord(String),

    #[error("unrecognized note `{0}`")]
    UnknownNote(String),

    #[error("unrecognized outcome policy `{0}` (expected `report` or `terminate`)")]
    UnknownPolicy(String),

    #[error("line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("melodies must be registered before any note events arrive")]
    SessionStarted,
}

/// What happens when a melody is played through to the end.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OutcomePolicy {
    Report,
    Terminate,
}

impl FromStr for OutcomePolicy {
    type Err = MelodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "report" => Ok(OutcomePolicy::Report),
            "terminate" => Ok(OutcomePolicy::Terminate),
            other => Err(MelodyError::UnknownPolicy(other.to_owned())),
        }
    }
}

impl Display for OutcomePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomePolicy::Report => write!(f, "report"),
            OutcomePolicy::Terminate => write!(f, "terminate"),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Melody {
    name: String,
    atoms: Vec<ChordAtom>,
    policy: OutcomePolicy,
}

impl Melody {
    pub fn new(name: &str, atoms: Vec<ChordAtom>, policy: OutcomePolicy) -> Result<Self, MelodyError> {
        if atoms.is_empty() {
            return Err(MelodyError::EmptyMelody(name.to_owned()));
        }
        for atom in atoms.iter() {
            if let ChordAtom::Chord(pitches) = atom {
                match pitches.first() {
                    None => return Err(MelodyError::EmptyChord),
                    Some(p) if pitches.len() == 1 => return Err(MelodyError::SingletonChord(p.to_string())),
                    Some(_) => {}
                }
            }
        }
        Ok(Melody {name: name.to_owned(), atoms, policy})
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn policy(&self) -> OutcomePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn atoms(&self) -> &[ChordAtom] {
        &self.atoms
    }

    /// One line of a melody file: `name | policy | [atoms]`.
    pub fn to_line(&self) -> String {
        format!("{} | {} | {}", self.name, self.policy, format_atoms(self.atoms.iter()))
    }
}

impl std::ops::Index<usize> for Melody {
    type Output = ChordAtom;

    fn index(&self, index: usize) -> &Self::Output {
        &self.atoms[index]
    }
}

/// Reads melody-file text. Blank lines and `#` comments are skipped.
pub fn parse_melodies(text: &str) -> Result<Vec<Melody>, MelodyError> {
    let mut melodies = vec![];
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let malformed = |reason: String| MelodyError::MalformedLine { line: i + 1, reason };
        let parts = line.splitn(3, '|').collect::<Vec<_>>();
        if parts.len() != 3 {
            return Err(malformed("expected `name | policy | atoms`".to_owned()));
        }
        let name = parts[0].trim();
        if name.is_empty() {
            return Err(malformed("missing melody name".to_owned()));
        }
        let policy = parts[1].parse::<OutcomePolicy>().map_err(|e| malformed(e.to_string()))?;
        let atoms = parse_atoms(parts[2]).map_err(|e| malformed(e.to_string()))?;
        melodies.push(Melody::new(name, atoms, policy).map_err(|e| malformed(e.to_string()))?);
    }
    Ok(melodies)
}

/// The tunes available when no melody file is given.
pub fn builtin_melodies() -> Result<Vec<Melody>, MelodyError> {
    fn singles(notes: &[NoteName]) -> Vec<ChordAtom> {
        notes.iter().map(|n| ChordAtom::from(*n)).collect()
    }
    let mad_world = singles(&[Gsharp, C, G, Gsharp, F, G, Dsharp, D, Gsharp, C, G, Gsharp, F, G, Gsharp, Asharp]);
    let happy_birthday = singles(&[D, D, E, D, G, F]);
    let chord_example = vec![
        ChordAtom::chord([C, E, G].iter().map(|n| n.pitch_class()))?,
        ChordAtom::from(D),
        ChordAtom::chord([F, Gsharp, C].iter().map(|n| n.pitch_class()))?,
        ChordAtom::from(D),
    ];
    Ok(vec![
        Melody::new("Mad World", mad_world, OutcomePolicy::Report)?,
        Melody::new("Happy Birthday", happy_birthday, OutcomePolicy::Terminate)?,
        Melody::new("Chord Example", chord_example, OutcomePolicy::Report)?,
    ])
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum MatchOutcome {
    Report(String),
    Terminate(String),
}

impl MatchOutcome {
    pub fn name(&self) -> &str {
        match self {
            MatchOutcome::Report(name) | MatchOutcome::Terminate(name) => name.as_str(),
        }
    }
}

pub type FailureHook = Box<dyn FnMut(&Melody, &ChordEvent) + Send>;

/// Cursor over one melody. Any mismatch sends the cursor back to the start,
/// and the mismatching event is not re-tried against the first atom.
pub struct MelodyMatcher {
    melody: Melody,
    index: usize,
    on_fail: Option<FailureHook>,
}

impl MelodyMatcher {
    pub fn new(melody: Melody) -> Self {
        MelodyMatcher {melody, index: 0, on_fail: None}
    }

    pub fn with_failure_hook(mut self, hook: FailureHook) -> Self {
        self.on_fail = Some(hook);
        self
    }

    pub fn melody(&self) -> &Melody {
        &self.melody
    }

    /// `(atoms matched so far, melody length)`
    pub fn progress(&self) -> (usize, usize) {
        (self.index, self.melody.len())
    }

    pub fn transition(&mut self, chord: &ChordEvent) -> Option<MatchOutcome> {
        if chord.atom() == self.melody[self.index] {
            self.index += 1;
            log::trace!("{}: {}/{}", self.melody.name, self.index, self.melody.len());
            if self.index == self.melody.len() {
                self.index = 0;
                let name = self.melody.name.clone();
                return Some(match self.melody.policy {
                    OutcomePolicy::Report => MatchOutcome::Report(name),
                    OutcomePolicy::Terminate => MatchOutcome::Terminate(name),
                });
            }
        } else {
            if self.index > 0 {
                log::trace!("{}: reset after {chord}", self.melody.name);
            }
            self.index = 0;
            if let Some(hook) = self.on_fail.as_mut() {
                hook(&self.melody, chord);
            }
        }
        None
    }
}

impl Debug for MelodyMatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MelodyMatcher")
            .field("melody", &self.melody.name)
            .field("index", &self.index)
            .finish()
    }
}
