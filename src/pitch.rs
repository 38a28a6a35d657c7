use bare_metal_modulo::{MNum, ModNumC};
use enum_iterator::{all, Sequence};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::melody::MelodyError;

pub const NOTES_PER_OCTAVE: usize = 12;

/// One of the 12 equal-tempered pitch classes. Octave information is gone by
/// the time a value of this type exists.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PitchClass(u8);

impl PitchClass {
    pub fn from_midi(raw: i64) -> Self {
        let reduced: ModNumC<i64, NOTES_PER_OCTAVE> = ModNumC::new(raw);
        PitchClass(reduced.a() as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn name(&self) -> NoteName {
        all::<NoteName>()
            .nth(self.0 as usize)
            .unwrap_or(NoteName::C)
    }
}

impl From<NoteName> for PitchClass {
    fn from(name: NoteName) -> Self {
        name.pitch_class()
    }
}

impl Display for PitchClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PitchClass {
    type Err = MelodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(raw) = s.parse::<i64>() {
            return Ok(PitchClass::from_midi(raw));
        }
        let mut chars = s.chars();
        let letter = chars
            .next()
            .and_then(|c| natural_pitch(c.to_ascii_uppercase()))
            .ok_or_else(|| MelodyError::UnknownNote(s.to_owned()))?;
        let shift = match chars.as_str().to_lowercase().as_str() {
            "" => 0,
            "#" | "sharp" => 1,
            "b" | "flat" => -1,
            _ => return Err(MelodyError::UnknownNote(s.to_owned())),
        };
        Ok(PitchClass::from_midi(letter + shift))
    }
}

fn natural_pitch(letter: char) -> Option<i64> {
    match letter {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

/// Sharp spelling of each pitch class, in pitch order.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Sequence, Hash, Ord, PartialOrd)]
pub enum NoteName {
    C, Csharp, D, Dsharp, E, F, Fsharp, G, Gsharp, A, Asharp, B
}

impl NoteName {
    pub fn pitch_class(&self) -> PitchClass {
        PitchClass::from_midi(*self as i64)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::Csharp => "C#",
            NoteName::D => "D",
            NoteName::Dsharp => "D#",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::Fsharp => "F#",
            NoteName::G => "G",
            NoteName::Gsharp => "G#",
            NoteName::A => "A",
            NoteName::Asharp => "A#",
            NoteName::B => "B",
        }
    }
}

impl Display for NoteName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One step of a melody. A `Chord` never holds fewer than two pitch classes,
/// so a single pitch and a chord are never equal to each other.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum ChordAtom {
    Single(PitchClass),
    Chord(BTreeSet<PitchClass>),
}

impl ChordAtom {
    pub fn chord<I: IntoIterator<Item = PitchClass>>(pitches: I) -> Result<Self, MelodyError> {
        let pitches: BTreeSet<PitchClass> = pitches.into_iter().collect();
        if pitches.len() > 1 {
            return Ok(ChordAtom::Chord(pitches));
        }
        pitches
            .into_iter()
            .next()
            .map(ChordAtom::Single)
            .ok_or(MelodyError::EmptyChord)
    }

    pub fn len(&self) -> usize {
        match self {
            ChordAtom::Single(_) => 1,
            ChordAtom::Chord(pitches) => pitches.len(),
        }
    }
}

impl From<NoteName> for ChordAtom {
    fn from(name: NoteName) -> Self {
        ChordAtom::Single(name.pitch_class())
    }
}

impl From<PitchClass> for ChordAtom {
    fn from(pitch: PitchClass) -> Self {
        ChordAtom::Single(pitch)
    }
}

impl Display for ChordAtom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChordAtom::Single(p) => write!(f, "{p}"),
            ChordAtom::Chord(pitches) => write!(f, "{{{}}}", join_pitches(pitches.iter())),
        }
    }
}

impl FromStr for ChordAtom {
    type Err = MelodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
            Some(inner) => ChordAtom::chord(
                inner
                    .split(',')
                    .map(|p| p.parse::<PitchClass>())
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => Ok(ChordAtom::Single(s.parse::<PitchClass>()?)),
        }
    }
}

fn join_pitches<'a>(pitches: impl Iterator<Item = &'a PitchClass>) -> String {
    pitches.map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
}

/// Pitch classes the chord filter judged to have been played together.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ChordEvent(BTreeSet<PitchClass>);

impl ChordEvent {
    /// Returns `None` for an empty set.
    pub fn new(pitches: BTreeSet<PitchClass>) -> Option<Self> {
        if pitches.is_empty() {
            None
        } else {
            Some(ChordEvent(pitches))
        }
    }

    pub fn pitches(&self) -> &BTreeSet<PitchClass> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn atom(&self) -> ChordAtom {
        match self.0.first() {
            Some(p) if self.0.len() == 1 => ChordAtom::Single(*p),
            _ => ChordAtom::Chord(self.0.clone()),
        }
    }
}

impl Display for ChordEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.atom())
    }
}

/// Parses a comma-separated atom list such as `[{C, E, G}, D, {F, Ab, C}, D]`.
/// Commas inside braces belong to the chord. Outer brackets are optional.
pub fn parse_atoms(text: &str) -> Result<Vec<ChordAtom>, MelodyError> {
    let text = text.trim();
    let text = text
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(text);
    let mut atoms: Vec<ChordAtom> = vec![];
    let mut depth = 0;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            ',' if depth == 0 => {
                atoms.push(text[start..i].parse::<ChordAtom>()?);
                start = i + 1;
            }
            _ => {}
        }
    }
    if !text[start..].trim().is_empty() {
        atoms.push(text[start..].parse::<ChordAtom>()?);
    }
    Ok(atoms)
}

pub fn format_atoms<'a>(atoms: impl Iterator<Item = &'a ChordAtom>) -> String {
    format!(
        "[{}]",
        atoms.map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
    )
}
