//! MIDI note numbers to LilyPond pitch names.
//!
//! LilyPond's default (Dutch) note names are used: `c cis d dis e f fis g gis
//! a ais b` with sharps, `c des d ees e f ges g aes a bes b` with flats.
//! Absolute octaves are marked relative to the octave below middle C
//! (`c` = MIDI 48): one `'` per octave above, one `,` per octave below.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chord::NoteGroup;
use crate::NotationError;

/// Lowest note the codec names (C0, rendered `c,,,`).
pub const MIN_NOTE: u8 = 12;

/// Highest MIDI note.
pub const MAX_NOTE: u8 = 127;

/// Octave written without any mark.
pub const REFERENCE_OCTAVE: i32 = 3;

/// How black keys are spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accidentals {
    #[default]
    Sharps,
    Flats,
}

impl FromStr for Accidentals {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sharps" | "sharp" => Ok(Accidentals::Sharps),
            "flats" | "flat" => Ok(Accidentals::Flats),
            _ => Err(NotationError::UnknownAccidentals(s.to_string())),
        }
    }
}

impl fmt::Display for Accidentals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accidentals::Sharps => write!(f, "sharps"),
            Accidentals::Flats => write!(f, "flats"),
        }
    }
}

const SHARP_NAMES: [&str; 12] = [
    "c", "cis", "d", "dis", "e", "f", "fis", "g", "gis", "a", "ais", "b",
];

const FLAT_NAMES: [&str; 12] = [
    "c", "des", "d", "ees", "e", "f", "ges", "g", "aes", "a", "bes", "b",
];

/// Name of a pitch class (0 = C ... 11 = B).
pub fn note_name_of_pitch_class(
    accidentals: Accidentals,
    pitch_class: u8,
) -> Result<&'static str, NotationError> {
    let names = match accidentals {
        Accidentals::Sharps => &SHARP_NAMES,
        Accidentals::Flats => &FLAT_NAMES,
    };
    names
        .get(pitch_class as usize)
        .copied()
        .ok_or(NotationError::PitchClassOutOfRange(pitch_class))
}

/// Octave mark for an absolute octave number in [0, 9].
pub fn octave_mark_of(octave: i32) -> Result<String, NotationError> {
    if !(0..=9).contains(&octave) {
        return Err(NotationError::OctaveOutOfRange(octave));
    }

    let distance = (octave - REFERENCE_OCTAVE).unsigned_abs() as usize;
    if octave >= REFERENCE_OCTAVE {
        Ok("'".repeat(distance))
    } else {
        Ok(",".repeat(distance))
    }
}

/// Full note name, e.g. 60 -> `c'`, 49 -> `cis` / `des`.
///
/// In relative mode the octave mark is left out.
pub fn name_of_midi_note(
    note: u8,
    accidentals: Accidentals,
    relative_mode: bool,
) -> Result<String, NotationError> {
    if !(MIN_NOTE..=MAX_NOTE).contains(&note) {
        return Err(NotationError::NoteOutOfRange(note));
    }

    let octave = i32::from(note / 12) - 1;
    let name = note_name_of_pitch_class(accidentals, note % 12)?;

    if relative_mode {
        Ok(name.to_string())
    } else {
        Ok(format!("{}{}", name, octave_mark_of(octave)?))
    }
}

/// Render a flushed group as text to insert: `" c'"` for a single note,
/// `" <c' e' g'>"` for a chord (ascending MIDI order), nothing when empty.
pub fn render_notes(
    group: &NoteGroup,
    accidentals: Accidentals,
    relative_mode: bool,
) -> Result<String, NotationError> {
    let names = group
        .iter()
        .map(|note| name_of_midi_note(note, accidentals, relative_mode))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(match names.as_slice() {
        [] => String::new(),
        [single] => format!(" {}", single),
        chord => format!(" <{}>", chord.join(" ")),
    })
}
