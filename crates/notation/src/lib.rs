//! LilyPond note naming and chord capture for MIDI keyboard input.
//!
//! This crate turns the stream of key presses and releases coming from a
//! MIDI keyboard into LilyPond note text.
//!
//! # Example
//!
//! ```
//! use notation::{Accidentals, ChordAssembler, render_notes};
//!
//! let mut assembler = ChordAssembler::new();
//! assert!(assembler.process(60, true, true).is_none());
//! assert!(assembler.process(64, true, true).is_none());
//! assert!(assembler.process(60, false, true).is_none());
//!
//! let chord = assembler.process(64, false, true).unwrap();
//! let text = render_notes(&chord, Accidentals::Sharps, false).unwrap();
//! assert_eq!(text, " <c' e'>");
//! ```

pub mod chord;
pub mod codec;
pub mod session;

pub use chord::{ChordAssembler, NoteGroup};
pub use codec::{
    name_of_midi_note, note_name_of_pitch_class, octave_mark_of, render_notes, Accidentals,
    MAX_NOTE, MIN_NOTE, REFERENCE_OCTAVE,
};
pub use session::{InputSession, InputSettings, NoteSink};

use thiserror::Error;

/// A key event decoded from a MIDI channel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEvent {
    Press { note: u8, velocity: u8 },
    Release { note: u8 },
}

impl NoteEvent {
    pub fn note(&self) -> u8 {
        match self {
            NoteEvent::Press { note, .. } | NoteEvent::Release { note } => *note,
        }
    }

    pub fn is_press(&self) -> bool {
        matches!(self, NoteEvent::Press { .. })
    }
}

/// Input validation errors. Values are reported, never clamped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotationError {
    #[error("pitch class should be an integer within [0, 11]; got {0}")]
    PitchClassOutOfRange(u8),

    #[error("octave number should be an integer within [0, 9]; got {0}")]
    OctaveOutOfRange(i32),

    #[error("MIDI note should be an integer within [{min}, {max}]; got {0}", min = MIN_NOTE, max = MAX_NOTE)]
    NoteOutOfRange(u8),

    #[error("unknown accidentals preference `{0}` (expected `sharps` or `flats`)")]
    UnknownAccidentals(String),
}
