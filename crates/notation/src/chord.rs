//! Chord capture from key presses and releases.
//!
//! Outside chord mode every press flushes whatever was held before it, so a
//! melody played legato still comes out one note at a time. In chord mode
//! notes accumulate until the last held key is released, and then the whole
//! chord is flushed at once.

use std::collections::BTreeSet;

use tracing::{debug, warn};

/// Notes flushed together, in ascending MIDI order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteGroup(BTreeSet<u8>);

impl NoteGroup {
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, note: u8) -> bool {
        self.0.contains(&note)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.iter().collect()
    }
}

impl FromIterator<u8> for NoteGroup {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        NoteGroup(iter.into_iter().collect())
    }
}

impl From<BTreeSet<u8>> for NoteGroup {
    fn from(notes: BTreeSet<u8>) -> Self {
        NoteGroup(notes)
    }
}

/// Per-session note state. A note is never in both sets at once.
#[derive(Debug, Default)]
pub struct ChordAssembler {
    active: BTreeSet<u8>,
    chord: BTreeSet<u8>,
}

impl ChordAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one key event. Returns the group to render when a flush happens.
    pub fn process(&mut self, note: u8, is_press: bool, chord_mode: bool) -> Option<NoteGroup> {
        match (is_press, chord_mode) {
            (true, false) => {
                let flushed = self.flush_active();
                self.active.insert(note);
                flushed
            }
            (true, true) => {
                self.chord.remove(&note);
                self.active.insert(note);
                None
            }
            (false, false) => {
                let flushed = self.flush_active();
                self.chord.clear();
                flushed
            }
            (false, true) => {
                self.active.remove(&note);
                self.chord.insert(note);
                if self.active.is_empty() {
                    debug!(notes = ?self.chord, "chord complete");
                    Some(NoteGroup(std::mem::take(&mut self.chord)))
                } else {
                    None
                }
            }
        }
    }

    /// Drop all held and pending notes.
    pub fn reset(&mut self) {
        self.active.clear();
        self.chord.clear();
    }

    /// Notes currently held down.
    pub fn active(&self) -> &BTreeSet<u8> {
        &self.active
    }

    /// Notes released while the rest of their chord is still held.
    pub fn chord(&self) -> &BTreeSet<u8> {
        &self.chord
    }

    fn flush_active(&mut self) -> Option<NoteGroup> {
        if self.active.is_empty() {
            return None;
        }
        if self.active.len() > 1 {
            warn!(
                notes = ?self.active,
                "several notes held outside chord mode; enable chord mode to enter chords"
            );
        } else {
            debug!(notes = ?self.active, "flushing held note");
        }
        Some(NoteGroup(std::mem::take(&mut self.active)))
    }
}
