//! Keyboard input session: decoded key events in, note text out.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::chord::ChordAssembler;
use crate::codec::{render_notes, Accidentals, MAX_NOTE, MIN_NOTE};
use crate::NoteEvent;

/// Where rendered note text goes (an editor buffer, stdout, a file).
pub trait NoteSink {
    fn insert(&mut self, text: &str);
}

impl NoteSink for String {
    fn insert(&mut self, text: &str) {
        self.push_str(text);
    }
}

impl NoteSink for Vec<String> {
    fn insert(&mut self, text: &str) {
        self.push(text.to_string());
    }
}

/// Rendering preferences for an input session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSettings {
    pub accidentals: Accidentals,
    pub relative_mode: bool,
    pub chord_mode: bool,
}

/// Owns the chord state for one keyboard and writes flushed groups to a sink.
pub struct InputSession<S: NoteSink> {
    settings: InputSettings,
    assembler: ChordAssembler,
    sink: S,
}

impl<S: NoteSink> InputSession<S> {
    pub fn new(settings: InputSettings, sink: S) -> Self {
        Self {
            settings,
            assembler: ChordAssembler::new(),
            sink,
        }
    }

    pub fn settings(&self) -> InputSettings {
        self.settings
    }

    /// Change preferences. Held notes are dropped so a mode switch never
    /// mixes chord and single-note state.
    pub fn update_settings(&mut self, settings: InputSettings) {
        if settings != self.settings {
            debug!(?settings, "input settings changed");
            self.assembler.reset();
            self.settings = settings;
        }
    }

    /// Handle one key event. Returns the inserted text, if any.
    pub fn handle(&mut self, event: NoteEvent) -> Option<String> {
        let note = event.note();
        if !(MIN_NOTE..=MAX_NOTE).contains(&note) {
            warn!(note, "ignoring note outside the notated range");
            return None;
        }

        let group = self
            .assembler
            .process(note, event.is_press(), self.settings.chord_mode)?;

        match render_notes(&group, self.settings.accidentals, self.settings.relative_mode) {
            Ok(text) if text.is_empty() => None,
            Ok(text) => {
                self.sink.insert(&text);
                Some(text)
            }
            Err(e) => {
                error!(error = %e, notes = ?group.to_vec(), "failed to render notes");
                None
            }
        }
    }

    /// Drop held notes, e.g. when the input device is restarted.
    pub fn reset(&mut self) {
        self.assembler.reset();
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn press(note: u8) -> NoteEvent {
        NoteEvent::Press { note, velocity: 100 }
    }

    fn release(note: u8) -> NoteEvent {
        NoteEvent::Release { note }
    }

    #[test]
    fn test_melody_into_string_sink() {
        let mut session = InputSession::new(InputSettings::default(), String::new());
        for event in [press(60), release(60), press(62), release(62)] {
            session.handle(event);
        }
        assert_eq!(session.sink(), " c' d'");
    }

    #[test]
    fn test_chord_mode_with_flats() {
        let settings = InputSettings {
            accidentals: Accidentals::Flats,
            relative_mode: false,
            chord_mode: true,
        };
        let mut session = InputSession::new(settings, Vec::new());
        for event in [press(61), press(65), press(68), release(61), release(68)] {
            assert_eq!(session.handle(event), None);
        }
        assert_eq!(session.handle(release(65)).as_deref(), Some(" <des' f' aes'>"));
        assert_eq!(session.into_sink(), vec![" <des' f' aes'>".to_string()]);
    }

    #[test]
    fn test_relative_mode() {
        let settings = InputSettings {
            relative_mode: true,
            ..InputSettings::default()
        };
        let mut session = InputSession::new(settings, String::new());
        session.handle(press(72));
        session.handle(release(72));
        assert_eq!(session.sink(), " c");
    }

    #[test]
    fn test_out_of_range_notes_ignored() {
        let mut session = InputSession::new(InputSettings::default(), String::new());
        assert_eq!(session.handle(press(5)), None);
        assert_eq!(session.handle(release(5)), None);
        assert_eq!(session.sink(), "");
    }

    #[test]
    fn test_settings_change_drops_held_notes() {
        let mut session = InputSession::new(InputSettings::default(), String::new());
        session.handle(press(60));
        session.update_settings(InputSettings {
            chord_mode: true,
            ..InputSettings::default()
        });
        session.handle(press(64));
        session.handle(release(64));
        assert_eq!(session.sink(), " e'");
    }
}
