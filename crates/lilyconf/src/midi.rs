//! MIDI input and playback configuration.

use serde::{Deserialize, Serialize};

/// MIDI keyboard input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiInputConfig {
    /// Input port name (substring match). Empty uses the first available port.
    #[serde(default)]
    pub input: String,

    /// Spelling of black keys: "sharps" or "flats".
    /// Default: sharps
    #[serde(default = "MidiInputConfig::default_accidentals")]
    pub accidentals: String,

    /// Omit octave marks (for `\relative` music).
    #[serde(default)]
    pub relative_mode: bool,

    /// Capture simultaneously held keys as one chord.
    #[serde(default)]
    pub chord_mode: bool,
}

impl MidiInputConfig {
    fn default_accidentals() -> String {
        "sharps".to_string()
    }
}

impl Default for MidiInputConfig {
    fn default() -> Self {
        Self {
            input: String::new(),
            accidentals: Self::default_accidentals(),
            relative_mode: false,
            chord_mode: false,
        }
    }
}

/// MIDI file playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiPlaybackConfig {
    /// Output port name (substring match). Empty uses the first available port.
    #[serde(default)]
    pub output: String,

    /// Interval between transport position polls.
    /// Default: 100
    #[serde(default = "MidiPlaybackConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl MidiPlaybackConfig {
    fn default_poll_interval_ms() -> u64 {
        100
    }
}

impl Default for MidiPlaybackConfig {
    fn default() -> Self {
        Self {
            output: String::new(),
            poll_interval_ms: Self::default_poll_interval_ms(),
        }
    }
}

/// Port preference as an `Option`: empty string means "system default".
pub fn port_preference(name: &str) -> Option<&str> {
    let trimmed = name.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_input_defaults() {
        let config = MidiInputConfig::default();
        assert_eq!(config.accidentals, "sharps");
        assert!(!config.chord_mode);
        assert!(!config.relative_mode);
        assert!(config.input.is_empty());
    }

    #[test]
    fn test_playback_defaults() {
        let config = MidiPlaybackConfig::default();
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(port_preference(&config.output), None);
    }

    #[test]
    fn test_port_preference_trims() {
        assert_eq!(port_preference("  USB Keys "), Some("USB Keys"));
        assert_eq!(port_preference(""), None);
    }
}
