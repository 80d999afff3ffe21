//! Playback transport for compiled MIDI files.
//!
//! The [`TransportController`] owns the idle/playing/paused state machine and
//! a single [`PlaybackEngine`]. Engines come from an [`EngineFactory`]; the
//! real one ([`SmfEngineFactory`]) parses the file with midly and streams it
//! to a MIDI output port. [`TransportHandle`] runs the controller on tokio
//! with a position poller that notices when playback runs off the end.

pub mod clock;
pub mod controller;
pub mod engine;
pub mod handle;
pub mod locate;
pub mod player;
pub mod smf;
pub mod time;

pub use clock::PlaybackClock;
pub use controller::{PollOutcome, TransportController};
pub use engine::{EngineFactory, FixedStartTime, PlaybackEngine, StartTimePrompt};
pub use handle::TransportHandle;
pub use locate::locate_midi_file;
pub use player::{SmfEngineFactory, SmfPlayer};
pub use smf::{SmfTimeline, TimedMessage};
pub use time::{display_to_ms, ms_to_display, validate_start_time, TIMESTAMP_PATTERN};

use std::fmt;
use std::path::PathBuf;

use midi_io::MidiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Cannot find MIDI file to play for {0} - make sure you are outputting a MIDI file")]
    MidiFileNotFound(PathBuf),

    #[error("No active MIDI file to {action} (transport is {state})")]
    InvalidTransition {
        action: &'static str,
        state: TransportStatus,
    },

    #[error("Time cannot be negative: {0}")]
    NegativeTime(i64),

    #[error("{0} does not match the required syntax: /{pattern}/. Valid examples: 1:23, 10:59, 0:12", pattern = TIMESTAMP_PATTERN)]
    InvalidTimestamp(String),

    #[error("Duration {requested} is longer than duration of actual MIDI file {duration}")]
    StartBeyondEnd { requested: String, duration: String },

    #[error("Start time prompt was cancelled")]
    PromptCancelled,

    #[error("Failed to load MIDI file {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("Playback engine error: {0}")]
    Engine(String),

    #[error(transparent)]
    Midi(#[from] MidiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportStatus {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportStatus::Idle => write!(f, "idle"),
            TransportStatus::Playing => write!(f, "playing"),
            TransportStatus::Paused => write!(f, "paused"),
        }
    }
}

/// Snapshot of the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportState {
    pub status: TransportStatus,
    pub current_file: Option<PathBuf>,
    pub position_ms: u64,
    pub duration_ms: u64,
}

impl TransportState {
    /// `m:ss / m:ss` for the current position.
    pub fn timestamp(&self) -> String {
        format!(
            "{} / {}",
            time::display(self.position_ms),
            time::display(self.duration_ms)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp() {
        let state = TransportState {
            status: TransportStatus::Playing,
            current_file: None,
            position_ms: 61_200,
            duration_ms: 125_000,
        };
        assert_eq!(state.timestamp(), "1:01 / 2:05");
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = TransportError::InvalidTransition {
            action: "stop",
            state: TransportStatus::Idle,
        };
        assert_eq!(err.to_string(), "No active MIDI file to stop (transport is idle)");
    }
}
