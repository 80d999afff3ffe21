use std::path::Path;

use crate::TransportError;

/// A loaded file that can be played.
pub trait PlaybackEngine: Send {
    fn play(&mut self) -> Result<(), TransportError>;
    fn pause(&mut self) -> Result<(), TransportError>;
    fn stop(&mut self) -> Result<(), TransportError>;
    fn seek(&mut self, ms: u64) -> Result<(), TransportError>;
    fn position_ms(&self) -> u64;
    fn duration_ms(&self) -> u64;

    /// True once playback has run off the end. Engines that cannot tell
    /// leave this false and the controller falls back to a zero position.
    fn has_ended(&self) -> bool {
        false
    }
}

/// Loads a MIDI file and connects it to an output.
pub trait EngineFactory: Send {
    fn load(&mut self, path: &Path) -> Result<Box<dyn PlaybackEngine>, TransportError>;
}

/// Asks the user where to start playback.
pub trait StartTimePrompt {
    /// `total` is the file length as `m:ss`. `None` means cancelled; an
    /// empty answer means the beginning.
    fn ask(&mut self, total: &str) -> Option<String>;
}

/// A prompt with a predetermined answer, e.g. from a command-line flag.
#[derive(Debug, Clone, Default)]
pub struct FixedStartTime(pub String);

impl StartTimePrompt for FixedStartTime {
    fn ask(&mut self, _total: &str) -> Option<String> {
        Some(self.0.clone())
    }
}
