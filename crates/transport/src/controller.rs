//! The idle/playing/paused state machine.

use std::path::Path;

use tracing::{debug, info};

use crate::engine::{EngineFactory, PlaybackEngine, StartTimePrompt};
use crate::locate::locate_midi_file;
use crate::time::{display, validate_start_time};
use crate::{TransportError, TransportState, TransportStatus};

/// Result of one position poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Still playing; carries the `m:ss / m:ss` status line.
    Progress(String),
    /// Playback ran off the end and the transport is idle again.
    Ended,
    /// Nothing to poll.
    Paused,
    Idle,
}

pub struct TransportController<F: EngineFactory> {
    factory: F,
    engine: Option<Box<dyn PlaybackEngine>>,
    state: TransportState,
}

impl<F: EngineFactory> TransportController<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            engine: None,
            state: TransportState::default(),
        }
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    pub fn status(&self) -> TransportStatus {
        self.state.status
    }

    /// Play the MIDI output of `source` from the beginning.
    pub fn play(&mut self, source: &Path) -> Result<(), TransportError> {
        let path = locate_midi_file(source)?;
        self.load(&path)?;
        self.start(0)
    }

    /// Like [`play`](Self::play), but first asks where to start.
    pub fn play_from(
        &mut self,
        source: &Path,
        prompt: &mut dyn StartTimePrompt,
    ) -> Result<(), TransportError> {
        let path = locate_midi_file(source)?;
        self.load(&path)?;

        let answer = prompt.ask(&display(self.state.duration_ms));
        let start_ms = answer
            .ok_or(TransportError::PromptCancelled)
            .and_then(|input| validate_start_time(self.state.duration_ms, &input));

        match start_ms {
            Ok(ms) => self.start(ms),
            Err(e) => {
                debug!(error = %e, "start time rejected");
                self.reset();
                Err(e)
            }
        }
    }

    pub fn pause(&mut self) -> Result<(), TransportError> {
        let engine = match (self.state.status, self.engine.as_mut()) {
            (TransportStatus::Playing, Some(engine)) => engine,
            (state, _) => return Err(TransportError::InvalidTransition { action: "pause", state }),
        };

        engine.pause()?;
        self.state.position_ms = engine.position_ms();
        self.state.status = TransportStatus::Paused;
        info!(at = %self.state.timestamp(), "paused");
        Ok(())
    }

    /// Continue a paused file. Anything else plays `source` from the start,
    /// restarting a file that is already playing.
    pub fn resume(&mut self, source: &Path) -> Result<(), TransportError> {
        if let (TransportStatus::Paused, Some(engine)) = (self.state.status, self.engine.as_mut()) {
            engine.play()?;
            self.state.status = TransportStatus::Playing;
            info!(at = %self.state.timestamp(), "resumed");
            return Ok(());
        }
        self.play(source)
    }

    pub fn stop(&mut self) -> Result<(), TransportError> {
        match self.state.status {
            TransportStatus::Playing | TransportStatus::Paused => {
                if let Some(mut engine) = self.engine.take() {
                    engine.stop()?;
                }
                self.state = TransportState::default();
                info!("stopped");
                Ok(())
            }
            TransportStatus::Idle => Err(TransportError::InvalidTransition {
                action: "stop",
                state: TransportStatus::Idle,
            }),
        }
    }

    /// Stop whatever is loaded and return to the zero state.
    pub fn reset(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            if let Err(e) = engine.stop() {
                debug!(error = %e, "engine stop failed during reset");
            }
        }
        self.state = TransportState::default();
    }

    /// Check the engine position. Reaching the end (reported by the engine,
    /// or a position of exactly zero while playing) stops the transport.
    pub fn poll(&mut self) -> PollOutcome {
        let engine = match (self.state.status, self.engine.as_ref()) {
            (TransportStatus::Playing, Some(engine)) => engine,
            (TransportStatus::Paused, _) => return PollOutcome::Paused,
            _ => return PollOutcome::Idle,
        };

        let position = engine.position_ms();
        if engine.has_ended() || position == 0 {
            debug!(position, "end of playback");
            self.reset();
            return PollOutcome::Ended;
        }

        self.state.position_ms = position;
        self.state.duration_ms = engine.duration_ms();
        PollOutcome::Progress(self.state.timestamp())
    }

    fn load(&mut self, path: &Path) -> Result<(), TransportError> {
        self.reset();
        let engine = self.factory.load(path)?;
        self.state.current_file = Some(path.to_path_buf());
        self.state.duration_ms = engine.duration_ms();
        self.engine = Some(engine);
        Ok(())
    }

    fn start(&mut self, start_ms: u64) -> Result<(), TransportError> {
        let Some(engine) = self.engine.as_mut() else {
            return Err(TransportError::Engine("no file loaded".to_string()));
        };

        if let Err(e) = engine.play().and_then(|_| match start_ms {
            0 => Ok(()),
            ms => engine.seek(ms),
        }) {
            self.reset();
            return Err(e);
        }

        self.state.status = TransportStatus::Playing;
        self.state.position_ms = start_ms;
        info!(
            file = ?self.state.current_file,
            at = %self.state.timestamp(),
            "playing"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use crate::engine::{EngineFactory, PlaybackEngine};
    use crate::TransportError;

    /// What the fake engine was told, shared with the test.
    #[derive(Debug, Default)]
    pub struct Script {
        pub calls: Vec<String>,
        pub position_ms: u64,
        pub ended: bool,
        pub loaded: Vec<PathBuf>,
    }

    pub type Shared = Arc<Mutex<Script>>;

    pub struct FakeEngine {
        script: Shared,
        duration_ms: u64,
    }

    impl PlaybackEngine for FakeEngine {
        fn play(&mut self) -> Result<(), TransportError> {
            self.script.lock().unwrap().calls.push("play".into());
            Ok(())
        }

        fn pause(&mut self) -> Result<(), TransportError> {
            self.script.lock().unwrap().calls.push("pause".into());
            Ok(())
        }

        fn stop(&mut self) -> Result<(), TransportError> {
            let mut script = self.script.lock().unwrap();
            script.calls.push("stop".into());
            script.position_ms = 0;
            Ok(())
        }

        fn seek(&mut self, ms: u64) -> Result<(), TransportError> {
            let mut script = self.script.lock().unwrap();
            script.calls.push(format!("seek {}", ms));
            script.position_ms = ms;
            Ok(())
        }

        fn position_ms(&self) -> u64 {
            self.script.lock().unwrap().position_ms
        }

        fn duration_ms(&self) -> u64 {
            self.duration_ms
        }

        fn has_ended(&self) -> bool {
            self.script.lock().unwrap().ended
        }
    }

    pub struct FakeFactory {
        pub script: Shared,
        pub duration_ms: u64,
    }

    impl FakeFactory {
        pub fn new(duration_ms: u64) -> (Self, Shared) {
            let script = Shared::default();
            let factory = Self {
                script: Arc::clone(&script),
                duration_ms,
            };
            (factory, script)
        }
    }

    impl EngineFactory for FakeFactory {
        fn load(&mut self, path: &Path) -> Result<Box<dyn PlaybackEngine>, TransportError> {
            self.script.lock().unwrap().loaded.push(path.to_path_buf());
            Ok(Box::new(FakeEngine {
                script: Arc::clone(&self.script),
                duration_ms: self.duration_ms,
            }))
        }
    }
}
