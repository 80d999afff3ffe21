//! Real-time SMF playback to a MIDI output port.
//!
//! A dedicated thread walks the timeline against a [`PlaybackClock`] and
//! sends every message whose time has come. Transport calls only flip the
//! clock and cursor under the shared lock.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use midi_io::{ActiveMidiOutput, MidiSink};
use tracing::{debug, info, warn};

use crate::clock::PlaybackClock;
use crate::engine::{EngineFactory, PlaybackEngine};
use crate::smf::SmfTimeline;
use crate::TransportError;

const WORKER_TICK: Duration = Duration::from_millis(2);

struct PlayerState {
    clock: PlaybackClock,
    /// Next message to send
    cursor: usize,
    ended: bool,
    sink: Box<dyn MidiSink>,
}

impl PlayerState {
    fn silence(&mut self) {
        if let Err(e) = self.sink.silence() {
            warn!(error = %e, "failed to silence MIDI output");
        }
    }
}

struct Shared {
    state: Mutex<PlayerState>,
    shutdown: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct SmfPlayer {
    timeline: Arc<SmfTimeline>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl SmfPlayer {
    pub fn new(timeline: SmfTimeline, sink: Box<dyn MidiSink>) -> Result<Self, TransportError> {
        let timeline = Arc::new(timeline);
        let shared = Arc::new(Shared {
            state: Mutex::new(PlayerState {
                clock: PlaybackClock::new(),
                cursor: 0,
                ended: false,
                sink,
            }),
            shutdown: AtomicBool::new(false),
        });

        let worker = {
            let timeline = Arc::clone(&timeline);
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("smf-player".to_string())
                .spawn(move || run_worker(&timeline, &shared))
                .map_err(|e| TransportError::Engine(e.to_string()))?
        };

        Ok(Self {
            timeline,
            shared,
            worker: Some(worker),
        })
    }
}

fn run_worker(timeline: &SmfTimeline, shared: &Shared) {
    while !shared.shutdown.load(Ordering::Relaxed) {
        {
            let mut state = shared.lock();
            if state.clock.is_running() {
                let now = state.clock.tick();

                while let Some(message) = timeline.messages.get(state.cursor) {
                    if message.at_ms > now {
                        break;
                    }
                    if let Err(e) = state.sink.send_raw(&message.bytes) {
                        warn!(error = %e, "dropped MIDI message");
                    }
                    state.cursor += 1;
                }

                if now >= timeline.duration_ms && state.cursor >= timeline.messages.len() {
                    debug!(duration_ms = timeline.duration_ms, "playback reached the end");
                    state.clock.stop();
                    state.cursor = 0;
                    state.ended = true;
                    state.silence();
                }
            }
        }
        thread::sleep(WORKER_TICK);
    }
}

impl PlaybackEngine for SmfPlayer {
    fn play(&mut self) -> Result<(), TransportError> {
        let mut state = self.shared.lock();
        state.ended = false;
        state.clock.start();
        Ok(())
    }

    fn pause(&mut self) -> Result<(), TransportError> {
        let mut state = self.shared.lock();
        state.clock.pause();
        state.silence();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        let mut state = self.shared.lock();
        state.clock.stop();
        state.cursor = 0;
        state.silence();
        Ok(())
    }

    fn seek(&mut self, ms: u64) -> Result<(), TransportError> {
        let ms = ms.min(self.timeline.duration_ms);
        let mut state = self.shared.lock();
        state.clock.seek(ms);
        state.cursor = self.timeline.index_at(ms);
        state.silence();
        Ok(())
    }

    fn position_ms(&self) -> u64 {
        self.shared.lock().clock.tick()
    }

    fn duration_ms(&self) -> u64 {
        self.timeline.duration_ms
    }

    fn has_ended(&self) -> bool {
        self.shared.lock().ended
    }
}

impl Drop for SmfPlayer {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("SMF player thread panicked");
            }
        }
        self.shared.lock().silence();
    }
}

/// Loads files with midly and plays them on a midir output port.
#[derive(Debug, Clone, Default)]
pub struct SmfEngineFactory {
    /// Output port name pattern; empty or `None` picks the first port
    pub output: Option<String>,
}

impl SmfEngineFactory {
    pub fn new(output: Option<String>) -> Self {
        Self { output }
    }
}

impl EngineFactory for SmfEngineFactory {
    fn load(&mut self, path: &Path) -> Result<Box<dyn PlaybackEngine>, TransportError> {
        let load_error = |message: String| TransportError::Load {
            path: path.to_path_buf(),
            message,
        };

        let bytes = fs::read(path).map_err(|e| load_error(e.to_string()))?;
        let timeline = SmfTimeline::parse(&bytes).map_err(|e| load_error(e.to_string()))?;
        let output = ActiveMidiOutput::open(self.output.as_deref())?;

        info!(
            path = %path.display(),
            port = %output.port_name,
            messages = timeline.messages.len(),
            duration_ms = timeline.duration_ms,
            "loaded MIDI file"
        );
        Ok(Box::new(SmfPlayer::new(timeline, Box::new(output))?))
    }
}
