//! MIDI keyboard to LilyPond text.
//!
//! midir delivers key events on its own thread; the callback forwards them
//! into a tokio channel and [`run_session`] feeds them to an
//! [`InputSession`] that writes note text to a sink.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use lilyconf::{port_preference, MidiInputConfig};
use midi_io::{ActiveMidiInput, MidiError, NoteCallback, NoteEvent};
use notation::{Accidentals, InputSession, InputSettings, NotationError, NoteSink};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub fn settings_from_config(config: &MidiInputConfig) -> Result<InputSettings, NotationError> {
    Ok(InputSettings {
        accidentals: config.accidentals.parse::<Accidentals>()?,
        relative_mode: config.relative_mode,
        chord_mode: config.chord_mode,
    })
}

/// A midir callback that pushes events into the channel.
pub fn forward_to(tx: mpsc::UnboundedSender<NoteEvent>) -> NoteCallback {
    Box::new(move |event| {
        if tx.send(event).is_err() {
            debug!(?event, "note event after session ended");
        }
    })
}

/// Writes note text to stdout as it is played.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl NoteSink for StdoutSink {
    fn insert(&mut self, text: &str) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
            error!(error = %e, "failed to write notes to stdout");
        }
    }
}

/// Appends note text to the end of a file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NoteSink for FileSink {
    fn insert(&mut self, text: &str) {
        if let Err(e) = self.file.write_all(text.as_bytes()).and_then(|()| self.file.flush()) {
            error!(path = %self.path.display(), error = %e, "Error outputting note");
        }
    }
}

/// Owns the keyboard connection so it can be started, stopped and moved to
/// another device.
pub struct MidiInputController {
    port: Option<String>,
    input: Option<ActiveMidiInput>,
    events: mpsc::UnboundedSender<NoteEvent>,
}

impl MidiInputController {
    pub fn new(port: Option<String>, events: mpsc::UnboundedSender<NoteEvent>) -> Self {
        Self {
            port,
            input: None,
            events,
        }
    }

    pub fn from_config(config: &MidiInputConfig, events: mpsc::UnboundedSender<NoteEvent>) -> Self {
        Self::new(port_preference(&config.input).map(str::to_string), events)
    }

    pub fn is_running(&self) -> bool {
        self.input.as_ref().is_some_and(ActiveMidiInput::is_open)
    }

    pub fn port_name(&self) -> Option<&str> {
        self.input.as_ref().map(|input| input.port_name.as_str())
    }

    pub fn start(&mut self) -> Result<(), MidiError> {
        if self.is_running() {
            debug!("MIDI input already running");
            return Ok(());
        }

        let input = ActiveMidiInput::open(self.port.as_deref(), forward_to(self.events.clone()))?;
        info!(port = %input.port_name, "MIDI input started");
        self.input = Some(input);
        Ok(())
    }

    /// Returns false when nothing was running.
    pub fn stop(&mut self) -> bool {
        match self.input.take() {
            Some(mut input) => {
                input.close();
                info!(port = %input.port_name, "MIDI input stopped");
                true
            }
            None => false,
        }
    }

    pub fn restart(&mut self) -> Result<(), MidiError> {
        self.stop();
        self.start()
    }

    /// Switch devices; a running input is reopened on the new one.
    pub fn set_port(&mut self, port: Option<String>) -> Result<(), MidiError> {
        self.port = port;
        if self.is_running() {
            self.restart()?;
        }
        Ok(())
    }
}

impl Drop for MidiInputController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Feed events to the session until the channel closes or `cancel` fires.
/// Returns how many insertions were made.
pub async fn run_session<S: NoteSink>(
    session: &mut InputSession<S>,
    events: &mut mpsc::UnboundedReceiver<NoteEvent>,
    cancel: &CancellationToken,
) -> usize {
    let mut inserted = 0;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => {
                    if session.handle(event).is_some() {
                        inserted += 1;
                    }
                }
                None => {
                    warn!("MIDI input channel closed");
                    break;
                }
            },
        }
    }
    session.reset();
    inserted
}
