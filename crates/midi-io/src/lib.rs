//! MIDI I/O through midir.
//!
//! Input ports deliver key presses and releases as [`NoteEvent`]s, decoded
//! once at the boundary. Output ports take raw bytes, which is all a file
//! player needs.

pub mod input;
pub mod output;

pub use input::{decode_note_event, ActiveMidiInput, NoteCallback};
pub use output::{all_notes_off, ActiveMidiOutput, MidiSink};

pub use notation::NoteEvent;

use midir::{MidiInput, MidiOutput};

/// Error type for MIDI operations
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("Failed to initialize MIDI: {0}")]
    InitFailed(String),

    #[error("No MIDI {0} devices found")]
    NoPorts(&'static str),

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Information about a discovered MIDI port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPortInfo {
    /// Port index (for midir connection)
    pub index: usize,
    pub name: String,
}

/// List available MIDI input ports
pub fn list_input_ports() -> Result<Vec<MidiPortInfo>, MidiError> {
    let midi_in =
        MidiInput::new("lilyctl-scan").map_err(|e| MidiError::InitFailed(e.to_string()))?;

    let ports = midi_in
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_in
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect();

    Ok(ports)
}

/// List available MIDI output ports
pub fn list_output_ports() -> Result<Vec<MidiPortInfo>, MidiError> {
    let midi_out =
        MidiOutput::new("lilyctl-scan").map_err(|e| MidiError::InitFailed(e.to_string()))?;

    let ports = midi_out
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_out
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect();

    Ok(ports)
}

/// Pick a port index from the available names.
///
/// With no pattern the first port is the system default. A pattern matches
/// any port whose name contains it.
pub fn select_port(
    names: &[String],
    pattern: Option<&str>,
    direction: &'static str,
) -> Result<usize, MidiError> {
    if names.is_empty() {
        return Err(MidiError::NoPorts(direction));
    }

    match pattern.filter(|p| !p.is_empty()) {
        None => Ok(0),
        Some(pattern) => names
            .iter()
            .position(|name| name.contains(pattern))
            .ok_or_else(|| MidiError::PortNotFound(pattern.to_string())),
    }
}
