use midir::{MidiInput, MidiInputConnection};
use notation::NoteEvent;
use tracing::{debug, info};

use crate::{select_port, MidiError};

/// Decode a raw channel message into a key event.
///
/// Note-on with velocity 0 is a release. Everything else (controllers,
/// clock, sysex) yields `None`.
pub fn decode_note_event(data: &[u8]) -> Option<NoteEvent> {
    let &[status, note, velocity, ..] = data else {
        return None;
    };
    if note > 0x7F {
        return None;
    }

    match status & 0xF0 {
        0x90 if velocity > 0 => Some(NoteEvent::Press { note, velocity }),
        0x90 | 0x80 => Some(NoteEvent::Release { note }),
        _ => None,
    }
}

/// Called from midir's thread for every decoded key event.
pub type NoteCallback = Box<dyn Fn(NoteEvent) + Send + 'static>;

/// Open keyboard connection. Closed on drop.
pub struct ActiveMidiInput {
    connection: Option<MidiInputConnection<()>>,
    pub port_name: String,
}

impl ActiveMidiInput {
    /// Open the input whose name contains `port_pattern`, or the first
    /// available input when no pattern is given.
    pub fn open(port_pattern: Option<&str>, callback: NoteCallback) -> Result<Self, MidiError> {
        let midi_in =
            MidiInput::new("lilyctl-in").map_err(|e| MidiError::InitFailed(e.to_string()))?;

        let ports = midi_in.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_in.port_name(p).unwrap_or_default())
            .collect();
        let index = select_port(&names, port_pattern, "input")?;
        let port = &ports[index];
        let port_name = names[index].clone();

        let connection = midi_in
            .connect(
                port,
                "lilyctl-input",
                move |_timestamp_us, data, _| match decode_note_event(data) {
                    Some(event) => callback(event),
                    None => debug!("ignoring MIDI message {:02X?}", data),
                },
                (),
            )
            .map_err(|e| MidiError::ConnectionFailed(e.to_string()))?;

        info!("Opened MIDI input: {}", port_name);

        Ok(Self {
            connection: Some(connection),
            port_name,
        })
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    pub fn close(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
            info!("Closed MIDI input: {}", self.port_name);
        }
    }
}

impl Drop for ActiveMidiInput {
    fn drop(&mut self) {
        self.close();
    }
}
