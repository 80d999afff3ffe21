use midir::{MidiOutput, MidiOutputConnection};
use tracing::info;

use crate::{select_port, MidiError};

/// Anything that accepts raw MIDI bytes.
pub trait MidiSink: Send {
    fn send_raw(&mut self, data: &[u8]) -> Result<(), MidiError>;

    /// Silence every channel.
    fn silence(&mut self) -> Result<(), MidiError> {
        for message in all_notes_off() {
            self.send_raw(&message)?;
        }
        Ok(())
    }
}

/// "All notes off" (CC 123) and "all sound off" (CC 120) on every channel.
pub fn all_notes_off() -> Vec<[u8; 3]> {
    (0u8..16)
        .flat_map(|channel| [[0xB0 | channel, 123, 0], [0xB0 | channel, 120, 0]])
        .collect()
}

/// Open synth connection. Closed on drop.
pub struct ActiveMidiOutput {
    connection: Option<MidiOutputConnection>,
    pub port_name: String,
}

impl ActiveMidiOutput {
    /// Open the output whose name contains `port_pattern`, or the first
    /// available output when no pattern is given.
    pub fn open(port_pattern: Option<&str>) -> Result<Self, MidiError> {
        let midi_out =
            MidiOutput::new("lilyctl-out").map_err(|e| MidiError::InitFailed(e.to_string()))?;

        let ports = midi_out.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_out.port_name(p).unwrap_or_default())
            .collect();
        let index = select_port(&names, port_pattern, "output")?;
        let port_name = names[index].clone();

        let connection = midi_out
            .connect(&ports[index], "lilyctl-output")
            .map_err(|e| MidiError::ConnectionFailed(e.to_string()))?;

        info!("Opened MIDI output: {}", port_name);

        Ok(Self {
            connection: Some(connection),
            port_name,
        })
    }

    pub fn close(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
            info!("Closed MIDI output: {}", self.port_name);
        }
    }
}

impl MidiSink for ActiveMidiOutput {
    fn send_raw(&mut self, data: &[u8]) -> Result<(), MidiError> {
        let conn = self
            .connection
            .as_mut()
            .ok_or_else(|| MidiError::SendFailed("Connection closed".to_string()))?;
        conn.send(data)
            .map_err(|e| MidiError::SendFailed(e.to_string()))
    }
}

impl Drop for ActiveMidiOutput {
    fn drop(&mut self) {
        self.close();
    }
}
