//! Standard MIDI File loading for playback.
//!
//! Channel messages from every track are merged into one timeline and
//! stamped with their offset in milliseconds, following the file's tempo
//! map. Meta and sysex events are dropped.

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

/// Microseconds per quarter note until the first tempo event (120 BPM).
const DEFAULT_TEMPO_US: u64 = 500_000;

/// A raw channel message at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedMessage {
    pub at_ms: u64,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
struct TempoChange {
    tick: u64,
    us_per_beat: u64,
}

/// Tick to time conversion for one file.
#[derive(Debug, Clone)]
enum TimeBase {
    Metrical {
        ppq: u64,
        /// Sorted by tick, first entry at tick 0
        tempo_changes: Vec<TempoChange>,
    },
    Timecode {
        ticks_per_second: f64,
    },
}

impl TimeBase {
    fn tick_to_us(&self, tick: u64) -> u64 {
        match self {
            TimeBase::Metrical { ppq, tempo_changes } => {
                let mut us = 0u64;
                for (i, change) in tempo_changes.iter().enumerate() {
                    if change.tick >= tick {
                        break;
                    }
                    let segment_end = tempo_changes
                        .get(i + 1)
                        .map(|next| next.tick.min(tick))
                        .unwrap_or(tick);
                    let ticks = segment_end - change.tick;
                    us = us.saturating_add(ticks.saturating_mul(change.us_per_beat) / ppq);
                }
                us
            }
            TimeBase::Timecode { ticks_per_second } => {
                (tick as f64 / ticks_per_second * 1_000_000.0).round() as u64
            }
        }
    }

    fn tick_to_ms(&self, tick: u64) -> u64 {
        self.tick_to_us(tick) / 1000
    }
}

/// Parsed MIDI file ready for playback
#[derive(Debug, Clone, Default)]
pub struct SmfTimeline {
    /// Sorted by time; simultaneous messages keep file order
    pub messages: Vec<TimedMessage>,
    pub duration_ms: u64,
}

impl SmfTimeline {
    pub fn parse(bytes: &[u8]) -> Result<Self, midly::Error> {
        let smf = Smf::parse(bytes)?;

        let mut tempo_changes = vec![TempoChange {
            tick: 0,
            us_per_beat: DEFAULT_TEMPO_US,
        }];
        let mut events: Vec<(u64, Vec<u8>)> = Vec::new();
        let mut max_tick = 0u64;

        for track in &smf.tracks {
            let mut tick = 0u64;
            for event in track {
                tick += u64::from(event.delta.as_int());
                match event.kind {
                    TrackEventKind::Midi { channel, message } => {
                        events.push((tick, encode(channel.as_int(), message)));
                    }
                    TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                        tempo_changes.push(TempoChange {
                            tick,
                            us_per_beat: u64::from(tempo.as_int()),
                        });
                    }
                    _ => {}
                }
                max_tick = max_tick.max(tick);
            }
        }

        tempo_changes.sort_by_key(|t| t.tick);
        // a tempo event at tick 0 replaces the default
        if tempo_changes.len() > 1 && tempo_changes[1].tick == 0 {
            tempo_changes.remove(0);
        }

        let base = match smf.header.timing {
            Timing::Metrical(ppq) => TimeBase::Metrical {
                ppq: u64::from(ppq.as_int()).max(1),
                tempo_changes,
            },
            Timing::Timecode(fps, subframes) => TimeBase::Timecode {
                ticks_per_second: (f64::from(fps.as_f32()) * f64::from(subframes)).max(1.0),
            },
        };

        events.sort_by_key(|(tick, _)| *tick);
        let messages = events
            .into_iter()
            .map(|(tick, bytes)| TimedMessage {
                at_ms: base.tick_to_ms(tick),
                bytes,
            })
            .collect();

        Ok(Self {
            messages,
            duration_ms: base.tick_to_ms(max_tick),
        })
    }

    /// Index of the first message at or after `ms`.
    pub fn index_at(&self, ms: u64) -> usize {
        self.messages.partition_point(|m| m.at_ms < ms)
    }
}

fn encode(channel: u8, message: MidiMessage) -> Vec<u8> {
    let channel = channel & 0x0F;
    match message {
        MidiMessage::NoteOff { key, vel } => vec![0x80 | channel, key.as_int(), vel.as_int()],
        MidiMessage::NoteOn { key, vel } => vec![0x90 | channel, key.as_int(), vel.as_int()],
        MidiMessage::Aftertouch { key, vel } => vec![0xA0 | channel, key.as_int(), vel.as_int()],
        MidiMessage::Controller { controller, value } => {
            vec![0xB0 | channel, controller.as_int(), value.as_int()]
        }
        MidiMessage::ProgramChange { program } => vec![0xC0 | channel, program.as_int()],
        MidiMessage::ChannelAftertouch { vel } => vec![0xD0 | channel, vel.as_int()],
        MidiMessage::PitchBend { bend } => {
            let raw = bend.0.as_int();
            vec![0xE0 | channel, (raw & 0x7F) as u8, ((raw >> 7) & 0x7F) as u8]
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Format 0 file, 480 ppq: middle C for one beat at 120 BPM, then at
    /// beat 1 the tempo halves and E plays for one beat.
    pub fn two_notes() -> Vec<u8> {
        let track: &[u8] = &[
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // tempo 500000
            0x00, 0x90, 0x3C, 0x64, // C on
            0x83, 0x60, 0x80, 0x3C, 0x40, // +480 C off
            0x00, 0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40, // tempo 1000000
            0x00, 0x90, 0x40, 0x64, // E on
            0x83, 0x60, 0x80, 0x40, 0x40, // +480 E off
            0x00, 0xFF, 0x2F, 0x00, // end of track
        ];
        let mut bytes = b"MThd".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 6, 0, 0, 0, 1, 0x01, 0xE0]);
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(track.len() as u32).to_be_bytes());
        bytes.extend_from_slice(track);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_follows_tempo_map() {
        let timeline = SmfTimeline::parse(&fixtures::two_notes()).unwrap();

        let stamps: Vec<_> = timeline
            .messages
            .iter()
            .map(|m| (m.at_ms, m.bytes.clone()))
            .collect();
        assert_eq!(
            stamps,
            vec![
                (0, vec![0x90, 0x3C, 0x64]),
                (500, vec![0x80, 0x3C, 0x40]),
                (500, vec![0x90, 0x40, 0x64]),
                (1500, vec![0x80, 0x40, 0x40]),
            ]
        );
        assert_eq!(timeline.duration_ms, 1500);
    }

    #[test]
    fn test_index_at() {
        let timeline = SmfTimeline::parse(&fixtures::two_notes()).unwrap();
        assert_eq!(timeline.index_at(0), 0);
        assert_eq!(timeline.index_at(1), 1);
        assert_eq!(timeline.index_at(500), 1);
        assert_eq!(timeline.index_at(501), 3);
        assert_eq!(timeline.index_at(10_000), 4);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SmfTimeline::parse(b"not a midi file").is_err());
    }

    #[test]
    fn test_timecode_base() {
        let base = TimeBase::Timecode {
            ticks_per_second: 1000.0,
        };
        assert_eq!(base.tick_to_ms(2500), 2500);
    }

    #[test]
    fn test_encode_pitch_bend_center() {
        let bend = midly::PitchBend(midly::num::u14::new(0x2000));
        assert_eq!(encode(3, MidiMessage::PitchBend { bend }), vec![0xE3, 0x00, 0x40]);
    }
}
