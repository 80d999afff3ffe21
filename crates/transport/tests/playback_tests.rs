//! A real SMF file on disk, played through the controller into a
//! recording output.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use midi_io::{MidiError, MidiSink};
use tempfile::TempDir;
use transport::{
    EngineFactory, FixedStartTime, PlaybackEngine, PollOutcome, SmfPlayer, SmfTimeline,
    TransportController, TransportError, TransportHandle, TransportStatus,
};

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Vec<u8>>>>);

impl Recorder {
    fn note_ons(&self) -> Vec<u8> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m[0] & 0xF0 == 0x90)
            .map(|m| m[1])
            .collect()
    }
}

impl MidiSink for Recorder {
    fn send_raw(&mut self, data: &[u8]) -> Result<(), MidiError> {
        self.0.lock().unwrap().push(data.to_vec());
        Ok(())
    }
}

struct RecordingFactory(Recorder);

impl EngineFactory for RecordingFactory {
    fn load(&mut self, path: &Path) -> Result<Box<dyn PlaybackEngine>, TransportError> {
        let bytes = fs::read(path).unwrap();
        let timeline = SmfTimeline::parse(&bytes).map_err(|e| TransportError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Box::new(SmfPlayer::new(timeline, Box::new(self.0.clone()))?))
    }
}

/// 96 ppq at 600 BPM: a tick is ~1 ms. C, D, E, 40 ticks each.
fn scale_smf() -> Vec<u8> {
    let mut track = vec![0x00, 0xFF, 0x51, 0x03, 0x01, 0x86, 0xA0]; // tempo 100000
    for key in [60u8, 62, 64] {
        track.extend_from_slice(&[0x00, 0x90, key, 0x50]);
        track.extend_from_slice(&[0x28, 0x80, key, 0x00]);
    }
    track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

    let mut bytes = b"MThd".to_vec();
    bytes.extend_from_slice(&[0, 0, 0, 6, 0, 0, 0, 1, 0x00, 0x60]);
    bytes.extend_from_slice(b"MTrk");
    bytes.extend_from_slice(&(track.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&track);
    bytes
}

fn workspace() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("scale.ly");
    fs::write(&source, "\\score { { c' d' e' } \\midi { } }").unwrap();
    fs::write(dir.path().join("scale.mid"), scale_smf()).unwrap();
    (dir, source)
}

#[test]
fn plays_whole_file_then_reports_end() {
    let (_dir, source) = workspace();
    let recorder = Recorder::default();
    let mut transport = TransportController::new(RecordingFactory(recorder.clone()));

    transport.play(&source).unwrap();
    assert_eq!(transport.state().duration_ms, 125);

    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(transport.poll(), PollOutcome::Ended);
    assert_eq!(transport.status(), TransportStatus::Idle);
    assert_eq!(recorder.note_ons(), vec![60, 62, 64]);
}

#[test]
fn play_from_rejects_start_past_end() {
    let (_dir, source) = workspace();
    let recorder = Recorder::default();
    let mut transport = TransportController::new(RecordingFactory(recorder.clone()));

    let err = transport
        .play_from(&source, &mut FixedStartTime("0:01".to_string()))
        .unwrap_err();
    assert!(err.to_string().contains("longer than duration"));
    assert_eq!(transport.status(), TransportStatus::Idle);
    assert!(recorder.note_ons().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn handle_poller_sees_the_end() {
    let (_dir, source) = workspace();
    let recorder = Recorder::default();
    let mut handle = TransportHandle::new(
        RecordingFactory(recorder.clone()),
        Duration::from_millis(20),
    );
    let mut rx = handle.subscribe();

    handle.play(&source).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while *rx.borrow_and_update() != PollOutcome::Ended {
            rx.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    assert_eq!(handle.state().await.status, TransportStatus::Idle);
    assert_eq!(recorder.note_ons(), vec![60, 62, 64]);
}
