//! Finding the MIDI file LilyPond wrote for a source file.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::TransportError;

const SMF_SIGNATURE: &[u8; 4] = b"MThd";

/// Locate the MIDI output for `source` (e.g. `score.ly`).
///
/// Tries `score.midi`, then `score.mid`, then any sibling whose path starts
/// with `score` (shortest first, so `score-1.mid` beats `score-1-1.mid`)
/// and whose content starts with the SMF header.
pub fn locate_midi_file(source: &Path) -> Result<PathBuf, TransportError> {
    let base = source.with_extension("");

    for ext in [".midi", ".mid"] {
        let mut candidate = OsString::from(base.as_os_str());
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "found MIDI file");
            return Ok(candidate);
        }
    }

    let not_found = || TransportError::MidiFileNotFound(source.to_path_buf());
    let dir = match base.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let prefix = dir
        .join(base.file_name().ok_or_else(not_found)?)
        .to_string_lossy()
        .into_owned();

    let mut siblings: Vec<PathBuf> = fs::read_dir(&dir)
        .map_err(|_| not_found())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.to_string_lossy().starts_with(&prefix))
        .collect();
    siblings.sort_by(|a, b| {
        let (a_len, b_len) = (a.as_os_str().len(), b.as_os_str().len());
        a_len.cmp(&b_len).then_with(|| a.cmp(b))
    });

    siblings
        .into_iter()
        .find(|path| has_smf_signature(path))
        .inspect(|path| debug!(path = %path.display(), "found MIDI file by signature"))
        .ok_or_else(not_found)
}

fn has_smf_signature(path: &Path) -> bool {
    let mut header = [0u8; 4];
    File::open(path)
        .and_then(|mut f| f.read_exact(&mut header))
        .map(|_| &header == SMF_SIGNATURE)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_prefers_midi_extension() {
        let dir = TempDir::new().unwrap();
        let source = touch(&dir, "score.ly", b"{ c }");
        touch(&dir, "score.mid", b"MThd");
        let midi = touch(&dir, "score.midi", b"MThd");

        assert_eq!(locate_midi_file(&source).unwrap(), midi);
    }

    #[test]
    fn test_falls_back_to_mid() {
        let dir = TempDir::new().unwrap();
        let source = touch(&dir, "score.ly", b"{ c }");
        let mid = touch(&dir, "score.mid", b"MThd");

        assert_eq!(locate_midi_file(&source).unwrap(), mid);
    }

    #[test]
    fn test_dotted_base_name() {
        let dir = TempDir::new().unwrap();
        let source = touch(&dir, "op.12.ly", b"{ c }");
        let midi = touch(&dir, "op.12.midi", b"MThd");

        assert_eq!(locate_midi_file(&source).unwrap(), midi);
    }

    #[test]
    fn test_sibling_by_signature_shortest_first() {
        let dir = TempDir::new().unwrap();
        let source = touch(&dir, "score.ly", b"{ c }");
        touch(&dir, "score-1.txt", b"not midi");
        touch(&dir, "score-1-1.out", b"MThd\0\0\0\x06");
        let expected = touch(&dir, "score-2.out", b"MThd\0\0\0\x06");

        assert_eq!(locate_midi_file(&source).unwrap(), expected);
    }

    #[test]
    fn test_not_found() {
        let dir = TempDir::new().unwrap();
        let source = touch(&dir, "score.ly", b"{ c }");
        touch(&dir, "other.midi", b"MThd");

        assert!(matches!(
            locate_midi_file(&source),
            Err(TransportError::MidiFileNotFound(p)) if p == source
        ));
    }
}
