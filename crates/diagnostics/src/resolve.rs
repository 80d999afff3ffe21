//! Mapping reported paths onto files.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::{Diagnostic, DiagnosticError, DiagnosticRecord, Position, Range};

/// Path the compiler reports when reading the source from stdin.
pub const STDIN_SENTINEL: &str = "-";

/// The buffer being checked: where it lives and what it currently contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContext {
    pub path: PathBuf,
    pub text: String,
}

impl DocumentContext {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Read a document from disk.
    pub fn load(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let text = fs::read_to_string(&path)?;
        Ok(Self { path, text })
    }

    /// Directory relative includes are looked up in.
    pub fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn is_same_file(&self, other: &Path) -> bool {
        match (fs::canonicalize(&self.path), fs::canonicalize(other)) {
            (Ok(a), Ok(b)) => a == b,
            _ => self.path == other,
        }
    }

    /// Line of the `\include` directive naming `reported`, if the document
    /// has one. Matches on the included file's name so `"parts/violin.ily"`
    /// and an absolute report of `/score/parts/violin.ily` line up.
    pub fn include_line(&self, reported: &str) -> Option<u32> {
        let name = Path::new(reported).file_name()?.to_str()?;
        let pattern = format!(r#"\\include\s*"(?:[^"\n]*[/\\])?{}""#, regex::escape(name));
        let include = Regex::new(&pattern).ok()?;
        let found = include.find(&self.text)?;

        let line = self.text[..found.start()].matches('\n').count();
        u32::try_from(line).ok()
    }
}

/// Attach a record to a file.
///
/// Order: the stdin sentinel means the document itself; a file named by an
/// `\include` in the document is re-anchored onto that directive's line;
/// an existing absolute path is used as is; a relative path is looked up
/// next to the document. Anything else cannot be shown.
pub fn resolve(record: &DiagnosticRecord, ctx: &DocumentContext) -> Result<Diagnostic, DiagnosticError> {
    let reported = record.file.as_str();
    let point_range = Range::new(
        Position::new(record.line, 0),
        Position::new(record.line, record.column),
    );

    if reported == STDIN_SENTINEL {
        return Ok(diagnostic(ctx.path.clone(), point_range, record, record.message.clone()));
    }

    if let Some(line) = ctx.include_line(reported) {
        let name = Path::new(reported)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| reported.to_string());
        debug!(file = reported, line, "re-anchoring diagnostic onto include");

        let range = Range::new(Position::new(line, 0), Position::new(line + 1, 0));
        let message = format!("{}:{}: {}", name, record.line + 1, record.message);
        return Ok(diagnostic(ctx.path.clone(), range, record, message));
    }

    let path = Path::new(reported);
    if path.is_absolute() && path.exists() {
        let file = if ctx.is_same_file(path) {
            ctx.path.clone()
        } else {
            path.to_path_buf()
        };
        return Ok(diagnostic(file, point_range, record, record.message.clone()));
    }

    let relative = ctx.dir().join(path);
    if !path.is_absolute() && relative.exists() {
        return Ok(diagnostic(relative, point_range, record, record.message.clone()));
    }

    Err(DiagnosticError::UnresolvablePath(reported.to_string()))
}

fn diagnostic(file: PathBuf, range: Range, record: &DiagnosticRecord, message: String) -> Diagnostic {
    Diagnostic {
        file,
        range,
        severity: record.severity,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(file: &str, line: u32, column: u32) -> DiagnosticRecord {
        DiagnosticRecord::from_reported(file, line, column, Severity::Error, "bad", "")
    }

    #[test]
    fn test_stdin_sentinel_is_document() {
        let ctx = DocumentContext::new("/nowhere/score.ly", "{ c }");
        let diag = resolve(&record("-", 3, 5), &ctx).unwrap();

        assert_eq!(diag.file, PathBuf::from("/nowhere/score.ly"));
        assert_eq!(diag.range, Range::new(Position::new(2, 0), Position::new(2, 4)));
        assert_eq!(diag.message, "bad");
    }

    #[test]
    fn test_absolute_existing_path() {
        let dir = TempDir::new().unwrap();
        let other = dir.path().join("other.ly");
        fs::write(&other, "{ d }").unwrap();

        let ctx = DocumentContext::new(dir.path().join("score.ly"), "{ c }");
        let diag = resolve(&record(other.to_str().unwrap(), 1, 1), &ctx).unwrap();
        assert_eq!(diag.file, other);
    }

    #[test]
    fn test_absolute_path_of_document_itself() {
        let dir = TempDir::new().unwrap();
        let score = dir.path().join("score.ly");
        fs::write(&score, "{ c }").unwrap();

        let ctx = DocumentContext::load(&score).unwrap();
        let diag = resolve(&record(score.to_str().unwrap(), 1, 3), &ctx).unwrap();
        assert_eq!(diag.file, score);
        assert_eq!(diag.range.end, Position::new(0, 2));
    }

    #[test]
    fn test_relative_path_next_to_document() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib").join("macros.ily"), "").unwrap();

        let ctx = DocumentContext::new(dir.path().join("score.ly"), "{ c }");
        let diag = resolve(&record("lib/macros.ily", 2, 2), &ctx).unwrap();
        assert_eq!(diag.file, dir.path().join("lib/macros.ily"));
    }

    #[test]
    fn test_unresolvable_path() {
        let dir = TempDir::new().unwrap();
        let ctx = DocumentContext::new(dir.path().join("score.ly"), "{ c }");
        assert_eq!(
            resolve(&record("missing.ily", 1, 1), &ctx),
            Err(DiagnosticError::UnresolvablePath("missing.ily".to_string()))
        );
    }

    #[test]
    fn test_include_reanchors_to_directive_line() {
        let text = "\\version \"2.24.0\"\n\n\\include \"parts/violin.ily\"\n{ c }\n";
        let ctx = DocumentContext::new("/nowhere/score.ly", text);

        let diag = resolve(&record("/elsewhere/parts/violin.ily", 14, 3), &ctx).unwrap();
        assert_eq!(diag.file, PathBuf::from("/nowhere/score.ly"));
        assert_eq!(diag.range, Range::new(Position::new(2, 0), Position::new(3, 0)));
        assert_eq!(diag.message, "violin.ily:14: bad");
    }

    #[test]
    fn test_include_name_is_escaped() {
        // `.` must not match any character
        let ctx = DocumentContext::new("/nowhere/score.ly", "\\include \"aXly\"\n");
        assert_eq!(ctx.include_line("a.ly"), None);

        let ctx = DocumentContext::new("/nowhere/score.ly", "\\include \"a.ly\"\n");
        assert_eq!(ctx.include_line("a.ly"), Some(0));
    }

    #[test]
    fn test_include_requires_whole_file_name() {
        let ctx = DocumentContext::new("/nowhere/score.ly", "\\include \"my-notes.ily\"\n");
        assert_eq!(ctx.include_line("notes.ily"), None);
    }

    #[test]
    fn test_dir_of_bare_file_name() {
        let ctx = DocumentContext::new("score.ly", "");
        assert_eq!(ctx.dir(), Path::new("."));
    }
}
