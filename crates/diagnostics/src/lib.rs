//! LilyPond compiler messages as editor diagnostics.
//!
//! LilyPond reports problems on stderr as `path:line:column: severity: text`,
//! sometimes followed by an excerpt of the offending source. This crate turns
//! that output into positioned diagnostics:
//!
//! 1. [`parse`] splits the raw output into [`DiagnosticRecord`]s, using either
//!    the single-line structured pattern or the grouped fallback.
//! 2. [`resolve`] maps each record's reported path onto a concrete file,
//!    re-anchoring messages from `\include`d files onto the include line.
//! 3. [`DiagnosticCollection`] holds the result per file until the next check.
//!
//! ```
//! use diagnostics::{analyze, DocumentContext, Severity, Strategy};
//!
//! let ctx = DocumentContext::new("/tmp/score.ly", "\\relative { c d e }\n");
//! let analysis = analyze("-:1:12: error: syntax error\n", &ctx, Strategy::Structured);
//!
//! let diag = &analysis.diagnostics[0];
//! assert_eq!(diag.severity, Severity::Error);
//! assert_eq!(diag.range.end.character, 11);
//! ```

pub mod collection;
pub mod parse;
pub mod resolve;

pub use collection::{analyze, Analysis, DiagnosticCollection};
pub use parse::{group_lines, parse, parse_grouped, parse_structured, ParseReport, Strategy};
pub use resolve::{resolve, DocumentContext, STDIN_SENTINEL};

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagnosticError {
    #[error("cannot resolve `{0}` to a file")]
    UnresolvablePath(String),

    #[error("malformed message `{anchor}`: {reason}")]
    MalformedGroup { anchor: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

impl Severity {
    /// Severity tag as printed by the compiler. Anything unknown is an error.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "warning" => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// One compiler message, positions already 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    /// Path as reported; `-` when the source came from stdin.
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    pub message: String,
    /// The compiler text this record was parsed from.
    pub raw: String,
}

impl DiagnosticRecord {
    /// Build from 1-based positions as printed by the compiler.
    pub fn from_reported(
        file: impl Into<String>,
        line: u32,
        column: u32,
        severity: Severity,
        message: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line: line.saturating_sub(1),
            column: column.saturating_sub(1),
            severity,
            message: message.into(),
            raw: raw.into(),
        }
    }
}

/// Line for the compiler output log, e.g. `ERROR: a.ly:3:1: error: bad`.
pub fn format_for_log(record: &DiagnosticRecord) -> String {
    let label = match record.severity {
        Severity::Error => "ERROR",
        Severity::Warning => "WARNING",
    };
    format!("{}: {}", label, record.raw)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// A record attached to a concrete file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: PathBuf,
    pub range: Range,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.file.display(),
            self.range.start.line + 1,
            self.range.end.character + 1,
            self.severity,
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reported_is_zero_based() {
        let record = DiagnosticRecord::from_reported("a.ly", 3, 1, Severity::Error, "bad", "");
        assert_eq!(record.line, 2);
        assert_eq!(record.column, 0);
    }

    #[test]
    fn test_from_reported_saturates_at_zero() {
        let record = DiagnosticRecord::from_reported("a.ly", 0, 0, Severity::Warning, "odd", "");
        assert_eq!((record.line, record.column), (0, 0));
    }

    #[test]
    fn test_severity_from_tag() {
        assert_eq!(Severity::from_tag("warning"), Severity::Warning);
        assert_eq!(Severity::from_tag("error"), Severity::Error);
        assert_eq!(Severity::from_tag("fatal"), Severity::Error);
    }

    #[test]
    fn test_format_for_log() {
        let record = DiagnosticRecord::from_reported(
            "a.ly",
            3,
            1,
            Severity::Warning,
            "odd",
            "a.ly:3:1: warning: odd",
        );
        assert_eq!(format_for_log(&record), "WARNING: a.ly:3:1: warning: odd");
    }

    #[test]
    fn test_diagnostic_display_is_one_based() {
        let diag = Diagnostic {
            file: PathBuf::from("score.ly"),
            range: Range::new(Position::new(4, 0), Position::new(4, 6)),
            severity: Severity::Error,
            message: "unknown escaped string".to_string(),
        };
        assert_eq!(diag.to_string(), "score.ly:5:7: error: unknown escaped string");
    }
}
