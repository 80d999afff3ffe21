//! Splitting compiler output into records.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{DiagnosticError, DiagnosticRecord, Severity};

static STRUCTURED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([^\n\r]+):(\d+):(\d+): (error|warning): ([^\n\r]+)")
        .expect("structured pattern compiles")
});

static ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+):(\d+)").expect("anchor pattern compiles"));

/// Which parser to run over the compiler output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One message per `path:line:col: severity: text` line.
    #[default]
    Structured,
    /// A position line plus any continuation lines below it.
    Grouped,
}

/// Records parsed from one compiler run, plus the groups that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub records: Vec<DiagnosticRecord>,
    pub errors: Vec<DiagnosticError>,
}

pub fn parse(output: &str, strategy: Strategy) -> ParseReport {
    match strategy {
        Strategy::Structured => parse_structured(output),
        Strategy::Grouped => parse_grouped(output),
    }
}

pub fn parse_structured(output: &str) -> ParseReport {
    let mut report = ParseReport::default();

    for caps in STRUCTURED.captures_iter(output) {
        let raw = &caps[0];
        match (caps[2].parse::<u32>(), caps[3].parse::<u32>()) {
            (Ok(line), Ok(column)) => report.records.push(DiagnosticRecord::from_reported(
                &caps[1],
                line,
                column,
                Severity::from_tag(&caps[4]),
                &caps[5],
                raw,
            )),
            _ => {
                let err = DiagnosticError::MalformedGroup {
                    anchor: raw.to_string(),
                    reason: "position out of range".to_string(),
                };
                warn!(error = %err, "skipping compiler message");
                report.errors.push(err);
            }
        }
    }

    debug!(records = report.records.len(), "structured parse");
    report
}

/// Split output into groups. A line containing `line:col` opens a group;
/// following lines are its continuation. Lines before the first group are
/// discarded.
pub fn group_lines(output: &str) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = Vec::new();

    for line in output.lines() {
        if ANCHOR.is_match(line) {
            groups.push(vec![line.to_string()]);
        } else if let Some(group) = groups.last_mut() {
            group.push(line.to_string());
        }
    }

    groups
}

pub fn parse_grouped(output: &str) -> ParseReport {
    let mut report = ParseReport::default();

    for group in group_lines(output) {
        match record_from_group(&group) {
            Ok(record) => report.records.push(record),
            Err(err) => {
                warn!(error = %err, "skipping compiler message");
                report.errors.push(err);
            }
        }
    }

    debug!(records = report.records.len(), errors = report.errors.len(), "grouped parse");
    report
}

fn record_from_group(group: &[String]) -> Result<DiagnosticRecord, DiagnosticError> {
    let Some((anchor, continuation)) = group.split_first() else {
        return Err(malformed("", "empty group"));
    };
    let caps = ANCHOR
        .captures(anchor)
        .ok_or_else(|| malformed(anchor, "no line:column position"))?;
    let position = caps.get(0).ok_or_else(|| malformed(anchor, "no line:column position"))?;

    let file = anchor[..position.start()].trim_end_matches(':').trim();
    if file.is_empty() {
        return Err(malformed(anchor, "no file name before the position"));
    }

    let line: u32 = caps[1]
        .parse()
        .map_err(|_| malformed(anchor, "line number out of range"))?;
    let column: u32 = caps[2]
        .parse()
        .map_err(|_| malformed(anchor, "column number out of range"))?;

    let rest = anchor[position.end()..].trim_start_matches(':').trim();
    let (severity, text) = match rest.split_once(':') {
        Some((tag @ ("error" | "warning"), text)) => (Severity::from_tag(tag), text.trim()),
        _ => (Severity::Error, rest),
    };

    let mut message = text.to_string();
    for extra in continuation {
        message.push('\n');
        message.push_str(extra);
    }

    Ok(DiagnosticRecord::from_reported(
        file,
        line,
        column,
        severity,
        message,
        group.join("\n"),
    ))
}

fn malformed(anchor: &str, reason: &str) -> DiagnosticError {
    DiagnosticError::MalformedGroup {
        anchor: anchor.to_string(),
        reason: reason.to_string(),
    }
}
