//! Where compiler and checker chatter goes.
//!
//! The compiler writes its progress lines (`Compiling: ...`, echoed stderr,
//! `Compilation successful`) to an [`OutputLog`]. The CLI uses
//! [`StderrOutput`]; long-running modes use [`TracingOutput`] so the lines
//! interleave with the rest of the log.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

pub trait OutputLog: Send + Sync {
    fn append_line(&self, line: &str);
}

/// Plain lines on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrOutput;

impl OutputLog for StderrOutput {
    fn append_line(&self, line: &str) {
        eprintln!("{}", line.trim_end());
    }
}

/// Lines as `info` events tagged with the channel name.
#[derive(Debug, Clone)]
pub struct TracingOutput {
    pub channel: &'static str,
}

impl TracingOutput {
    pub fn new(channel: &'static str) -> Self {
        Self { channel }
    }
}

impl OutputLog for TracingOutput {
    fn append_line(&self, line: &str) {
        info!(channel = self.channel, "{}", line.trim_end());
    }
}

/// Keeps every line in memory.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl OutputLog for CapturedOutput {
    fn append_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.trim_end().to_string());
    }
}
