//! lilyctl - LilyPond workflow library
//!
//! This library provides:
//! - `compiler`: running LilyPond on a score, main-file selection, kill
//! - `intellisense`: debounced stdin checks feeding a diagnostic collection
//! - `midi_in`: MIDI keyboard events to note text
//! - `playback`: interactive transport over a compiled MIDI file
//! - `output`: where compiler output lines go
//! - `commands`: CLI command implementations
//! - `telemetry`: tracing setup

pub mod commands;
pub mod compiler;
pub mod intellisense;
pub mod midi_in;
pub mod output;
pub mod playback;
pub mod telemetry;

pub use compiler::{CompileError, CompileMode, CompileOutcome, CompileReport, LilypondCompiler};
pub use intellisense::{CheckResult, CheckRunner, IntellisenseSession, LilypondChecker};
pub use output::{CapturedOutput, OutputLog, StderrOutput, TracingOutput};
