//! Compiler-facing configuration: binary path, compile modes, background checks.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where to find LilyPond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Path (or bare name looked up on PATH) of the lilypond binary.
    /// Default: lilypond
    #[serde(default = "GeneralConfig::default_lilypond_path")]
    pub lilypond_path: PathBuf,
}

impl GeneralConfig {
    fn default_lilypond_path() -> PathBuf {
        PathBuf::from("lilypond")
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            lilypond_path: Self::default_lilypond_path(),
        }
    }
}

/// Compilation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationConfig {
    /// Extra command line flags, whitespace separated.
    #[serde(default)]
    pub additional_args: String,

    /// Main file to compile instead of the active one, relative to the
    /// workspace root. Empty means "always compile the active file".
    #[serde(default)]
    pub main_file: String,

    /// Whether a save triggers compilation of `main_file` (when set).
    /// Default: true
    #[serde(default = "default_true")]
    pub compile_main_file_on_save: bool,

    /// Whether saving a file triggers compilation at all.
    /// Default: true
    #[serde(default = "default_true")]
    pub compile_on_save: bool,
}

impl CompilationConfig {
    /// Additional arguments split on whitespace. Empty input yields no args.
    pub fn additional_args(&self) -> Vec<String> {
        self.additional_args
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// The configured main file, if any.
    pub fn main_file(&self) -> Option<&str> {
        let trimmed = self.main_file.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self {
            additional_args: String::new(),
            main_file: String::new(),
            compile_main_file_on_save: true,
            compile_on_save: true,
        }
    }
}

/// Background diagnostics ("intellisense") settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntellisenseConfig {
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiet period after the last edit before a check runs.
    /// Default: 500
    #[serde(default = "IntellisenseConfig::default_debounce_ms")]
    pub debounce_ms: u64,
}

impl IntellisenseConfig {
    fn default_debounce_ms() -> u64 {
        500
    }
}

impl Default for IntellisenseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: Self::default_debounce_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or full env-filter directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_additional_args_split() {
        let config = CompilationConfig {
            additional_args: "  -dpoint-and-click=#f   --pdf ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.additional_args(), vec!["-dpoint-and-click=#f", "--pdf"]);
    }

    #[test]
    fn test_additional_args_empty() {
        let config = CompilationConfig::default();
        assert!(config.additional_args().is_empty());
    }

    #[test]
    fn test_main_file_blank_is_none() {
        let mut config = CompilationConfig::default();
        assert_eq!(config.main_file(), None);

        config.main_file = "   ".to_string();
        assert_eq!(config.main_file(), None);

        config.main_file = " score/main.ly ".to_string();
        assert_eq!(config.main_file(), Some("score/main.ly"));
    }

    #[test]
    fn test_intellisense_defaults() {
        let config = IntellisenseConfig::default();
        assert!(config.enabled);
        assert_eq!(config.debounce_ms, 500);
    }
}
