//! Layered configuration loading for lilyctl.
//!
//! This crate provides configuration loading with minimal dependencies,
//! designed to be imported by every lilyctl crate.
//!
//! # Usage
//!
//! ```rust,no_run
//! use lilyconf::LilyConfig;
//!
//! let config = LilyConfig::load().expect("Failed to load config");
//!
//! println!("lilypond: {}", config.general.lilypond_path.display());
//! println!("chord mode: {}", config.midi_input.chord_mode);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/lilyctl/config.toml` (system)
//! 2. `~/.config/lilyctl/config.toml` (user)
//! 3. `./lilyctl.toml` (local override, or the `--config` path)
//! 4. Environment variables (`LILYCTL_*`)
//!
//! # Example Config
//!
//! ```toml
//! [general]
//! lilypond_path = "~/bin/lilypond"
//!
//! [compilation]
//! additional_args = "-dpoint-and-click=#f"
//! main_file = "score/main.ly"
//!
//! [intellisense]
//! debounce_ms = 750
//!
//! [midi_input]
//! input = "Keystation"
//! accidentals = "flats"
//! chord_mode = true
//!
//! [midi_playback]
//! output = "FLUID Synth"
//!
//! [telemetry]
//! log_level = "debug"
//! ```

pub mod compiler;
pub mod loader;
pub mod midi;

pub use compiler::{CompilationConfig, GeneralConfig, IntellisenseConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, expand_path, ConfigSources};
pub use midi::{port_preference, MidiInputConfig, MidiPlaybackConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete lilyctl configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LilyConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub compilation: CompilationConfig,

    #[serde(default)]
    pub intellisense: IntellisenseConfig,

    #[serde(default)]
    pub midi_input: MidiInputConfig,

    #[serde(default)]
    pub midi_playback: MidiPlaybackConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl LilyConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/lilyctl/config.toml`
    /// 3. `~/.config/lilyctl/config.toml`
    /// 4. `./lilyctl.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./lilyctl.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in files {
            let table = loader::load_table(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let mut config = loader::table_to_config(merged, sources.files.last().map(PathBuf::as_path))?;
        loader::apply_env_overrides(&mut config, &mut sources);
        config.general.lilypond_path = loader::expand_path(&config.general.lilypond_path.to_string_lossy());

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Build TOML manually for stable section ordering and comments
        let mut output = String::new();

        output.push_str("# lilyctl configuration\n\n");

        output.push_str("[general]\n");
        output.push_str(&format!(
            "lilypond_path = {}\n",
            quote(&self.general.lilypond_path.to_string_lossy())
        ));

        output.push_str("\n[compilation]\n");
        output.push_str(&format!(
            "additional_args = {}\n",
            quote(&self.compilation.additional_args)
        ));
        output.push_str(&format!("main_file = {}\n", quote(&self.compilation.main_file)));
        output.push_str(&format!(
            "compile_main_file_on_save = {}\n",
            self.compilation.compile_main_file_on_save
        ));
        output.push_str(&format!(
            "compile_on_save = {}\n",
            self.compilation.compile_on_save
        ));

        output.push_str("\n[intellisense]\n");
        output.push_str(&format!("enabled = {}\n", self.intellisense.enabled));
        output.push_str(&format!("debounce_ms = {}\n", self.intellisense.debounce_ms));

        output.push_str("\n[midi_input]\n");
        output.push_str(&format!("input = {}\n", quote(&self.midi_input.input)));
        output.push_str(&format!(
            "accidentals = {}\n",
            quote(&self.midi_input.accidentals)
        ));
        output.push_str(&format!("relative_mode = {}\n", self.midi_input.relative_mode));
        output.push_str(&format!("chord_mode = {}\n", self.midi_input.chord_mode));

        output.push_str("\n[midi_playback]\n");
        output.push_str(&format!("output = {}\n", quote(&self.midi_playback.output)));
        output.push_str(&format!(
            "poll_interval_ms = {}\n",
            self.midi_playback.poll_interval_ms
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = {}\n", quote(&self.telemetry.log_level)));

        output
    }
}

fn quote(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}
