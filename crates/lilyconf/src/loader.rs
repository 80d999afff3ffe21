//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, LilyConfig};
use std::env;
use std::path::{Path, PathBuf};

/// System-wide config file.
pub const SYSTEM_CONFIG: &str = "/etc/lilyctl/config.toml";

/// Local override looked up in the current directory.
pub const LOCAL_CONFIG: &str = "lilyctl.toml";

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

impl ConfigSources {
    /// Directory that relative settings (like `compilation.main_file`) are
    /// resolved against: the directory of a local or CLI-provided config
    /// file when one was loaded, otherwise the current directory.
    pub fn workspace_root(&self) -> PathBuf {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let system = Path::new(SYSTEM_CONFIG);
        let user = user_config_path();

        self.files
            .iter()
            .rev()
            .find(|p| p.as_path() != system && Some(p.as_path()) != user.as_deref())
            .and_then(|p| p.parent())
            .map(|parent| {
                if parent.as_os_str().is_empty() {
                    cwd.clone()
                } else if parent.is_absolute() {
                    parent.to_path_buf()
                } else {
                    cwd.join(parent)
                }
            })
            .unwrap_or(cwd)
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("lilyctl/config.toml"))
}

/// Discover config files in standard locations, optionally with a CLI
/// override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli). Only returns
/// files that exist.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from(SYSTEM_CONFIG);
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(user) = user_config_path() {
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load a config file as a raw TOML table.
///
/// The table is validated against [`LilyConfig`] on its own so that a bad
/// value is reported against the file that contains it.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let table = parse_table(&contents, path)?;
    table_to_config(table.clone(), Some(path))?;
    Ok(table)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Deserialize a merged table; missing keys fall back to defaults.
pub fn table_to_config(table: toml::Table, path: Option<&Path>) -> Result<LilyConfig, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.map(Path::to_path_buf).unwrap_or_default(),
            message: e.to_string(),
        })
}

/// Deep-merge `overlay` into `base`; overlay values win, nested tables merge.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut LilyConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, env::vars());
}

/// Apply overrides from an explicit list of variables.
pub fn apply_overrides_from(
    config: &mut LilyConfig,
    sources: &mut ConfigSources,
    vars: impl IntoIterator<Item = (String, String)>,
) {
    for (key, value) in vars {
        let applied = match key.as_str() {
            "LILYCTL_LILYPOND_PATH" => {
                config.general.lilypond_path = expand_path(&value);
                true
            }
            "LILYCTL_ADDITIONAL_ARGS" => {
                config.compilation.additional_args = value;
                true
            }
            "LILYCTL_MAIN_FILE" => {
                config.compilation.main_file = value;
                true
            }
            "LILYCTL_INTELLISENSE" => set_bool(&mut config.intellisense.enabled, &value),
            "LILYCTL_DEBOUNCE_MS" => set_parsed(&mut config.intellisense.debounce_ms, &value),
            "LILYCTL_MIDI_INPUT" => {
                config.midi_input.input = value;
                true
            }
            "LILYCTL_ACCIDENTALS" => {
                config.midi_input.accidentals = value;
                true
            }
            "LILYCTL_CHORD_MODE" => set_bool(&mut config.midi_input.chord_mode, &value),
            "LILYCTL_RELATIVE_MODE" => set_bool(&mut config.midi_input.relative_mode, &value),
            "LILYCTL_MIDI_OUTPUT" => {
                config.midi_playback.output = value;
                true
            }
            "LILYCTL_LOG_LEVEL" | "RUST_LOG" => {
                config.telemetry.log_level = value;
                true
            }
            _ => false,
        };

        if applied {
            sources.env_overrides.push(key);
        }
    }
}

fn set_bool(slot: &mut bool, value: &str) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => {
            *slot = true;
            true
        }
        "0" | "false" | "no" | "off" => {
            *slot = false;
            true
        }
        _ => false,
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, value: &str) -> bool {
    match value.trim().parse() {
        Ok(v) => {
            *slot = v;
            true
        }
        Err(_) => false,
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
