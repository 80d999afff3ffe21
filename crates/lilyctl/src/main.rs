//! lilyctl - LilyPond compile, check, MIDI input and playback
//!
//! Subcommands:
//! - `lilyctl compile [FILE]` - Compile a score (or the configured main file)
//! - `lilyctl check <FILE>` - Print compiler diagnostics for a file
//! - `lilyctl watch <FILE>` - Re-check and compile on every change
//! - `lilyctl midi-in` - Type notes from a MIDI keyboard
//! - `lilyctl play <FILE>` - Play the MIDI output of a score

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lilyconf::LilyConfig;

use lilyctl::commands::{self, MidiInOptions};
use lilyctl::telemetry;
use lilyctl::CompileMode;

#[derive(Parser)]
#[command(name = "lilyctl")]
#[command(about = "LilyPond compile, diagnostics, MIDI input and playback")]
#[command(version)]
struct Cli {
    /// Config file (instead of ./lilyctl.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a score; with no file, the configured main file
    Compile {
        file: Option<PathBuf>,

        /// Compile exactly this file, ignoring compilation.main_file
        #[arg(long, conflicts_with = "on_save")]
        specific: bool,

        /// Behave like a compile triggered by saving FILE
        #[arg(long)]
        on_save: bool,
    },

    /// Check a file and print its diagnostics
    Check {
        file: PathBuf,

        /// Parse multi-line messages grouped by their location line
        #[arg(long)]
        grouped: bool,

        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-check (and compile, if enabled) whenever FILE changes
    Watch { file: PathBuf },

    /// Turn MIDI keyboard input into LilyPond notes
    MidiIn {
        /// Input port name (substring match)
        #[arg(short, long)]
        port: Option<String>,

        /// Append notes to this file instead of printing them
        #[arg(short, long)]
        append: Option<PathBuf>,

        /// Collect held keys into chords
        #[arg(long)]
        chord: bool,

        /// Omit octave marks, for \relative music
        #[arg(long)]
        relative: bool,

        /// Spell black keys as flats
        #[arg(long)]
        flats: bool,
    },

    /// List MIDI input and output devices
    Devices,

    /// Play the MIDI file compiled from a score
    Play {
        file: PathBuf,

        /// Start position as m:ss; with no value, ask
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        from: Option<String>,
    },

    /// Show lilyctl and LilyPond versions
    Version,

    /// Show the effective configuration and where it came from
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, sources) = LilyConfig::load_with_sources_from(cli.config.as_deref())?;

    telemetry::init(cli.verbose, &config.telemetry.log_level);

    match cli.command {
        Commands::Compile {
            file,
            specific,
            on_save,
        } => {
            let mode = if specific {
                CompileMode::Specific
            } else if on_save {
                CompileMode::OnSave
            } else {
                CompileMode::OnCommand
            };
            commands::compile(&config, &sources, file.as_deref(), mode).await?;
        }
        Commands::Check {
            file,
            grouped,
            json,
        } => {
            commands::check(&config, &file, grouped, json).await?;
        }
        Commands::Watch { file } => {
            commands::watch(&config, &sources, &file).await?;
        }
        Commands::MidiIn {
            port,
            append,
            chord,
            relative,
            flats,
        } => {
            commands::midi_in(
                &config,
                MidiInOptions {
                    port,
                    append,
                    chord,
                    relative,
                    flats,
                },
            )
            .await?;
        }
        Commands::Devices => {
            commands::devices()?;
        }
        Commands::Play { file, from } => {
            commands::play(&config, &file, from).await?;
        }
        Commands::Version => {
            commands::version(&config).await?;
        }
        Commands::Config => {
            commands::show_config(&config, &sources);
        }
    }

    Ok(())
}
