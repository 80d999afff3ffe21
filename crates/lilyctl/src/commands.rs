//! CLI command implementations

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use diagnostics::{analyze, Analysis, DocumentContext, Strategy};
use lilyconf::{port_preference, ConfigSources, LilyConfig};
use midi_io::{list_input_ports, list_output_ports, MidiPortInfo};
use notation::{Accidentals, InputSession};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use transport::{FixedStartTime, SmfEngineFactory, TransportHandle};

use crate::compiler::{compilation_target, CompileMode, CompileOutcome, LilypondCompiler};
use crate::intellisense::{IntellisenseSession, LilypondChecker};
use crate::midi_in::{run_session, settings_from_config, FileSink, MidiInputController, StdoutSink};
use crate::output::{StderrOutput, TracingOutput};
use crate::playback::{run_interactive, LinePrompt, HELP};

/// How often `watch` looks at the file's modification time.
const WATCH_POLL: Duration = Duration::from_millis(250);

fn print_analysis(analysis: &Analysis, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis.diagnostics)?);
        return Ok(());
    }

    if analysis.diagnostics.is_empty() {
        println!("No problems found");
    }
    for diag in &analysis.diagnostics {
        println!("{diag}");
    }
    for dropped in &analysis.dropped {
        debug!(error = %dropped, "message not shown");
    }
    Ok(())
}

/// Compile a score once. Ctrl-C kills the compiler.
pub async fn compile(
    config: &LilyConfig,
    sources: &ConfigSources,
    file: Option<&Path>,
    mode: CompileMode,
) -> Result<()> {
    let target = compilation_target(mode, file, &config.compilation, &sources.workspace_root())?;
    let compiler = Arc::new(LilypondCompiler::from_config(config, Arc::new(StderrOutput)));

    let interrupt = {
        let compiler = Arc::clone(&compiler);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                compiler.kill();
            }
        })
    };
    let saved = (mode == CompileMode::OnSave).then_some(file).flatten();
    let report = compiler.compile(&target, saved).await;
    interrupt.abort();

    let report = report?;
    match report.outcome {
        CompileOutcome::Succeeded => Ok(()),
        CompileOutcome::Killed => bail!("Compilation process killed"),
        CompileOutcome::Failed(code) => {
            if let Ok(doc) = DocumentContext::load(&target) {
                print_analysis(&analyze(&report.stderr, &doc, Strategy::Structured), false)?;
            }
            match code {
                Some(code) => bail!("Compilation failed (exit code {code})"),
                None => bail!("Compilation failed"),
            }
        }
    }
}

/// One diagnostics pass over a file, the way the editor check runs it.
pub async fn check(config: &LilyConfig, file: &Path, grouped: bool, json: bool) -> Result<()> {
    let strategy = if grouped { Strategy::Grouped } else { Strategy::Structured };
    let doc = DocumentContext::load(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut session = IntellisenseSession::new(
        LilypondChecker::from_config(config),
        Duration::from_millis(config.intellisense.debounce_ms),
        strategy,
    );
    let Some(result) = session.check_now(&doc).await else {
        bail!("Intellisense check failed for {}", file.display());
    };

    print_analysis(&result.analysis, json)?;
    if result.analysis.has_errors() {
        bail!("{} has errors", file.display());
    }
    Ok(())
}

fn modified(path: &Path) -> io::Result<SystemTime> {
    std::fs::metadata(path)?.modified()
}

/// Re-check (and compile, when configured) whenever the file changes.
pub async fn watch(config: &LilyConfig, sources: &ConfigSources, file: &Path) -> Result<()> {
    let mut last = modified(file).with_context(|| format!("Cannot watch {}", file.display()))?;
    let workspace_root = sources.workspace_root();

    let mut session = IntellisenseSession::new(
        LilypondChecker::from_config(config),
        Duration::from_millis(config.intellisense.debounce_ms),
        Strategy::Structured,
    );
    let mut results = session.subscribe();
    let compiler = Arc::new(LilypondCompiler::from_config(
        config,
        Arc::new(TracingOutput::new("compile")),
    ));

    if config.intellisense.enabled {
        session.trigger(DocumentContext::load(file)?);
    } else {
        warn!("intellisense is disabled; only compiling on change");
    }

    let mut ticker = tokio::time::interval(WATCH_POLL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(file = %file.display(), "watching for changes (Ctrl-C to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let current = match modified(file) {
                    Ok(current) => current,
                    Err(e) => {
                        warn!(error = %e, "cannot stat watched file");
                        continue;
                    }
                };
                if current == last {
                    continue;
                }
                last = current;
                debug!(file = %file.display(), "file changed");

                if config.intellisense.enabled {
                    match DocumentContext::load(file) {
                        Ok(doc) => session.trigger(doc),
                        Err(e) => warn!(error = %e, "cannot read watched file"),
                    }
                }

                if config.compilation.compile_on_save {
                    match compilation_target(CompileMode::OnSave, Some(file), &config.compilation, &workspace_root) {
                        Ok(target) => {
                            let compiler = Arc::clone(&compiler);
                            let saved = file.to_path_buf();
                            tokio::spawn(async move {
                                if let Err(e) = compiler.compile(&target, Some(saved.as_path())).await {
                                    debug!(error = %e, "compile on save failed");
                                }
                            });
                        }
                        Err(e) => warn!(error = %e, "not compiling"),
                    }
                }
            }
            changed = results.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = results.borrow_and_update().clone();
                if let Some(result) = latest {
                    print_analysis(&result.analysis, false)?;
                }
            }
        }
    }

    session.close(file);
    if compiler.is_running() {
        compiler.kill();
    }
    Ok(())
}

pub struct MidiInOptions {
    pub port: Option<String>,
    pub append: Option<PathBuf>,
    pub chord: bool,
    pub relative: bool,
    pub flats: bool,
}

/// Write what is played on the keyboard to stdout or the end of a file.
pub async fn midi_in(config: &LilyConfig, options: MidiInOptions) -> Result<()> {
    let mut settings = settings_from_config(&config.midi_input)?;
    settings.chord_mode |= options.chord;
    settings.relative_mode |= options.relative;
    if options.flats {
        settings.accidentals = Accidentals::Flats;
    }

    let (tx, mut events) = mpsc::unbounded_channel();
    let mut input = MidiInputController::from_config(&config.midi_input, tx);
    if options.port.is_some() {
        input.set_port(options.port)?;
    }
    input.start()?;
    eprintln!(
        "Listening on {} (Ctrl-C to stop)",
        input.port_name().unwrap_or("MIDI input")
    );

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let inserted = match options.append {
        Some(path) => {
            let sink = FileSink::open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            let mut session = InputSession::new(settings, sink);
            run_session(&mut session, &mut events, &cancel).await
        }
        None => {
            let mut session = InputSession::new(settings, StdoutSink);
            let inserted = run_session(&mut session, &mut events, &cancel).await;
            println!();
            inserted
        }
    };

    interrupt.abort();
    input.stop();
    info!(inserted, "MIDI input finished");
    Ok(())
}

fn print_ports(label: &str, ports: &[MidiPortInfo]) {
    println!("{label}:");
    if ports.is_empty() {
        println!("  (none)");
    }
    for port in ports {
        println!("  {}: {}", port.index, port.name);
    }
}

pub fn devices() -> Result<()> {
    print_ports("MIDI inputs", &list_input_ports()?);
    print_ports("MIDI outputs", &list_output_ports()?);
    Ok(())
}

/// Play the MIDI file compiled from `file`. `from` of `Some("")` asks for the
/// start time on stdin.
pub async fn play(config: &LilyConfig, file: &Path, from: Option<String>) -> Result<()> {
    let factory = SmfEngineFactory::new(
        port_preference(&config.midi_playback.output).map(str::to_string),
    );
    let mut handle = TransportHandle::new(
        factory,
        Duration::from_millis(config.midi_playback.poll_interval_ms),
    );

    match from {
        None => handle.play(file).await?,
        Some(answer) if answer.trim().is_empty() => {
            let mut prompt = LinePrompt::new(io::stdin().lock(), io::stderr());
            handle.play_from(file, &mut prompt).await?;
        }
        Some(answer) => handle.play_from(file, &mut FixedStartTime(answer)).await?,
    }
    eprintln!("{HELP}");

    // tokio's stdin reads through std's shared buffer, so keys typed ahead of
    // the start-time prompt still reach the command loop
    let output = StderrOutput;
    let commands = BufReader::new(tokio::io::stdin());
    let interrupted = tokio::select! {
        end = run_interactive(&mut handle, file, commands, &output) => {
            let end = end?;
            debug!(?end, "playback session over");
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };

    if interrupted {
        handle.reset().await;
    }
    Ok(())
}

pub async fn version(config: &LilyConfig) -> Result<()> {
    println!("lilyctl {}", env!("CARGO_PKG_VERSION"));
    let compiler = LilypondCompiler::from_config(config, Arc::new(StderrOutput));
    let lilypond = compiler.version().await?;
    println!("{lilypond}");
    Ok(())
}

pub fn show_config(config: &LilyConfig, sources: &ConfigSources) {
    if sources.files.is_empty() {
        println!("# no config files found, using defaults");
    }
    for file in &sources.files {
        println!("# loaded: {}", file.display());
    }
    for var in &sources.env_overrides {
        println!("# override: {var}");
    }
    println!("# workspace root: {}", sources.workspace_root().display());
    println!();
    print!("{}", config.to_toml());
}
