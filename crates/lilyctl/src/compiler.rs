//! Running the LilyPond compiler on a score.
//!
//! One compilation runs at a time per [`LilypondCompiler`]; starting another
//! or calling [`LilypondCompiler::kill`] kills the running process.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use diagnostics::{format_for_log, parse_structured};
use lilyconf::{CompilationConfig, LilyConfig};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::output::OutputLog;

pub const LILYPOND_EXTENSIONS: &[&str] = &["ly", "ily", "lyi"];

pub const LOG_LEVEL_ARG: &str = "--loglevel=WARNING";

/// Arguments for a stdin-fed check: no printed output, MIDI to `-.tmp`.
pub const CHECK_ARGS: &[&str] = &[
    LOG_LEVEL_ARG,
    "--define-default=backend=null",
    "-dmidi-extension=tmp",
    "-",
];

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Only LilyPond files are supported: {0}")]
    NotLilypond(PathBuf),

    #[error("No file to compile: pass a file or set compilation.main_file")]
    NoDocument,

    #[error("Unable to find main file to compile: file does not exist ({0})")]
    MainFileMissing(PathBuf),

    #[error("LilyPond not found at `{0}`; set general.lilypond_path")]
    LilypondNotFound(PathBuf),

    #[error("Failed to run {program}: {source}")]
    Spawn { program: PathBuf, source: io::Error },

    #[error("Can't get LilyPond version from `{0}`")]
    NoVersion(PathBuf),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// What triggered a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// The document was saved
    OnSave,
    /// Explicit compile command; prefers the configured main file
    OnCommand,
    /// Explicit compile of exactly this document
    Specific,
}

impl CompileMode {
    fn uses_main_file(self, config: &CompilationConfig) -> bool {
        match self {
            CompileMode::OnSave => config.compile_main_file_on_save,
            CompileMode::OnCommand => true,
            CompileMode::Specific => false,
        }
    }
}

pub fn is_lilypond_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| LILYPOND_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Decide which file a compilation of `document` actually builds.
///
/// The main file (relative to `workspace_root`) wins for command and
/// on-save compiles when configured, and must exist.
pub fn compilation_target(
    mode: CompileMode,
    document: Option<&Path>,
    config: &CompilationConfig,
    workspace_root: &Path,
) -> Result<PathBuf, CompileError> {
    if let Some(doc) = document {
        if !is_lilypond_file(doc) {
            return Err(CompileError::NotLilypond(doc.to_path_buf()));
        }
    }

    if let Some(main) = config.main_file().filter(|_| mode.uses_main_file(config)) {
        let path = workspace_root.join(main);
        if !path.exists() {
            return Err(CompileError::MainFileMissing(path));
        }
        return Ok(path);
    }

    document
        .map(Path::to_path_buf)
        .ok_or(CompileError::NoDocument)
}

pub fn compile_args(additional: &[String], target: &Path) -> Vec<String> {
    let mut args = vec![LOG_LEVEL_ARG.to_string()];
    args.extend(additional.iter().cloned());
    args.push(target.to_string_lossy().into_owned());
    args
}

/// User arguments first; the check arguments come last and win.
pub fn check_args(additional: &[String]) -> Vec<String> {
    additional
        .iter()
        .cloned()
        .chain(CHECK_ARGS.iter().map(|a| a.to_string()))
        .collect()
}

pub(crate) fn working_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

pub(crate) fn spawn_error(program: &Path, source: io::Error) -> CompileError {
    if source.kind() == io::ErrorKind::NotFound {
        CompileError::LilypondNotFound(program.to_path_buf())
    } else {
        CompileError::Spawn {
            program: program.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
    Succeeded,
    Failed(Option<i32>),
    Killed,
}

#[derive(Debug, Clone)]
pub struct CompileReport {
    pub target: PathBuf,
    pub outcome: CompileOutcome,
    pub stderr: String,
}

enum Exit {
    Exited(io::Result<ExitStatus>),
    Cancelled,
}

pub struct LilypondCompiler {
    binary: PathBuf,
    additional_args: Vec<String>,
    output: Arc<dyn OutputLog>,
    running: Mutex<Option<(u64, CancellationToken)>>,
    next_run: AtomicU64,
}

impl LilypondCompiler {
    pub fn new(
        binary: impl Into<PathBuf>,
        additional_args: Vec<String>,
        output: Arc<dyn OutputLog>,
    ) -> Self {
        Self {
            binary: binary.into(),
            additional_args,
            output,
            running: Mutex::new(None),
            next_run: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &LilyConfig, output: Arc<dyn OutputLog>) -> Self {
        Self::new(
            config.general.lilypond_path.clone(),
            config.compilation.additional_args(),
            output,
        )
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn running(&self) -> MutexGuard<'_, Option<(u64, CancellationToken)>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.running().is_some()
    }

    fn finish(&self, run: u64) {
        let mut running = self.running();
        if running.as_ref().is_some_and(|(id, _)| *id == run) {
            running.take();
        }
    }

    /// Compile `target`, echoing progress to the output log. `saved` is the
    /// document whose save triggered the run, if any.
    pub async fn compile(
        &self,
        target: &Path,
        saved: Option<&Path>,
    ) -> Result<CompileReport, CompileError> {
        let run = self.next_run.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Some((_, previous)) = self.running().replace((run, token.clone())) {
            debug!("killing previous compilation");
            previous.cancel();
        }

        let result = self.run(target, saved, &token).await;
        self.finish(run);

        if let Err(e) = &result {
            error!(error = %e, "Compilation failed");
            self.output.append_line(&format!("Compilation failed: {e}"));
        }
        result
    }

    async fn run(
        &self,
        target: &Path,
        saved: Option<&Path>,
        token: &CancellationToken,
    ) -> Result<CompileReport, CompileError> {
        if let Some(saved) = saved {
            self.output.append_line(&format!("[SAVED]: {}", saved.display()));
        }
        self.output.append_line(&format!("Compiling: {}", target.display()));
        info!(target = %target.display(), "Compiling...");

        let mut child = Command::new(&self.binary)
            .args(compile_args(&self.additional_args, target))
            .current_dir(working_dir(target))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.binary, e))?;

        let stdout = child
            .stdout
            .take()
            .map(|s| tokio::spawn(forward_lines(s, Arc::clone(&self.output))));
        let stderr = child
            .stderr
            .take()
            .map(|s| tokio::spawn(forward_lines(s, Arc::clone(&self.output))));

        let exit = tokio::select! {
            status = child.wait() => Exit::Exited(status),
            _ = token.cancelled() => Exit::Cancelled,
        };

        let status = match exit {
            Exit::Exited(status) => Some(status?),
            Exit::Cancelled => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill compilation process");
                }
                None
            }
        };

        if let Some(task) = stdout {
            let _ = task.await;
        }
        let stderr = match stderr {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        for record in parse_structured(&stderr).records {
            self.output.append_line(&format_for_log(&record));
        }

        let outcome = match status {
            None => CompileOutcome::Killed,
            Some(status) => {
                debug!(code = ?status.code(), "Compilation process exited");
                if status.success() {
                    info!("Compilation successful");
                    self.output.append_line("Compilation successful");
                    CompileOutcome::Succeeded
                } else {
                    error!("Compilation failed");
                    self.output.append_line("Compilation failed");
                    CompileOutcome::Failed(status.code())
                }
            }
        };

        Ok(CompileReport {
            target: target.to_path_buf(),
            outcome,
            stderr,
        })
    }

    /// Kill the running compilation. Returns false when nothing was running.
    pub fn kill(&self) -> bool {
        match self.running().take() {
            Some((_, token)) => {
                token.cancel();
                info!("Compilation process killed");
                self.output.append_line("Compilation process killed");
                true
            }
            None => {
                info!("No active compilation process running");
                false
            }
        }
    }

    /// First line of `lilypond -v`.
    pub async fn version(&self) -> Result<String, CompileError> {
        let output = Command::new(&self.binary)
            .arg("-v")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(&self.binary, e))?;

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| CompileError::NoVersion(self.binary.clone()))
    }
}

/// Copy lines to the output log and return everything read.
async fn forward_lines<R>(stream: R, output: Arc<dyn OutputLog>) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    let mut collected = String::new();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                output.append_line(&line);
                collected.push_str(&line);
                collected.push('\n');
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stopped reading compiler output");
                break;
            }
        }
    }
    collected
}
