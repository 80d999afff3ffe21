//! Live diagnostics: re-check the document shortly after it stops changing.
//!
//! Each trigger restarts the debounce timer. When it fires the document text
//! is piped into LilyPond with printing disabled, and the parsed messages
//! replace the diagnostic collection. Only one check is in flight; a new
//! trigger aborts the old task, which kills its process.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use diagnostics::{analyze, Analysis, Diagnostic, DiagnosticCollection, DocumentContext, Strategy};
use lilyconf::LilyConfig;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::compiler::{check_args, spawn_error, CompileError};

/// MIDI file LilyPond leaves behind when checking from stdin.
pub const TMP_MIDI_FILE: &str = "-.tmp";

/// Runs the compiler over a document and hands back its stderr.
#[async_trait]
pub trait CheckRunner: Send + Sync + 'static {
    async fn check(&self, doc: &DocumentContext) -> Result<String, CompileError>;
}

pub struct LilypondChecker {
    binary: PathBuf,
    additional_args: Vec<String>,
}

impl LilypondChecker {
    pub fn new(binary: impl Into<PathBuf>, additional_args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            additional_args,
        }
    }

    pub fn from_config(config: &LilyConfig) -> Self {
        Self::new(
            config.general.lilypond_path.clone(),
            config.compilation.additional_args(),
        )
    }
}

#[async_trait]
impl CheckRunner for LilypondChecker {
    async fn check(&self, doc: &DocumentContext) -> Result<String, CompileError> {
        let mut child = Command::new(&self.binary)
            .args(check_args(&self.additional_args))
            .current_dir(doc.dir())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.binary, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(doc.text.as_bytes()).await {
                warn!(error = %e, "compiler closed stdin early");
            }
        }

        let output = child.wait_with_output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(%stdout, "Intellisense: no errors");
        }
        debug!(code = ?output.status.code(), "Intellisense process exited");

        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }
}

/// Remove the stray `-.tmp` a stdin check writes next to the document.
pub fn remove_tmp_midi(dir: &Path) -> io::Result<bool> {
    let path = dir.join(TMP_MIDI_FILE);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed temporary MIDI output");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Result of one completed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub document: PathBuf,
    pub analysis: Analysis,
}

type SharedCollection = Arc<Mutex<DiagnosticCollection>>;

fn lock(collection: &SharedCollection) -> MutexGuard<'_, DiagnosticCollection> {
    collection.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct IntellisenseSession<R: CheckRunner> {
    runner: Arc<R>,
    strategy: Strategy,
    debounce: Duration,
    collection: SharedCollection,
    pending: Option<(PathBuf, JoinHandle<()>)>,
    updates: watch::Sender<Option<CheckResult>>,
}

impl<R: CheckRunner> IntellisenseSession<R> {
    pub fn new(runner: R, debounce: Duration, strategy: Strategy) -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            runner: Arc::new(runner),
            strategy,
            debounce,
            collection: Arc::new(Mutex::new(DiagnosticCollection::new())),
            pending: None,
            updates,
        }
    }

    /// Completed checks as they land.
    pub fn subscribe(&self) -> watch::Receiver<Option<CheckResult>> {
        self.updates.subscribe()
    }

    pub fn diagnostics(&self) -> DiagnosticCollection {
        lock(&self.collection).clone()
    }

    pub fn diagnostics_for(&self, file: &Path) -> Vec<Diagnostic> {
        lock(&self.collection).get(file).to_vec()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|(_, task)| !task.is_finished())
    }

    fn cancel_pending(&mut self) {
        if let Some((document, task)) = self.pending.take() {
            if !task.is_finished() {
                debug!(document = %document.display(), "superseding pending check");
            }
            task.abort();
        }
    }

    /// Schedule a check of `doc` after the debounce period.
    pub fn trigger(&mut self, doc: DocumentContext) {
        self.cancel_pending();

        let runner = Arc::clone(&self.runner);
        let collection = Arc::clone(&self.collection);
        let updates = self.updates.clone();
        let strategy = self.strategy;
        let debounce = self.debounce;
        let document = doc.path.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(result) = run_check(runner.as_ref(), &doc, strategy, &collection).await {
                updates.send_replace(Some(result));
            }
        });
        self.pending = Some((document, task));
    }

    /// Check right away, skipping the debounce.
    pub async fn check_now(&mut self, doc: &DocumentContext) -> Option<CheckResult> {
        self.cancel_pending();
        let result = run_check(self.runner.as_ref(), doc, self.strategy, &self.collection).await;
        if let Some(result) = &result {
            self.updates.send_replace(Some(result.clone()));
        }
        result
    }

    /// The document was closed: forget its diagnostics.
    pub fn close(&mut self, file: &Path) {
        if self.pending.as_ref().is_some_and(|(doc, _)| doc == file) {
            self.cancel_pending();
        }
        lock(&self.collection).delete(file);
    }
}

impl<R: CheckRunner> Drop for IntellisenseSession<R> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

async fn run_check<R: CheckRunner + ?Sized>(
    runner: &R,
    doc: &DocumentContext,
    strategy: Strategy,
    collection: &SharedCollection,
) -> Option<CheckResult> {
    let result = runner.check(doc).await;

    if let Err(e) = remove_tmp_midi(doc.dir()) {
        warn!(error = %e, "failed to remove temporary MIDI output");
    }

    match result {
        Ok(stderr) => {
            let analysis = analyze(&stderr, doc, strategy);
            for dropped in &analysis.dropped {
                warn!("Intellisense error: {dropped}");
            }
            lock(collection).replace_with(&analysis);
            Some(CheckResult {
                document: doc.path.clone(),
                analysis,
            })
        }
        Err(e) => {
            error!("Intellisense error: {e}");
            lock(collection).clear();
            None
        }
    }
}
