//! Compiler and checker against a shell script that talks like LilyPond.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use diagnostics::{DocumentContext, Severity, Strategy};
use lilyctl::intellisense::TMP_MIDI_FILE;
use lilyctl::{
    CapturedOutput, CompileError, CompileOutcome, IntellisenseSession, LilypondChecker,
    LilypondCompiler,
};
use tempfile::TempDir;

const SCRIPT: &str = r#"#!/bin/sh
for last; do :; done
if [ "$1" = "-v" ]; then
  echo "GNU LilyPond 2.24.3 (running Guile 2.2)"
  exit 0
fi
if [ "$last" = "-" ]; then
  text=$(cat)
  : > ./-.tmp
  case "$text" in
    *oops*) echo "-:2:5: error: syntax error, unexpected oops" >&2; exit 1 ;;
  esac
  exit 0
fi
if grep -q slow "$last"; then
  exec sleep 30
fi
if grep -q oops "$last"; then
  echo "$last:2:5: error: syntax error, unexpected oops" >&2
  echo "  c d oops" >&2
  exit 1
fi
echo "Success: compilation successfully completed" >&2
exit 0
"#;

/// Written once so no test forks while another still has it open.
fn lilypond() -> &'static Path {
    static BIN: OnceLock<(TempDir, PathBuf)> = OnceLock::new();
    let (_dir, path) = BIN.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lilypond");
        fs::write(&path, SCRIPT).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        (dir, path)
    });
    path
}

fn score(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("score.ly");
    fs::write(&path, body).unwrap();
    path
}

#[tokio::test]
async fn compile_success() {
    let dir = TempDir::new().unwrap();
    let target = score(&dir, "\\version \"2.24.0\"\n{ c d e }\n");
    let output = CapturedOutput::new();
    let compiler = LilypondCompiler::new(lilypond(), vec![], Arc::new(output.clone()));

    let report = compiler.compile(&target, None).await.unwrap();

    assert_eq!(report.outcome, CompileOutcome::Succeeded);
    assert_eq!(output.lines()[0], format!("Compiling: {}", target.display()));
    assert!(output.contains("Compilation successful"));
    assert!(!compiler.is_running());
}

#[tokio::test]
async fn compile_failure_echoes_errors() {
    let dir = TempDir::new().unwrap();
    let target = score(&dir, "{\n  c d oops\n}\n");
    let output = CapturedOutput::new();
    let compiler = LilypondCompiler::new(lilypond(), vec![], Arc::new(output.clone()));

    let report = compiler.compile(&target, Some(target.as_path())).await.unwrap();

    assert_eq!(report.outcome, CompileOutcome::Failed(Some(1)));
    assert_eq!(output.lines()[0], format!("[SAVED]: {}", target.display()));
    assert!(output.contains(&format!(
        "ERROR: {}:2:5: error: syntax error, unexpected oops",
        target.display()
    )));
    assert!(output.contains("Compilation failed"));
}

#[tokio::test]
async fn kill_stops_a_running_compile() {
    let dir = TempDir::new().unwrap();
    let target = score(&dir, "% slow\n{ c }\n");
    let output = CapturedOutput::new();
    let compiler = Arc::new(LilypondCompiler::new(lilypond(), vec![], Arc::new(output.clone())));

    assert!(!compiler.kill());

    let task = {
        let compiler = Arc::clone(&compiler);
        let target = target.clone();
        tokio::spawn(async move { compiler.compile(&target, None).await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(compiler.is_running());
    assert!(compiler.kill());

    let report = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(report.outcome, CompileOutcome::Killed);
    assert!(output.contains("Compilation process killed"));
}

#[tokio::test]
async fn missing_binary() {
    let dir = TempDir::new().unwrap();
    let target = score(&dir, "{ c }");
    let compiler = LilypondCompiler::new(
        dir.path().join("no-such-lilypond"),
        vec![],
        Arc::new(CapturedOutput::new()),
    );

    let err = compiler.compile(&target, None).await.unwrap_err();
    assert!(matches!(err, CompileError::LilypondNotFound(_)));
}

#[tokio::test]
async fn version_line() {
    let compiler = LilypondCompiler::new(lilypond(), vec![], Arc::new(CapturedOutput::new()));
    assert_eq!(
        compiler.version().await.unwrap(),
        "GNU LilyPond 2.24.3 (running Guile 2.2)"
    );
}

#[tokio::test]
async fn stdin_check_maps_onto_document() {
    let dir = TempDir::new().unwrap();
    let path = score(&dir, "{\n  c d oops\n}\n");
    let doc = DocumentContext::load(&path).unwrap();

    let checker = LilypondChecker::new(lilypond(), vec!["-dno-point-and-click".to_string()]);
    let mut session = IntellisenseSession::new(checker, Duration::from_millis(500), Strategy::Structured);
    let result = session.check_now(&doc).await.unwrap();

    let diag = &result.analysis.diagnostics[0];
    assert_eq!(diag.file, path);
    assert_eq!(diag.severity, Severity::Error);
    assert_eq!(diag.range.start.line, 1);
    assert_eq!(diag.range.end.character, 4);
    assert!(!dir.path().join(TMP_MIDI_FILE).exists());
    assert_eq!(session.diagnostics_for(&path).len(), 1);
}
