use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::parse::{parse, Strategy};
use crate::resolve::{resolve, DocumentContext};
use crate::{Diagnostic, DiagnosticError, DiagnosticRecord};

/// Outcome of checking one compiler run against a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    pub records: Vec<DiagnosticRecord>,
    pub diagnostics: Vec<Diagnostic>,
    /// Groups that failed to parse and records that could not be placed.
    pub dropped: Vec<DiagnosticError>,
}

impl Analysis {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == crate::Severity::Error)
    }
}

/// Parse compiler output and resolve every record. A record that fails is
/// logged and skipped; the rest are still returned.
pub fn analyze(output: &str, ctx: &DocumentContext, strategy: Strategy) -> Analysis {
    let report = parse(output, strategy);
    let mut analysis = Analysis {
        dropped: report.errors,
        ..Analysis::default()
    };

    for record in report.records {
        match resolve(&record, ctx) {
            Ok(diag) => analysis.diagnostics.push(diag),
            Err(err) => {
                warn!(error = %err, message = %record.message, "dropping diagnostic");
                analysis.dropped.push(err);
            }
        }
        analysis.records.push(record);
    }

    debug!(
        document = %ctx.path.display(),
        diagnostics = analysis.diagnostics.len(),
        dropped = analysis.dropped.len(),
        "analysis complete"
    );
    analysis
}

/// Diagnostics currently shown, keyed by file.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCollection {
    entries: BTreeMap<PathBuf, Vec<Diagnostic>>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, file: impl Into<PathBuf>, diagnostics: Vec<Diagnostic>) {
        self.entries.insert(file.into(), diagnostics);
    }

    /// Add one diagnostic to its file's list.
    pub fn append(&mut self, diagnostic: Diagnostic) {
        self.entries
            .entry(diagnostic.file.clone())
            .or_default()
            .push(diagnostic);
    }

    pub fn get(&self, file: &Path) -> &[Diagnostic] {
        self.entries.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Forget a file, e.g. when its document is closed.
    pub fn delete(&mut self, file: &Path) -> Option<Vec<Diagnostic>> {
        self.entries.remove(file)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of files with diagnostics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Replace everything with the result of a new check.
    pub fn replace_with(&mut self, analysis: &Analysis) {
        self.clear();
        for diag in &analysis.diagnostics {
            self.append(diag.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &[Diagnostic])> {
        self.entries
            .iter()
            .map(|(path, diags)| (path.as_path(), diags.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Position, Range, Severity};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn diag(file: &str, line: u32) -> Diagnostic {
        Diagnostic {
            file: PathBuf::from(file),
            range: Range::new(Position::new(line, 0), Position::new(line, 1)),
            severity: Severity::Warning,
            message: format!("line {}", line),
        }
    }

    #[test]
    fn test_collection_append_and_get() {
        let mut collection = DiagnosticCollection::new();
        collection.append(diag("a.ly", 1));
        collection.append(diag("a.ly", 2));
        collection.append(diag("b.ly", 3));

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.total(), 3);
        assert_eq!(collection.get(Path::new("a.ly")).len(), 2);
        assert!(collection.get(Path::new("c.ly")).is_empty());
    }

    #[test]
    fn test_collection_delete_and_clear() {
        let mut collection = DiagnosticCollection::new();
        collection.set("a.ly", vec![diag("a.ly", 0)]);
        collection.set("b.ly", vec![diag("b.ly", 0)]);

        assert_eq!(collection.delete(Path::new("a.ly")).map(|d| d.len()), Some(1));
        assert_eq!(collection.len(), 1);

        collection.clear();
        assert!(collection.is_empty());
    }

    #[test]
    fn test_replace_with_drops_stale_entries() {
        let mut collection = DiagnosticCollection::new();
        collection.append(diag("old.ly", 9));

        let analysis = Analysis {
            diagnostics: vec![diag("new.ly", 1)],
            ..Analysis::default()
        };
        collection.replace_with(&analysis);

        let files: Vec<_> = collection.iter().map(|(p, _)| p.to_path_buf()).collect();
        assert_eq!(files, vec![PathBuf::from("new.ly")]);
    }

    #[test]
    fn test_analyze_keeps_going_after_unresolvable() {
        let dir = TempDir::new().unwrap();
        let score = dir.path().join("score.ly");
        fs::write(&score, "{ c }\n").unwrap();
        let ctx = DocumentContext::load(&score).unwrap();

        let output = "\
missing.ily:1:1: error: cannot find file
-:1:3: warning: no \\version statement found
";
        let analysis = analyze(output, &ctx, Strategy::Structured);

        assert_eq!(analysis.records.len(), 2);
        assert_eq!(analysis.diagnostics.len(), 1);
        assert_eq!(analysis.diagnostics[0].file, score);
        assert_eq!(
            analysis.dropped,
            vec![DiagnosticError::UnresolvablePath("missing.ily".to_string())]
        );
        assert!(!analysis.has_errors());
    }
}
