// Query execution over persisted syntax trees

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::index::store::TreeStore;
use crate::indexer::parser::PythonParser;
use crate::query::{CallerScanPolicy, CodeBlock, DefinitionLocation, CALLER_SCAN};

/// Read-only query engine over a populated tree store and the live repository
/// tree it was built from. All lookups are name-based and exact; duplicate
/// definitions are returned in full, ordered by sorted artifact key.
pub struct QueryEngine {
    store: TreeStore,
    repo_root: PathBuf,
    parser: PythonParser,
}

impl QueryEngine {
    pub fn new(store: TreeStore, repo_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            repo_root: repo_root.into(),
            parser: PythonParser::new(),
        }
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Every definition named exactly `name`, across all indexed files.
    /// Artifacts are scanned in sorted-key order and definitions within one
    /// file in document order, so the first result is the deterministic
    /// "first by path" tie-break for duplicate names.
    pub fn find_definitions(&self, name: &str) -> Vec<DefinitionLocation> {
        let mut locations = Vec::new();
        for tree in self.store.load_all() {
            for func in &tree.functions {
                if func.name == name {
                    locations.push(DefinitionLocation {
                        file: tree.file.clone(),
                        start_line: func.start_line,
                        end_line: func.end_line,
                    });
                }
            }
        }
        locations
    }

    /// Resolve each definition of `name` against the live repository tree and
    /// slice its source. Locations whose file cannot be resolved are dropped
    /// with a warning, never an error.
    pub fn extract_code(&self, name: &str) -> Vec<CodeBlock> {
        let mut blocks = Vec::new();
        for loc in self.find_definitions(name) {
            match self.slice_span(&loc) {
                Some(code) => blocks.push(CodeBlock {
                    function: name.to_string(),
                    file: loc.file,
                    code,
                }),
                None => {
                    warn!("Could not extract {} from {}", name, loc.file);
                }
            }
        }
        blocks
    }

    /// Distinct callee names in a source fragment; order not significant.
    pub fn extract_called_names(&self, source: &str) -> HashSet<String> {
        self.parser.extract_called_names(source)
    }

    /// Callee names in first-seen document order, for callers that need a
    /// stable iteration order.
    pub fn called_names_in_order(&self, source: &str) -> Vec<String> {
        self.parser.called_names_in_order(source)
    }

    /// Every definition containing at least one call to `name`. Under the
    /// default scan policy each enclosing definition contributes exactly one
    /// location, even when it calls `name` several times.
    pub fn find_callers(&self, name: &str) -> Vec<DefinitionLocation> {
        let mut locations = Vec::new();
        for tree in self.store.load_all() {
            for func in &tree.functions {
                let hits = match CALLER_SCAN {
                    CallerScanPolicy::FirstMatchPerDefinition => {
                        usize::from(func.calls_name(name))
                    }
                    CallerScanPolicy::EveryCallSite => {
                        func.calls.iter().filter(|c| c.as_str() == name).count()
                    }
                };
                for _ in 0..hits {
                    locations.push(DefinitionLocation {
                        file: tree.file.clone(),
                        start_line: func.start_line,
                        end_line: func.end_line,
                    });
                }
            }
        }
        locations
    }

    /// Read the span's lines from the current file content. The slice can go
    /// stale if the file changed since indexing; that is not detected here.
    pub(crate) fn slice_span(&self, loc: &DefinitionLocation) -> Option<String> {
        let path = TreeStore::resolve_path(&self.repo_root, &loc.file)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };

        let lines: Vec<&str> = content.lines().collect();
        let start = loc.start_line.saturating_sub(1) as usize;
        let end = loc.end_line.unwrap_or(loc.start_line) as usize;
        let end = end.min(lines.len());
        if start >= end {
            return None;
        }
        Some(lines[start..end].join("\n").trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexingConfig;
    use crate::indexer::Indexer;
    use std::fs;
    use std::path::Path;

    const PAD: &str = "# ------------------------------\n";

    fn write_file(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn indexed_engine(repo: &Path, store_dir: &Path) -> QueryEngine {
        let store = TreeStore::open(store_dir).unwrap();
        let indexer = Indexer::new(store.clone(), IndexingConfig::default());
        indexer.index_repository(repo).unwrap();
        QueryEngine::new(store, repo)
    }

    #[test]
    fn test_find_definitions_across_files() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        write_file(
            repo.path(),
            "b.py",
            &format!("{PAD}def shared():\n    pass\n"),
        );
        write_file(
            repo.path(),
            "a.py",
            &format!("{PAD}def shared():\n    pass\n\n\ndef other():\n    pass\n"),
        );

        let engine = indexed_engine(repo.path(), store_dir.path());
        let defs = engine.find_definitions("shared");

        assert_eq!(defs.len(), 2);
        // Sorted-key order: a.py before b.py.
        assert_eq!(defs[0].file, "a.py");
        assert_eq!(defs[1].file, "b.py");

        assert!(engine.find_definitions("missing").is_empty());
        assert_eq!(engine.find_definitions("other").len(), 1);
    }

    #[test]
    fn test_extract_code_slices_live_file() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        write_file(
            repo.path(),
            "pkg/a.py",
            &format!("{PAD}def foo():\n    return 1\n"),
        );

        let engine = indexed_engine(repo.path(), store_dir.path());
        let blocks = engine.extract_code("foo");

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].file, "pkg/a.py");
        assert_eq!(blocks[0].code, "def foo():\n    return 1");
    }

    #[test]
    fn test_extract_code_drops_unresolvable_file() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        write_file(
            repo.path(),
            "gone.py",
            &format!("{PAD}def foo():\n    pass\n"),
        );

        let engine = indexed_engine(repo.path(), store_dir.path());
        fs::remove_file(repo.path().join("gone.py")).unwrap();

        // The definition is still recorded, but its source is gone.
        assert_eq!(engine.find_definitions("foo").len(), 1);
        assert!(engine.extract_code("foo").is_empty());
    }

    #[test]
    fn test_find_callers_one_entry_per_definition() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        write_file(
            repo.path(),
            "callers.py",
            &format!(
                "{PAD}def h1():\n    f()\n    f()\n\n\ndef h2():\n    f()\n\n\ndef unrelated():\n    pass\n"
            ),
        );

        let engine = indexed_engine(repo.path(), store_dir.path());
        let callers = engine.find_callers("f");

        // h1 calls f twice but contributes one location.
        assert_eq!(callers.len(), 2);
        assert_eq!(callers[0].start_line, 2);
        assert_eq!(callers[1].start_line, 7);
    }

    #[test]
    fn test_find_callers_attribute_call() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        write_file(
            repo.path(),
            "m.py",
            &format!("{PAD}def go():\n    client.send()\n"),
        );

        let engine = indexed_engine(repo.path(), store_dir.path());
        assert_eq!(engine.find_callers("send").len(), 1);
        assert!(engine.find_callers("client").is_empty());
    }

    #[test]
    fn test_reindex_is_deterministic() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        write_file(repo.path(), "x.py", &format!("{PAD}def f():\n    g()\n"));
        write_file(repo.path(), "y.py", &format!("{PAD}def g():\n    pass\n"));

        let engine = indexed_engine(repo.path(), store_dir.path());
        let first = engine.find_definitions("g");

        // Re-index without content changes; results must be identical.
        let store = TreeStore::open(store_dir.path()).unwrap();
        let indexer = Indexer::new(store, IndexingConfig::default());
        indexer.index_repository(repo.path()).unwrap();
        let second = engine.find_definitions("g");

        assert_eq!(first, second);
    }
}
