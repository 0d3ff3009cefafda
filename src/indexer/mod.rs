// Repository indexing: walk, filter, parse, persist

pub mod parser;
pub mod watcher;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::IndexingConfig;
use crate::index::store::TreeStore;
use crate::index::{FileKey, SyntaxTree, TREE_FORMAT_VERSION};
use parser::PythonParser;

/// Result of indexing one file.
#[derive(Debug)]
pub enum IndexOutcome {
    Indexed { key: FileKey, functions: usize },
    /// Unreadable or syntactically broken; logged and left out of the index.
    Skipped,
}

/// Aggregate result of an indexing run.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub files_indexed: usize,
    pub functions_indexed: usize,
    pub files_skipped: usize,
}

/// Walks a repository, parses each source file that passes the filter, and
/// persists one tree artifact per file. Re-indexing overwrites prior entries.
pub struct Indexer {
    parser: PythonParser,
    store: TreeStore,
    filter: IndexingConfig,
}

impl Indexer {
    pub fn new(store: TreeStore, filter: IndexingConfig) -> Self {
        Self {
            parser: PythonParser::new(),
            store,
            filter,
        }
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    pub fn filter(&self) -> &IndexingConfig {
        &self.filter
    }

    /// Every file under `repo_root` that passes the indexing filter, in
    /// sorted walk order so repeated runs see the same sequence.
    pub fn collect_source_files(&self, repo_root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in WalkDir::new(repo_root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(repo_root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if self.filter.should_index(rel, size) {
                files.push(entry.path().to_path_buf());
            }
        }
        files
    }

    /// Index the whole repository. One bad file never aborts the walk.
    pub fn index_repository(&self, repo_root: &Path) -> Result<IndexReport> {
        info!("Indexing repository: {}", repo_root.display());

        let mut report = IndexReport::default();
        for path in self.collect_source_files(repo_root) {
            match self.index_file(repo_root, &path)? {
                IndexOutcome::Indexed { functions, .. } => {
                    report.files_indexed += 1;
                    report.functions_indexed += functions;
                }
                IndexOutcome::Skipped => report.files_skipped += 1,
            }
        }

        info!(
            "Indexed {} files ({} functions), skipped {}",
            report.files_indexed, report.functions_indexed, report.files_skipped
        );
        Ok(report)
    }

    /// Parse and persist one file. Read and parse failures are logged and
    /// reported as `Skipped`; only a failure to write the artifact is an error.
    pub fn index_file(&self, repo_root: &Path, path: &Path) -> Result<IndexOutcome> {
        let rel = path
            .strip_prefix(repo_root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return Ok(IndexOutcome::Skipped);
            }
        };

        let functions = match self.parser.parse_functions(&content) {
            Ok(functions) => functions,
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                return Ok(IndexOutcome::Skipped);
            }
        };

        let tree = SyntaxTree {
            format_version: TREE_FORMAT_VERSION,
            file: rel.clone(),
            content_hash: blake3::hash(content.as_bytes()).to_string(),
            indexed_at: chrono::Utc::now().timestamp(),
            functions,
        };
        let count = tree.functions.len();
        let key = self
            .store
            .save(&tree)
            .with_context(|| format!("failed to persist tree for {}", rel))?;

        debug!("Indexed {}: {} functions", rel, count);
        Ok(IndexOutcome::Indexed {
            key,
            functions: count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn test_indexer(store_dir: &Path) -> Indexer {
        let store = TreeStore::open(store_dir).unwrap();
        Indexer::new(store, IndexingConfig::default())
    }

    // Padded so files clear the 30-byte floor.
    const PAD: &str = "# ------------------------------\n";

    #[test]
    fn test_index_repository() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        write_file(
            repo.path(),
            "pkg/a.py",
            &format!("{PAD}def foo():\n    bar()\n"),
        );
        write_file(
            repo.path(),
            "pkg/b.py",
            &format!("{PAD}def bar():\n    pass\n"),
        );

        let indexer = test_indexer(store_dir.path());
        let report = indexer.index_repository(repo.path()).unwrap();

        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.functions_indexed, 2);
        assert_eq!(report.files_skipped, 0);

        let trees = indexer.store().load_all();
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].file, "pkg/a.py");
        assert_eq!(trees[0].functions[0].calls, vec!["bar"]);
    }

    #[test]
    fn test_broken_file_skipped_valid_files_kept() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();

        for i in 0..9 {
            write_file(
                repo.path(),
                &format!("mod_{i}.py"),
                &format!("{PAD}def fn_{i}():\n    pass\n"),
            );
        }
        write_file(repo.path(), "broken.py", &format!("{PAD}def broken(:\n"));

        let indexer = test_indexer(store_dir.path());
        let report = indexer.index_repository(repo.path()).unwrap();

        assert_eq!(report.files_indexed, 9);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(indexer.store().load_all().len(), 9);
    }

    #[test]
    fn test_filter_applied() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();

        write_file(repo.path(), "small.py", "def f(): pass\n");
        write_file(
            repo.path(),
            "__pycache__/cached.py",
            &format!("{PAD}def g():\n    pass\n"),
        );
        write_file(repo.path(), "readme.md", &format!("{PAD}not python\n"));
        write_file(
            repo.path(),
            "kept.py",
            &format!("{PAD}def h():\n    pass\n"),
        );

        let indexer = test_indexer(store_dir.path());
        let files = indexer.collect_source_files(repo.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("kept.py"));
    }

    #[test]
    fn test_reindex_overwrites() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        write_file(
            repo.path(),
            "a.py",
            &format!("{PAD}def first():\n    pass\n"),
        );

        let indexer = test_indexer(store_dir.path());
        indexer.index_repository(repo.path()).unwrap();

        write_file(
            repo.path(),
            "a.py",
            &format!("{PAD}def second():\n    pass\n"),
        );
        indexer.index_repository(repo.path()).unwrap();

        let trees = indexer.store().load_all();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].functions[0].name, "second");
    }
}
