use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{FileKey, SyntaxTree, TREE_FORMAT_VERSION};

/// Errors raised by the tree store. Per-artifact problems during a scan are
/// handled inside the store (logged and skipped); these surface only for
/// operations on a single named artifact or the store directory itself.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access tree directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write artifact {key}: {source}")]
    Write {
        key: String,
        source: std::io::Error,
    },

    #[error("failed to serialize artifact {key}: {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },
}

/// Aggregate counts over the persisted index.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IndexStats {
    pub total_files: usize,
    pub total_functions: usize,
    pub last_indexed: Option<i64>,
}

/// On-disk store holding one serialized syntax tree per indexed source file,
/// named by FileKey. Write-once-per-file during indexing, read-only during
/// queries.
#[derive(Debug, Clone)]
pub struct TreeStore {
    dir: PathBuf,
}

impl TreeStore {
    /// Open the store rooted at `dir`, creating the directory if absent.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Directory {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one tree, overwriting any previous artifact for the same key.
    pub fn save(&self, tree: &SyntaxTree) -> Result<FileKey, StoreError> {
        let key = FileKey::from_relative_path(&tree.file);
        let json =
            serde_json::to_string_pretty(tree).map_err(|source| StoreError::Serialize {
                key: key.as_str().to_string(),
                source,
            })?;
        let path = self.dir.join(key.artifact_name());
        fs::write(&path, json).map_err(|source| StoreError::Write {
            key: key.as_str().to_string(),
            source,
        })?;
        debug!("Saved tree artifact: {}", key);
        Ok(key)
    }

    /// Load one artifact by key. A missing, unreadable, or corrupt artifact is
    /// logged and reported as `None`.
    pub fn load(&self, key: &FileKey) -> Option<SyntaxTree> {
        let path = self.dir.join(key.artifact_name());
        Self::read_artifact(&path)
    }

    /// Load every artifact, ordered by sorted file name. The ordering makes
    /// duplicate-definition tie-breaks reproducible across runs.
    pub fn load_all(&self) -> Vec<SyntaxTree> {
        let mut trees = Vec::new();
        for path in self.artifact_paths() {
            if let Some(tree) = Self::read_artifact(&path) {
                trees.push(tree);
            }
        }
        trees
    }

    /// Delete the artifact for one source file, if present.
    pub fn remove(&self, key: &FileKey) {
        let path = self.dir.join(key.artifact_name());
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed tree artifact: {}", key),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove artifact {}: {}", key, e),
        }
    }

    pub fn stats(&self) -> IndexStats {
        let trees = self.load_all();
        IndexStats {
            total_files: trees.len(),
            total_functions: trees.iter().map(|t| t.functions.len()).sum(),
            last_indexed: trees.iter().map(|t| t.indexed_at).max(),
        }
    }

    /// Walk the live repository tree under `root` and return the first file
    /// whose root-relative path ends with `relative` (separator-normalized).
    /// The index stores logical identifiers rather than absolute paths, so the
    /// same index keeps working when the repository is re-cloned elsewhere.
    pub fn resolve_path(root: impl AsRef<Path>, relative: &str) -> Option<PathBuf> {
        let needle = relative.replace('\\', "/");
        let root = root.as_ref();

        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if rel.ends_with(&needle) {
                return Some(entry.path().to_path_buf());
            }
        }
        None
    }

    fn artifact_paths(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read tree directory {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(FileKey::from_artifact_name)
                    .is_some()
            })
            .collect();
        paths.sort();
        paths
    }

    fn read_artifact(path: &Path) -> Option<SyntaxTree> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read artifact {}: {}", path.display(), e);
                return None;
            }
        };
        let tree: SyntaxTree = match serde_json::from_str(&content) {
            Ok(tree) => tree,
            Err(e) => {
                warn!("Corrupt artifact {}: {}", path.display(), e);
                return None;
            }
        };
        if tree.format_version != TREE_FORMAT_VERSION {
            warn!(
                "Artifact {} has format version {}, expected {}; skipping",
                path.display(),
                tree.format_version,
                TREE_FORMAT_VERSION
            );
            return None;
        }
        Some(tree)
    }
}
