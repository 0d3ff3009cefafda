// File watcher for incremental re-indexing

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::index::FileKey;
use crate::indexer::{IndexOutcome, Indexer};

/// Watches a repository and keeps the tree store current: changed files are
/// re-parsed and their artifacts overwritten, removed files lose theirs.
pub struct FileWatcher {
    indexer: Arc<Indexer>,
    repo_root: PathBuf,
}

impl FileWatcher {
    pub fn new(indexer: Arc<Indexer>, repo_root: PathBuf) -> Self {
        Self { indexer, repo_root }
    }

    /// Start watching for file changes. Blocks until the event stream closes.
    pub async fn watch(&self) -> Result<()> {
        info!("Starting file watcher for: {}", self.repo_root.display());

        let (tx, mut rx) = mpsc::channel(100);

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                let tx = tx.clone();
                match res {
                    Ok(event) => {
                        if let Err(e) = tx.blocking_send(event) {
                            error!("Failed to send file event: {}", e);
                        }
                    }
                    Err(e) => error!("File watch error: {}", e),
                }
            },
            Config::default(),
        )?;

        watcher.watch(&self.repo_root, RecursiveMode::Recursive)?;

        info!("File watcher started. Monitoring for changes...");

        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }

        Ok(())
    }

    fn handle_event(&self, event: Event) {
        debug!("File event: {:?}", event);

        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => {
                for path in &event.paths {
                    if self.passes_filter(path) {
                        self.reindex_file(path);
                    }
                }
            }
            EventKind::Remove(_) => {
                for path in &event.paths {
                    self.remove_file(path);
                }
            }
            _ => {}
        }
    }

    fn passes_filter(&self, path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        let rel = match path.strip_prefix(&self.repo_root) {
            Ok(rel) => rel,
            Err(_) => return false,
        };
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        self.indexer.filter().should_index(rel, size)
    }

    fn reindex_file(&self, path: &Path) {
        match self.indexer.index_file(&self.repo_root, path) {
            Ok(IndexOutcome::Indexed { key, functions }) => {
                info!("Re-indexed {}: {} functions", key, functions);
            }
            Ok(IndexOutcome::Skipped) => {
                debug!("Skipped {}", path.display());
            }
            Err(e) => {
                // Never fail the watcher for one file.
                error!("Failed to index {}: {}", path.display(), e);
            }
        }
    }

    fn remove_file(&self, path: &Path) {
        let rel = match path.strip_prefix(&self.repo_root) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => return,
        };
        if !rel.ends_with(".py") {
            return;
        }
        let key = FileKey::from_relative_path(&rel);
        warn!("Source file removed, dropping artifact: {}", key);
        self.indexer.store().remove(&key);
    }
}
