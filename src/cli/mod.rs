// CLI command handlers

pub mod clone;
pub mod context;
pub mod explain;
pub mod index;
pub mod risk;
pub mod serve;
pub mod stats;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::commit::CommitAnalyzer;
use crate::config::Config;
use crate::index::store::TreeStore;
use crate::query::engine::QueryEngine;

/// Everything a command needs: the loaded config plus the storage paths
/// resolved against the repository root.
pub(crate) struct Workspace {
    pub config: Config,
    pub repo_root: PathBuf,
    pub trees_dir: PathBuf,
    pub commits_dir: PathBuf,
}

impl Workspace {
    pub fn open(repo: &str) -> Self {
        let config = Config::from_project_dir(repo);
        let repo_root = PathBuf::from(repo);

        let data_dir = Path::new(&config.storage.data_dir);
        let data_root = if data_dir.is_absolute() {
            data_dir.to_path_buf()
        } else {
            repo_root.join(data_dir)
        };

        Self {
            trees_dir: data_root.join("trees"),
            commits_dir: data_root.join("commits"),
            config,
            repo_root,
        }
    }

    pub fn store(&self) -> Result<TreeStore> {
        Ok(TreeStore::open(&self.trees_dir)?)
    }

    pub fn engine(&self) -> Result<QueryEngine> {
        Ok(QueryEngine::new(self.store()?, self.repo_root.clone()))
    }

    pub fn analyzer(&self) -> CommitAnalyzer {
        CommitAnalyzer::new(&self.commits_dir, self.config.commits.recent_limit)
    }
}
