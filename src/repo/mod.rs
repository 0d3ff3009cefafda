// Repository provider: cloning and directory-tree listing

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::info;

/// Derive the checkout directory name from a clone URL.
pub fn repo_name_from_url(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .trim_end_matches(".git")
        .to_string()
}

/// Clone `url` into `dest_dir/<repo-name>` via the git CLI. An existing
/// checkout is reused, not re-cloned.
pub fn clone_repo(url: &str, dest_dir: &Path, branch: Option<&str>) -> Result<PathBuf> {
    let repo_path = dest_dir.join(repo_name_from_url(url));

    if repo_path.exists() {
        info!("Repository already exists at {}", repo_path.display());
        return Ok(repo_path);
    }

    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("failed to create {}", dest_dir.display()))?;

    info!("Cloning {} into {} ...", url, repo_path.display());
    let mut cmd = Command::new("git");
    cmd.arg("clone");
    if let Some(branch) = branch {
        cmd.args(["--branch", branch]);
    }
    cmd.arg(url).arg(&repo_path);

    let output = cmd.output().context("failed to run git clone")?;
    if !output.status.success() {
        bail!(
            "git clone failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    info!("Clone complete.");
    Ok(repo_path)
}

/// Nested listing of a repository's Python files, for display and prompting.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Directory {
        name: String,
        children: Vec<TreeNode>,
    },
    File {
        name: String,
        /// Path relative to the repository root.
        path: String,
    },
}

/// Build the directory tree rooted at `root`. Dot-directories and
/// `__pycache__` are skipped; entries are sorted by name.
pub fn build_file_tree(root: &Path) -> Result<TreeNode> {
    build_tree_node(root, root)
}

fn build_tree_node(dir: &Path, root: &Path) -> Result<TreeNode> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| dir.to_string_lossy().to_string());

    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();

    let mut children = Vec::new();
    for entry in entries {
        let entry_name = match entry.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        if entry_name.starts_with('.') || entry_name == "__pycache__" {
            continue;
        }

        if entry.is_dir() {
            children.push(build_tree_node(&entry, root)?);
        } else if entry.extension().and_then(|e| e.to_str()) == Some("py") {
            let path = entry
                .strip_prefix(root)
                .unwrap_or(&entry)
                .to_string_lossy()
                .replace('\\', "/");
            children.push(TreeNode::File {
                name: entry_name,
                path,
            });
        }
    }

    Ok(TreeNode::Directory { name, children })
}
