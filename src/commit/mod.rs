// Commit history analysis for one function, via `git log -L`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::index::FileKey;
use crate::llm::{LlmClient, COMMIT_TYPE_LABELS};

/// One commit touching the function's line range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: String,
    pub author: String,
    pub email: String,
    /// RFC 3339 when the git date parses, the raw git date otherwise.
    pub date: String,
    pub message: String,
    pub diff: String,
    pub commit_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSummary {
    pub total_commits: usize,
    pub top_authors: HashMap<String, usize>,
    pub first_commit: String,
    pub last_commit: String,
    pub type_distribution: HashMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitAnalysis {
    pub function: String,
    pub file: String,
    pub commit_history: Vec<CommitRecord>,
    pub summary: CommitSummary,
}

/// Runs and caches per-function commit analyses. Results land as JSON under
/// the analysis directory, keyed by FileKey plus function name.
pub struct CommitAnalyzer {
    cache_dir: PathBuf,
    recent_limit: usize,
}

impl CommitAnalyzer {
    pub fn new(cache_dir: impl Into<PathBuf>, recent_limit: usize) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            recent_limit,
        }
    }

    /// Analyze the commits touching `function_name` in `rel_path`. Returns
    /// None when git has no line history for the function ("no data").
    /// Commits are classified by `classifier` when given, by a message
    /// heuristic otherwise.
    pub async fn analyze(
        &self,
        repo_root: &Path,
        rel_path: &str,
        function_name: &str,
        classifier: Option<&LlmClient>,
    ) -> Result<Option<CommitAnalysis>> {
        let log_output = run_function_log(repo_root, rel_path, function_name)?;
        if log_output.trim().is_empty() {
            debug!("No line history for {} in {}", function_name, rel_path);
            return Ok(None);
        }

        let mut commits = parse_git_log(&log_output);
        if commits.is_empty() {
            return Ok(None);
        }
        // Newest first in git output; keep only the most recent.
        commits.truncate(self.recent_limit);

        let mut type_distribution: HashMap<String, usize> = HashMap::new();
        let mut top_authors: HashMap<String, usize> = HashMap::new();
        for commit in &mut commits {
            commit.commit_type = match classifier {
                Some(llm) => llm.classify_commit(&commit.diff, &commit.message).await,
                None => classify_by_message(&commit.message).to_string(),
            };
            *type_distribution.entry(commit.commit_type.clone()).or_default() += 1;
            *top_authors.entry(commit.author.clone()).or_default() += 1;
        }

        let summary = CommitSummary {
            total_commits: commits.len(),
            top_authors,
            first_commit: commits.last().map(|c| c.date.clone()).unwrap_or_default(),
            last_commit: commits.first().map(|c| c.date.clone()).unwrap_or_default(),
            type_distribution,
        };

        Ok(Some(CommitAnalysis {
            function: function_name.to_string(),
            file: rel_path.to_string(),
            commit_history: commits,
            summary,
        }))
    }

    pub fn cache_path(&self, rel_path: &str, function_name: &str) -> PathBuf {
        let key = FileKey::from_relative_path(rel_path);
        self.cache_dir
            .join(format!("{}@@@{}.json", key.as_str(), function_name))
    }

    pub fn save(&self, analysis: &CommitAnalysis) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir)
            .with_context(|| format!("failed to create {}", self.cache_dir.display()))?;
        let path = self.cache_path(&analysis.file, &analysis.function);
        let json = serde_json::to_string_pretty(analysis)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Saved commit analysis: {}", path.display());
        Ok(())
    }

    /// Read a cached analysis, if one exists and still parses.
    pub fn load_cached(&self, rel_path: &str, function_name: &str) -> Option<CommitAnalysis> {
        let path = self.cache_path(rel_path, function_name);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                warn!("Corrupt commit analysis {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// `git log -L :<function>:<rel_path> --patch`, scoped to the function's
/// lines. Missing history is an empty string, not an error.
fn run_function_log(repo_root: &Path, rel_path: &str, function_name: &str) -> Result<String> {
    let output = Command::new("git")
        .args([
            "log",
            "-L",
            &format!(":{}:{}", function_name, rel_path),
            "--patch",
        ])
        .current_dir(repo_root)
        .output()
        .context("failed to run git log")?;

    if !output.status.success() {
        // git exits non-zero when the function or file has no history.
        debug!(
            "git log -L returned non-zero: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Ok(String::new());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse the default `git log --patch` format into commit records.
pub fn parse_git_log(output: &str) -> Vec<CommitRecord> {
    let mut commits = Vec::new();
    let mut current: Option<CommitRecord> = None;
    let mut in_diff = false;

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("commit ") {
            if let Some(commit) = current.take() {
                commits.push(commit);
            }
            current = Some(CommitRecord {
                hash: rest.split_whitespace().next().unwrap_or("").to_string(),
                author: String::new(),
                email: String::new(),
                date: String::new(),
                message: String::new(),
                diff: String::new(),
                commit_type: "Other".to_string(),
            });
            in_diff = false;
            continue;
        }

        let Some(commit) = current.as_mut() else {
            continue;
        };

        if in_diff {
            commit.diff.push_str(line);
            commit.diff.push('\n');
        } else if let Some(author) = line.strip_prefix("Author: ") {
            if let Some((name, email)) = author.split_once('<') {
                commit.author = name.trim().to_string();
                commit.email = email.trim_end_matches('>').trim().to_string();
            } else {
                commit.author = author.trim().to_string();
            }
        } else if let Some(date) = line.strip_prefix("Date:") {
            commit.date = normalize_git_date(date.trim());
        } else if line.starts_with("diff ") || line.starts_with("@@") {
            in_diff = true;
            commit.diff.push_str(line);
            commit.diff.push('\n');
        } else if let Some(message) = line.strip_prefix("    ") {
            // Indented header body; the first line is the subject.
            if commit.message.is_empty() {
                commit.message = message.trim().to_string();
            }
        }
    }

    if let Some(commit) = current {
        commits.push(commit);
    }
    commits.retain(|c| !c.hash.is_empty());
    commits
}

/// Convert git's default date format to RFC 3339; keep the raw string when it
/// does not parse.
fn normalize_git_date(raw: &str) -> String {
    match chrono::DateTime::parse_from_str(raw, "%a %b %e %H:%M:%S %Y %z") {
        Ok(dt) => dt.to_rfc3339(),
        Err(_) => raw.to_string(),
    }
}

/// Keyword fallback for commit classification when no LLM is available.
pub fn classify_by_message(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    let label = if matches(&["fix", "bug", "error", "crash", "regression"]) {
        "Bug&Error"
    } else if matches(&["refactor", "cleanup", "clean up", "rename", "simplify"]) {
        "Refactor"
    } else if matches(&["doc", "readme", "comment"]) {
        "Documentation"
    } else if matches(&["test", "coverage"]) {
        "Testing"
    } else if matches(&["style", "format", "fmt", "lint"]) {
        "Code Style"
    } else if matches(&["chore", "bump", "deps", "dependency", "ci"]) {
        "Chore"
    } else if matches(&["add", "feat", "implement", "support", "introduce"]) {
        "Feature"
    } else {
        "Other"
    };

    debug_assert!(COMMIT_TYPE_LABELS.contains(&label));
    label
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LOG: &str = "\
commit 1111111111111111111111111111111111111111
Author: Alice Example <alice@example.com>
Date:   Thu Mar 7 14:02:33 2024 +0900

    fix: handle empty input

diff --git a/pkg/a.py b/pkg/a.py
--- a/pkg/a.py
+++ b/pkg/a.py
@@ -1,3 +1,4 @@
 def foo():
+    if not data:
+        return None
     return data

commit 2222222222222222222222222222222222222222
Author: Bob <bob@example.com>
Date:   Mon Jan 1 09:00:00 2024 +0000

    add foo

diff --git a/pkg/a.py b/pkg/a.py
--- /dev/null
+++ b/pkg/a.py
@@ -0,0 +1,2 @@
+def foo():
+    return data
";

    #[test]
    fn test_parse_git_log() {
        let commits = parse_git_log(SAMPLE_LOG);
        assert_eq!(commits.len(), 2);

        let first = &commits[0];
        assert_eq!(first.hash, "1111111111111111111111111111111111111111");
        assert_eq!(first.author, "Alice Example");
        assert_eq!(first.email, "alice@example.com");
        assert_eq!(first.message, "fix: handle empty input");
        assert!(first.date.starts_with("2024-03-07T14:02:33"));
        assert!(first.diff.contains("+    if not data:"));

        let second = &commits[1];
        assert_eq!(second.author, "Bob");
        assert_eq!(second.message, "add foo");
    }

    #[test]
    fn test_parse_git_log_empty() {
        assert!(parse_git_log("").is_empty());
        assert!(parse_git_log("not a git log\n").is_empty());
    }

    #[test]
    fn test_normalize_git_date_fallback() {
        assert_eq!(normalize_git_date("not a date"), "not a date");
    }

    #[test]
    fn test_classify_by_message() {
        assert_eq!(classify_by_message("Fix crash on empty file"), "Bug&Error");
        assert_eq!(classify_by_message("Add retry support"), "Feature");
        assert_eq!(classify_by_message("Refactor parser internals"), "Refactor");
        assert_eq!(classify_by_message("Update README"), "Documentation");
        assert_eq!(classify_by_message("More tests for edge cases"), "Testing");
        assert_eq!(classify_by_message("cargo fmt"), "Code Style");
        assert_eq!(classify_by_message("chore: bump versions"), "Chore");
        assert_eq!(classify_by_message("misc"), "Other");
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = CommitAnalyzer::new(dir.path(), 3);

        let analysis = CommitAnalysis {
            function: "foo".to_string(),
            file: "pkg/a.py".to_string(),
            commit_history: parse_git_log(SAMPLE_LOG),
            summary: CommitSummary {
                total_commits: 2,
                top_authors: HashMap::new(),
                first_commit: "2024-01-01".to_string(),
                last_commit: "2024-03-07".to_string(),
                type_distribution: HashMap::new(),
            },
        };
        analyzer.save(&analysis).unwrap();

        let loaded = analyzer.load_cached("pkg/a.py", "foo").unwrap();
        assert_eq!(loaded.function, "foo");
        assert_eq!(loaded.commit_history.len(), 2);

        assert!(analyzer.load_cached("pkg/a.py", "bar").is_none());
    }

    #[tokio::test]
    async fn test_analyze_uses_heuristic_without_llm() {
        let repo = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();

        // Not a git repository: git log fails, which must read as "no data".
        let analyzer = CommitAnalyzer::new(cache.path(), 3);
        let result = analyzer
            .analyze(repo.path(), "pkg/a.py", "foo", None)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
