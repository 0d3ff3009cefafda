// Portable syntax-tree index: data model and on-disk store

pub mod store;

use serde::{Deserialize, Serialize};

/// Version stamp written into every persisted tree artifact. Artifacts with a
/// different version are treated as corrupt and skipped on load.
pub const TREE_FORMAT_VERSION: u32 = 1;

/// Separator substituted for `/` when a relative path becomes an artifact file
/// name. Three at-signs cannot occur in a real path segment.
pub const FILE_KEY_DELIMITER: &str = "@@@";

/// Extension of persisted tree artifacts.
pub const TREE_FILE_SUFFIX: &str = ".tree.json";

/// Parsed representation of one source file, reduced to the fields the query
/// layer needs: definition names, spans, and callee names. Rebuilt (overwritten)
/// whenever the repository is re-indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntaxTree {
    pub format_version: u32,
    /// Path relative to the repository root, `/`-separated.
    pub file: String,
    /// blake3 hash of the source content at index time.
    pub content_hash: String,
    /// When this artifact was written (unix seconds).
    pub indexed_at: i64,
    /// Every function definition in the file, at any nesting depth, in
    /// document order.
    pub functions: Vec<FunctionNode>,
}

/// One function definition: its span and the callee names referenced anywhere
/// inside it (including inside nested definitions), in document order with
/// duplicates preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionNode {
    pub name: String,
    /// 1-based line of the `def` keyword.
    pub start_line: u32,
    /// 1-based inclusive last line of the definition.
    pub end_line: Option<u32>,
    pub calls: Vec<String>,
}

impl FunctionNode {
    /// Whether this definition contains at least one call to `name`, by the
    /// direct-name-or-trailing-attribute rule used at parse time.
    pub fn calls_name(&self, name: &str) -> bool {
        self.calls.iter().any(|c| c == name)
    }
}

/// Filesystem-safe encoding of a repository-relative path, used as the artifact
/// file name. `src/utils/helpers.py` <-> `src@@@utils@@@helpers.py`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileKey(String);

impl FileKey {
    pub fn from_relative_path(rel_path: &str) -> Self {
        let normalized = rel_path.replace('\\', "/");
        Self(normalized.replace('/', FILE_KEY_DELIMITER))
    }

    /// Recover the original relative path. Display-only: files are re-resolved
    /// against the live repository tree by suffix match, never opened through
    /// this mapping.
    pub fn to_relative_path(&self) -> String {
        self.0.replace(FILE_KEY_DELIMITER, "/")
    }

    /// Parse a key back out of an artifact file name, rejecting files that do
    /// not carry the tree suffix.
    pub fn from_artifact_name(file_name: &str) -> Option<Self> {
        file_name
            .strip_suffix(TREE_FILE_SUFFIX)
            .map(|stem| Self(stem.to_string()))
    }

    pub fn artifact_name(&self) -> String {
        format!("{}{}", self.0, TREE_FILE_SUFFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_key_round_trip() {
        let key = FileKey::from_relative_path("src/utils/helpers.py");
        assert_eq!(key.as_str(), "src@@@utils@@@helpers.py");
        assert_eq!(key.to_relative_path(), "src/utils/helpers.py");
    }

    #[test]
    fn test_file_key_normalizes_backslashes() {
        let key = FileKey::from_relative_path("src\\utils\\helpers.py");
        assert_eq!(key.to_relative_path(), "src/utils/helpers.py");
    }

    #[test]
    fn test_file_key_artifact_name() {
        let key = FileKey::from_relative_path("pkg/a.py");
        assert_eq!(key.artifact_name(), "pkg@@@a.py.tree.json");

        let parsed = FileKey::from_artifact_name("pkg@@@a.py.tree.json").unwrap();
        assert_eq!(parsed, key);
        assert!(FileKey::from_artifact_name("notes.txt").is_none());
    }

    #[test]
    fn test_calls_name() {
        let node = FunctionNode {
            name: "f".to_string(),
            start_line: 1,
            end_line: Some(3),
            calls: vec!["g".to_string(), "h".to_string(), "g".to_string()],
        };
        assert!(node.calls_name("g"));
        assert!(node.calls_name("h"));
        assert!(!node.calls_name("f"));
    }
}
