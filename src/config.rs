// Configuration for repolens. Loaded once at startup and passed explicitly
// into every collaborator; nothing reads process-wide state lazily.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub storage: StorageConfig,
    pub indexing: IndexingConfig,
    pub commits: CommitsConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the tree index, cached commit analyses, and cloned
    /// repositories.
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Directory names excluded from the indexing walk.
    pub exclude_dirs: HashSet<String>,
    /// File names excluded from the indexing walk.
    pub exclude_files: HashSet<String>,
    /// Files smaller than this many bytes are always skipped, regardless of
    /// the filter sets.
    pub min_file_size: u64,
    pub watch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitsConfig {
    /// How many of the most recent commits to keep per function.
    pub recent_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "openai", "compatible" (any OpenAI-compatible endpoint), or "disabled".
    pub provider: String,
    pub api_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key. The key itself
    /// never lives in the config file.
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            storage: StorageConfig::default(),
            indexing: IndexingConfig::default(),
            commits: CommitsConfig::default(),
            llm: LlmConfig::default(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "unnamed-project".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: ".repolens".to_string(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        let exclude_dirs = [
            ".git",
            "__pycache__",
            ".venv",
            "venv",
            "node_modules",
            ".mypy_cache",
            ".pytest_cache",
            ".tox",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            exclude_dirs,
            exclude_files: HashSet::new(),
            min_file_size: 30,
            watch: false,
        }
    }
}

impl Default for CommitsConfig {
    fn default() -> Self {
        Self { recent_limit: 3 }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "REPOLENS_API_KEY".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory. Looks for `.repolens.toml`
    /// and falls back to defaults when it is absent or unreadable.
    pub fn from_project_dir<P: AsRef<Path>>(project_dir: P) -> Self {
        let config_path = project_dir.as_ref().join(".repolens.toml");

        match Self::from_file(&config_path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::debug!("Could not load config from {}: {}", config_path.display(), e);
                tracing::info!("Using default configuration");
                Self::default()
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.project.name.is_empty() {
            return Err(anyhow::anyhow!("Project name cannot be empty"));
        }

        if self.storage.data_dir.is_empty() {
            return Err(anyhow::anyhow!("Data directory cannot be empty"));
        }

        if self.commits.recent_limit == 0 {
            return Err(anyhow::anyhow!("Commit limit must be greater than 0"));
        }

        let valid_providers = ["openai", "compatible", "disabled"];
        if !valid_providers.contains(&self.llm.provider.as_str()) {
            return Err(anyhow::anyhow!("Invalid LLM provider: {}", self.llm.provider));
        }
        if self.llm.provider != "disabled" {
            if self.llm.api_url.is_empty() {
                return Err(anyhow::anyhow!("LLM API URL cannot be empty"));
            }
            if self.llm.api_key_env.is_empty() {
                return Err(anyhow::anyhow!("LLM API key variable cannot be empty"));
            }
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!("Invalid log level: {}", self.logging.level));
        }
        let valid_formats = ["compact", "pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!("Invalid log format: {}", self.logging.format));
        }

        let valid_transports = ["stdio"];
        if !valid_transports.contains(&self.server.transport.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid server transport: {}",
                self.server.transport
            ));
        }

        Ok(())
    }
}

impl IndexingConfig {
    /// Whether a source file passes the indexing filter: `.py` extension, no
    /// excluded path component, file name not excluded, and at least
    /// `min_file_size` bytes.
    pub fn should_index(&self, path: &Path, size: u64) -> bool {
        if path.extension().and_then(|e| e.to_str()) != Some("py") {
            return false;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if self.exclude_files.contains(name) {
                return false;
            }
        }
        let excluded_component = path.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|s| self.exclude_dirs.contains(s))
                .unwrap_or(false)
        });
        if excluded_component {
            return false;
        }
        size >= self.min_file_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.project.name, "unnamed-project");
        assert!(config.indexing.exclude_dirs.contains(".git"));
        assert_eq!(config.indexing.min_file_size, 30);
        assert_eq!(config.commits.recent_limit, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_should_index() {
        let indexing = IndexingConfig::default();

        assert!(indexing.should_index(Path::new("src/utils/helpers.py"), 100));
        assert!(!indexing.should_index(Path::new("src/utils/helpers.rs"), 100));
        assert!(!indexing.should_index(Path::new("__pycache__/helpers.py"), 100));
        assert!(!indexing.should_index(Path::new("a/.git/hook.py"), 100));

        // The size floor applies regardless of the filter sets.
        assert!(!indexing.should_index(Path::new("src/tiny.py"), 29));
        assert!(indexing.should_index(Path::new("src/ok.py"), 30));
    }

    #[test]
    fn test_excluded_file_names() {
        let mut indexing = IndexingConfig::default();
        indexing.exclude_files.insert("conftest.py".to_string());
        assert!(!indexing.should_index(Path::new("tests/conftest.py"), 100));
        assert!(indexing.should_index(Path::new("tests/test_app.py"), 100));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.project.name = "".to_string();
        assert!(config.validate().is_err());
        config.project.name = "test".to_string();

        config.commits.recent_limit = 0;
        assert!(config.validate().is_err());
        config.commits.recent_limit = 3;

        config.llm.provider = "invalid".to_string();
        assert!(config.validate().is_err());
        config.llm.provider = "disabled".to_string();

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
        config.logging.level = "info".to_string();

        config.server.transport = "http".to_string();
        assert!(config.validate().is_err());
        config.server.transport = "stdio".to_string();
    }

    #[test]
    fn test_from_toml() {
        let toml_src = r#"
            [project]
            name = "demo"

            [indexing]
            min_file_size = 10
            exclude_dirs = ["build"]
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.project.name, "demo");
        assert_eq!(config.indexing.min_file_size, 10);
        assert!(config.indexing.exclude_dirs.contains("build"));
        // Unspecified sections fall back to defaults.
        assert_eq!(config.commits.recent_limit, 3);
    }
}
