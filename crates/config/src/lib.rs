//! Configuration loading, validation, and management for Toolwright.
//!
//! Loads configuration from `~/.toolwright/config.toml` with environment
//! variable overrides. Validates all settings at startup. Agent
//! definitions live in a separate directory, see [`agents`].

pub mod agents;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use agents::AgentCatalog;

/// The root configuration structure.
///
/// Maps directly to `~/.toolwright/config.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language-model endpoint
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Query embedding settings for retrieval
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Reasoning loop settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Directory holding `<slug>.toml` agent definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents_dir: Option<PathBuf>,

    /// PostgreSQL connection string for the chunk index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("embedding", &self.embedding)
            .field("engine", &self.engine)
            .field("agents_dir", &self.agents_dir)
            .field("database_url", &redact(&self.database_url))
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider label used in logs
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// OpenAI-compatible base URL (OpenAI, LiteLLM proxy, Ollama, ...)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Chat model
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Expected vector length; responses of another length are rejected
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_embedding_dimension() -> usize {
    1536
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Round budget per invocation
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default)]
    pub stream_strategy: StreamStrategy,
}

fn default_max_iterations() -> u32 {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            stream_strategy: StreamStrategy::default(),
        }
    }
}

/// How the streaming loop decides whether a round carries directives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStrategy {
    /// One non-streaming probe call per round; when it has no directives a
    /// second, streaming call produces the visible answer.
    #[default]
    Probe,
    /// One streaming call per round. Text is forwarded as it arrives until
    /// a directive opening marker shows up; the rest of that round is
    /// buffered and handled as a tool round.
    LookAhead,
}

impl AppConfig {
    /// Load configuration from the default path (~/.toolwright/config.toml).
    ///
    /// Environment overrides:
    /// - `TOOLWRIGHT_API_KEY`, then `OPENAI_API_KEY` (only if no key in file)
    /// - `TOOLWRIGHT_API_URL`
    /// - `TOOLWRIGHT_MODEL`
    /// - `TOOLWRIGHT_AGENTS_DIR`
    /// - `DATABASE_URL` (only if none in file)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.provider.api_key.is_none() {
            self.provider.api_key = lookup("TOOLWRIGHT_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(url) = lookup("TOOLWRIGHT_API_URL") {
            self.provider.api_url = url;
        }
        if let Some(model) = lookup("TOOLWRIGHT_MODEL") {
            self.provider.model = model;
        }
        if let Some(dir) = lookup("TOOLWRIGHT_AGENTS_DIR") {
            self.agents_dir = Some(PathBuf::from(dir));
        }
        if self.database_url.is_none() {
            self.database_url = lookup("DATABASE_URL");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolwright")
    }

    /// The agent definitions directory (configured or `<config_dir>/agents`).
    pub fn resolved_agents_dir(&self) -> PathBuf {
        self.agents_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("agents"))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.model must not be empty".into(),
            ));
        }

        if self.engine.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_iterations must be at least 1".into(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.engine.max_iterations, 3);
        assert_eq!(config.engine.stream_strategy, StreamStrategy::Probe);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.api_url, config.provider.api_url);
        assert_eq!(parsed.embedding.dimension, 1536);
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.engine.max_iterations = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/toolwright/config.toml")).unwrap();
        assert_eq!(config.provider.name, "openai");
    }

    #[test]
    fn parses_look_ahead_strategy() {
        let config: AppConfig = toml::from_str(
            r#"
            [engine]
            max_iterations = 5
            stream_strategy = "look_ahead"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.max_iterations, 5);
        assert_eq!(config.engine.stream_strategy, StreamStrategy::LookAhead);
    }

    #[test]
    fn load_from_file_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[provider]\nmodel = \"  \"\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-test"),
            ("TOOLWRIGHT_MODEL", "gpt-4o"),
            ("TOOLWRIGHT_AGENTS_DIR", "/srv/agents"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.resolved_agents_dir(), PathBuf::from("/srv/agents"));
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("from-file".into());
        config.apply_env(|k| (k == "TOOLWRIGHT_API_KEY").then(|| "from-env".to_string()));
        assert_eq!(config.provider.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-very-secret".into());
        config.database_url = Some("postgres://u:p@db/app".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(!rendered.contains("u:p@db"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
