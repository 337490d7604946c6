//! File-backed agent catalog.
//!
//! Each agent is one TOML file in the agents directory; the file stem is the
//! slug. Definitions are parsed once and cached until [`AgentCatalog::reload`].
//!
//! ```toml
//! name = "Research Assistant"
//! description = "Answers questions from your documents"
//! persona = "You are a careful research assistant."
//! tools = ["rag_search", "summarize"]
//!
//! [settings]
//! temperature = 0.3
//! ```
//!
//! A long persona can live next to the definition via `persona_file`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Deserialize;
use toolwright_core::{AgentProfile, AgentSettings, AgentStore};

use crate::ConfigError;

/// On-disk shape of an agent definition.
#[derive(Debug, Deserialize)]
struct AgentFile {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    persona: Option<String>,
    /// Path to a text file holding the persona, relative to the agents dir
    #[serde(default)]
    persona_file: Option<PathBuf>,
    #[serde(default)]
    tools: Vec<String>,
    #[serde(default)]
    settings: AgentSettings,
}

/// Cached agent store backed by a directory of `<slug>.toml` files.
pub struct AgentCatalog {
    dir: Option<PathBuf>,
    agents: RwLock<HashMap<String, AgentProfile>>,
}

impl AgentCatalog {
    /// Read every `*.toml` file in `dir`.
    ///
    /// A missing directory yields an empty catalog. Files that fail to parse
    /// are logged and skipped so one bad definition does not hide the rest.
    pub fn load_dir(dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let dir = dir.into();
        let agents = read_dir(&dir)?;
        tracing::info!(dir = %dir.display(), count = agents.len(), "Agent catalog loaded");
        Ok(Self {
            dir: Some(dir),
            agents: RwLock::new(agents),
        })
    }

    /// Build a catalog from profiles already in memory.
    pub fn from_profiles(profiles: impl IntoIterator<Item = AgentProfile>) -> Self {
        let agents = profiles
            .into_iter()
            .map(|p| (p.slug.clone(), p))
            .collect();
        Self {
            dir: None,
            agents: RwLock::new(agents),
        }
    }

    /// Re-read the directory, replacing the cache. No-op for in-memory catalogs.
    pub fn reload(&self) -> Result<usize, ConfigError> {
        let Some(dir) = &self.dir else {
            return Ok(self.len());
        };
        let fresh = read_dir(dir)?;
        let count = fresh.len();
        *self.agents.write().unwrap_or_else(|e| e.into_inner()) = fresh;
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.agents.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample definition written by `toolwright init`.
    pub fn default_agent_toml() -> &'static str {
        DEFAULT_AGENT
    }
}

impl AgentStore for AgentCatalog {
    fn load(&self, slug: &str) -> Option<AgentProfile> {
        self.agents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(slug)
            .cloned()
    }

    fn list(&self) -> Vec<AgentProfile> {
        let mut all: Vec<_> = self
            .agents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.slug.cmp(&b.slug));
        all
    }
}

fn read_dir(dir: &Path) -> Result<HashMap<String, AgentProfile>, ConfigError> {
    let mut agents = HashMap::new();
    if !dir.exists() {
        tracing::info!("No agents directory at {}, catalog is empty", dir.display());
        return Ok(agents);
    }

    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::ReadError {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let Some(slug) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        match read_agent(dir, &path, &slug) {
            Ok(profile) => {
                agents.insert(slug, profile);
            }
            Err(e) => tracing::warn!(agent = %slug, error = %e, "Skipping agent definition"),
        }
    }
    Ok(agents)
}

fn read_agent(dir: &Path, path: &Path, slug: &str) -> Result<AgentProfile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let file: AgentFile = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let persona = match (file.persona, file.persona_file) {
        (Some(inline), _) => inline,
        (None, Some(rel)) => {
            let persona_path = dir.join(rel);
            std::fs::read_to_string(&persona_path).map_err(|e| ConfigError::ReadError {
                path: persona_path,
                reason: e.to_string(),
            })?
        }
        (None, None) => String::new(),
    };

    if file.settings.max_tokens == 0 {
        return Err(ConfigError::ValidationError(format!(
            "agent '{slug}': settings.max_tokens must be > 0"
        )));
    }

    Ok(AgentProfile {
        slug: slug.to_string(),
        name: file.name,
        description: file.description,
        icon: file.icon,
        persona,
        tools: file.tools,
        settings: file.settings,
    })
}

const DEFAULT_AGENT: &str = r#"name = "Assistant"
description = "General helper with document search, summaries and arithmetic"
persona = """
You are a helpful assistant. Answer concisely and cite the documents you used."""
tools = ["rag_search", "summarize", "calculator"]

[settings]
temperature = 0.7
max_tokens = 4096
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn loads_agents_keyed_by_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "researcher.toml",
            r#"
            name = "Researcher"
            persona = "You research."
            tools = ["rag_search", "summarize"]
            [settings]
            temperature = 0.2
            "#,
        );
        write(dir.path(), "notes.md", "ignored");

        let catalog = AgentCatalog::load_dir(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);

        let agent = catalog.load("researcher").unwrap();
        assert_eq!(agent.slug, "researcher");
        assert_eq!(agent.tools, vec!["rag_search", "summarize"]);
        assert!((agent.settings.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(agent.settings.max_tokens, 4096);
        assert!(catalog.load("missing").is_none());
    }

    #[test]
    fn persona_file_is_resolved_relative_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "writer.md", "You write crisp prose.");
        write(
            dir.path(),
            "writer.toml",
            "name = \"Writer\"\npersona_file = \"writer.md\"\n",
        );
        let catalog = AgentCatalog::load_dir(dir.path()).unwrap();
        assert_eq!(catalog.load("writer").unwrap().persona, "You write crisp prose.");
    }

    #[test]
    fn bad_definition_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.toml", "name = \"Good\"\n");
        write(dir.path(), "broken.toml", "name = [unclosed\n");
        let catalog = AgentCatalog::load_dir(dir.path()).unwrap();
        assert!(catalog.load("good").is_some());
        assert!(catalog.load("broken").is_none());
    }

    #[test]
    fn missing_dir_is_empty() {
        let catalog = AgentCatalog::load_dir("/nonexistent/toolwright/agents").unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.list().is_empty());
    }

    #[test]
    fn reload_picks_up_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = AgentCatalog::load_dir(dir.path()).unwrap();
        assert!(catalog.is_empty());
        write(dir.path(), "late.toml", "name = \"Late\"\n");
        assert_eq!(catalog.reload().unwrap(), 1);
        assert!(catalog.load("late").is_some());
    }

    #[test]
    fn list_is_sorted_by_slug() {
        let profile = |slug: &str| AgentProfile {
            slug: slug.into(),
            name: slug.to_uppercase(),
            description: None,
            icon: None,
            persona: String::new(),
            tools: vec![],
            settings: AgentSettings::default(),
        };
        let catalog = AgentCatalog::from_profiles([profile("zeta"), profile("alpha")]);
        let slugs: Vec<_> = catalog.list().into_iter().map(|a| a.slug).collect();
        assert_eq!(slugs, vec!["alpha", "zeta"]);
    }

    #[test]
    fn default_agent_parses() {
        let file: AgentFile = toml::from_str(AgentCatalog::default_agent_toml()).unwrap();
        assert_eq!(file.tools.len(), 3);
    }
}
