//! Agent profiles and the store that serves them.

use serde::{Deserialize, Serialize};

/// Everything the engine needs to know about one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Stable identifier (file stem of the agent definition)
    pub slug: String,

    /// Display name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Base persona text, used verbatim as the start of the system message
    #[serde(default)]
    pub persona: String,

    /// Declared tool names, in the order they are presented to the model
    #[serde(default)]
    pub tools: Vec<String>,

    /// Generation settings
    #[serde(default)]
    pub settings: AgentSettings,
}

/// Generation settings applied to every model call of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_temp")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temp() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            temperature: default_temp(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Read-only source of agent profiles.
///
/// Implementations are expected to cache; `load` is called once per
/// engine construction.
pub trait AgentStore: Send + Sync {
    /// Look up an agent by slug.
    fn load(&self, slug: &str) -> Option<AgentProfile>;

    /// All known agents, sorted by slug.
    fn list(&self) -> Vec<AgentProfile>;
}
