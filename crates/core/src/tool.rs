//! Tool trait: the abstraction over agent capabilities.
//!
//! Every tool returns the same [`ToolOutcome`] envelope regardless of its
//! internal logic, so the engine can treat retrieval, summarization and
//! arithmetic uniformly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;
use crate::error::ToolError;
use crate::retrieval::ChunkIndex;

/// Tool parameters after context merging.
pub type ToolParams = serde_json::Map<String, serde_json::Value>;

/// The uniform result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Whether the tool executed successfully
    pub success: bool,

    /// Structured payload (tool-specific)
    #[serde(default)]
    pub data: Option<serde_json::Value>,

    /// Human-readable failure reason
    #[serde(default)]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Request-scoped handles threaded through every tool call.
///
/// Built by the caller once per invocation and passed by reference; there
/// is no ambient or global context.
#[derive(Clone, Default)]
pub struct ToolContext {
    /// Chunk index for retrieval tools (the per-request database handle)
    pub chunk_index: Option<Arc<dyn ChunkIndex>>,

    /// The acting user
    pub user_id: Option<Uuid>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_index(mut self, index: Arc<dyn ChunkIndex>) -> Self {
        self.chunk_index = Some(index);
        self
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("chunk_index", &self.chunk_index.as_ref().map(|i| i.name().to_string()))
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// The core Tool trait.
///
/// Each tool (calculator, rag_search, summarize, ...) implements this
/// trait and is registered into a [`ToolRegistry`] at startup.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (shown to the model).
    fn description(&self) -> &str;

    /// Whether successful results of this tool are citation sources.
    ///
    /// When true, `data` must be an array of records carrying a
    /// `document_id`.
    fn contributes_sources(&self) -> bool {
        false
    }

    /// Execute the tool with merged parameters.
    async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolOutcome, ToolError>;
}

/// The catalog of installed tools, keyed by name.
///
/// Engines resolve the subset an agent declares from this catalog once,
/// at construction.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        async fn execute(&self, params: ToolParams, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
            let text = params
                .get("text")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))?;
            Ok(ToolOutcome::ok(serde_json::json!(text)))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[tokio::test]
    async fn registry_tool_executes() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let mut params = ToolParams::new();
        params.insert("text".into(), serde_json::json!("hello world"));
        let tool = registry.get("echo").unwrap();
        let outcome = tool.execute(params, &ToolContext::new()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.data, Some(serde_json::json!("hello world")));
    }

    #[test]
    fn outcome_serializes_all_fields() {
        let json = serde_json::to_value(ToolOutcome::failure("Unknown tool: nope")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "data": null, "error": "Unknown tool: nope"})
        );
    }

    #[test]
    fn default_tool_is_not_a_source() {
        assert!(!EchoTool.contributes_sources());
    }
}
