//! Per-request inputs to the engine.

use std::sync::Arc;

use serde_json::Value;
use toolwright_core::retrieval::ChunkIndex;
use toolwright_core::tool::{ToolContext, ToolParams};
use uuid::Uuid;

/// Everything one `process` / `process_stream` call needs besides the
/// transcript. Built by the caller and passed explicitly; the engine keeps
/// no request state of its own.
#[derive(Clone, Default)]
pub struct Invocation {
    /// The acting user, injected into every tool call as `user_id`
    pub user_id: Option<Uuid>,

    /// Chunk index handle for retrieval tools
    pub chunk_index: Option<Arc<dyn ChunkIndex>>,

    /// Extra parameters merged into every tool call, overriding the
    /// model's own values
    pub extra_params: ToolParams,

    /// Round budget for this call; the engine default applies when unset
    pub max_iterations: Option<u32>,
}

impl Invocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_chunk_index(mut self, index: Arc<dyn ChunkIndex>) -> Self {
        self.chunk_index = Some(index);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra_params.insert(key.into(), value);
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// The handles tools receive alongside their parameters.
    pub fn tool_context(&self) -> ToolContext {
        ToolContext {
            chunk_index: self.chunk_index.clone(),
            user_id: self.user_id,
        }
    }

    /// Merge directive parameters with ambient context; later wins:
    /// directive params, then `user_id`, then extra params.
    pub fn merge_params(&self, directive_params: &ToolParams) -> ToolParams {
        let mut params = directive_params.clone();
        if let Some(user_id) = self.user_id {
            params.insert("user_id".into(), Value::String(user_id.to_string()));
        }
        params.extend(self.extra_params.iter().map(|(k, v)| (k.clone(), v.clone())));
        params
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("user_id", &self.user_id)
            .field("chunk_index", &self.chunk_index.as_ref().map(|i| i.name().to_string()))
            .field("extra_params", &self.extra_params)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_order_directive_then_user_then_extra() {
        let user = Uuid::new_v4();
        let invocation = Invocation::new()
            .with_user(user)
            .with_param("top_k", json!(3));

        let directive = json!({"query": "q", "top_k": 10, "user_id": "spoofed"})
            .as_object()
            .cloned()
            .unwrap();
        let merged = invocation.merge_params(&directive);

        assert_eq!(merged["query"], "q");
        assert_eq!(merged["top_k"], 3);
        assert_eq!(merged["user_id"], user.to_string());
    }

    #[test]
    fn merge_without_context_is_identity() {
        let directive = json!({"expr": "1+1"}).as_object().cloned().unwrap();
        assert_eq!(Invocation::new().merge_params(&directive), directive);
    }

    #[test]
    fn tool_context_carries_user() {
        let user = Uuid::new_v4();
        let ctx = Invocation::new().with_user(user).tool_context();
        assert_eq!(ctx.user_id, Some(user));
        assert!(ctx.chunk_index.is_none());
    }
}
