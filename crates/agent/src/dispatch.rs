//! Tool resolution, dispatch and citation-source accumulation.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use toolwright_core::tool::{Tool, ToolOutcome, ToolRegistry};
use tracing::{debug, warn};

use crate::directive::ToolDirective;
use crate::invocation::Invocation;

/// The tools one agent may use, in declaration order.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    /// Resolve an agent's declared tool names against the installed catalog.
    ///
    /// Unknown names are logged and left out; repeated names keep their
    /// first position.
    pub fn resolve(agent: &str, declared: &[String], catalog: &ToolRegistry) -> Self {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::with_capacity(declared.len());
        for name in declared {
            if tools.iter().any(|t| t.name() == name) {
                continue;
            }
            match catalog.get(name) {
                Some(tool) => tools.push(tool),
                None => warn!(agent, tool = %name, "Unknown tool declared by agent"),
            }
        }
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run one directive. Never fails: an unknown tool, a tool error or a
    /// tool panic all come back as a failure outcome.
    pub async fn dispatch(&self, directive: &ToolDirective, invocation: &Invocation) -> Dispatched {
        let Some(tool) = self.get(&directive.name) else {
            warn!(tool = %directive.name, "Model requested a tool this agent does not have");
            return Dispatched {
                outcome: ToolOutcome::failure(format!("Unknown tool: {}", directive.name)),
                contributes_sources: false,
            };
        };

        let params = invocation.merge_params(&directive.params);
        let ctx = invocation.tool_context();

        let outcome = match AssertUnwindSafe(tool.execute(params, &ctx)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(tool = %directive.name, error = %e, "Tool execution failed");
                ToolOutcome::failure(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(tool = %directive.name, panic = %message, "Tool panicked");
                ToolOutcome::failure(format!("Tool '{}' panicked: {message}", directive.name))
            }
        };

        debug!(tool = %directive.name, success = outcome.success, "Tool dispatched");
        Dispatched {
            outcome,
            contributes_sources: tool.contributes_sources(),
        }
    }
}

/// What one dispatch produced.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub outcome: ToolOutcome,
    /// The tool's successful `data` items are citation sources
    pub contributes_sources: bool,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

/// Citation sources for one invocation, deduplicated by `document_id`.
///
/// The first record seen for a document is kept; later records for the
/// same document are ignored even when they score better. Records without
/// a `document_id` are keyed by their JSON text.
#[derive(Debug, Default)]
pub struct SourceSet {
    seen: HashSet<String>,
    items: Vec<Value>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record unless its document is already present. Returns whether
    /// it was added.
    pub fn offer(&mut self, item: Value) -> bool {
        let key = match item.get("document_id") {
            Some(Value::String(id)) => id.clone(),
            Some(other) if !other.is_null() => other.to_string(),
            _ => item.to_string(),
        };
        if !self.seen.insert(key) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Offer every item of a successful source-contributing outcome.
    pub fn absorb(&mut self, dispatched: &Dispatched) {
        if !dispatched.contributes_sources || !dispatched.outcome.success {
            return;
        }
        match &dispatched.outcome.data {
            Some(Value::Array(items)) => {
                for item in items {
                    self.offer(item.clone());
                }
            }
            Some(other) if !other.is_null() => {
                self.offer(other.clone());
            }
            _ => {}
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use toolwright_core::error::ToolError;
    use toolwright_core::tool::{ToolContext, ToolParams};
    use uuid::Uuid;

    /// Returns its merged params as data.
    struct Reflect;

    #[async_trait]
    impl Tool for Reflect {
        fn name(&self) -> &str {
            "reflect"
        }
        fn description(&self) -> &str {
            "Echo params"
        }
        async fn execute(&self, params: ToolParams, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
            Ok(ToolOutcome::ok(Value::Object(params)))
        }
    }

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "Always errors"
        }
        async fn execute(&self, _params: ToolParams, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
            Err(ToolError::InvalidArguments("bad input".into()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Tool for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }
        fn description(&self) -> &str {
            "Always panics"
        }
        async fn execute(&self, _params: ToolParams, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
            panic!("index out of range")
        }
    }

    fn catalog() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Reflect));
        registry.register(Arc::new(Failing));
        registry.register(Arc::new(Panicking));
        registry
    }

    fn directive(name: &str, params: Value) -> ToolDirective {
        ToolDirective::new(name, params.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn resolve_keeps_order_and_drops_unknown_and_duplicates() {
        let declared: Vec<String> = ["failing", "ghost", "reflect", "failing"]
            .into_iter()
            .map(String::from)
            .collect();
        let set = ToolSet::resolve("tester", &declared, &catalog());
        assert_eq!(set.names(), vec!["failing", "reflect"]);
    }

    #[tokio::test]
    async fn unknown_tool_is_failure_outcome() {
        let set = ToolSet::resolve("tester", &["reflect".into()], &catalog());
        let dispatched = set
            .dispatch(&directive("panicking", json!({})), &Invocation::new())
            .await;
        assert!(!dispatched.outcome.success);
        assert_eq!(dispatched.outcome.error.as_deref(), Some("Unknown tool: panicking"));
    }

    #[tokio::test]
    async fn params_are_merged_with_context() {
        let set = ToolSet::resolve("tester", &["reflect".into()], &catalog());
        let user = Uuid::new_v4();
        let invocation = Invocation::new().with_user(user).with_param("mode", json!("strict"));
        let dispatched = set
            .dispatch(&directive("reflect", json!({"q": "x", "mode": "loose"})), &invocation)
            .await;
        let data = dispatched.outcome.data.unwrap();
        assert_eq!(data["q"], "x");
        assert_eq!(data["mode"], "strict");
        assert_eq!(data["user_id"], user.to_string());
    }

    #[tokio::test]
    async fn tool_error_and_panic_become_failures() {
        let set = ToolSet::resolve("tester", &["failing".into(), "panicking".into()], &catalog());

        let failed = set.dispatch(&directive("failing", json!({})), &Invocation::new()).await;
        assert!(!failed.outcome.success);
        assert!(failed.outcome.error.unwrap().contains("bad input"));

        let panicked = set.dispatch(&directive("panicking", json!({})), &Invocation::new()).await;
        assert!(!panicked.outcome.success);
        assert!(panicked.outcome.error.unwrap().contains("index out of range"));
    }

    #[test]
    fn sources_first_seen_wins() {
        let mut sources = SourceSet::new();
        assert!(sources.offer(json!({"document_id": "d1", "score": 0.4})));
        assert!(sources.offer(json!({"document_id": "d2", "score": 0.2})));
        assert!(!sources.offer(json!({"document_id": "d1", "score": 0.1})));
        assert_eq!(sources.len(), 2);
        assert_eq!(sources.as_slice()[0]["score"], 0.4);
    }

    #[test]
    fn sources_without_document_id_use_json_text() {
        let mut sources = SourceSet::new();
        assert!(sources.offer(json!({"content": "a"})));
        assert!(!sources.offer(json!({"content": "a"})));
        assert!(sources.offer(json!({"content": "b"})));
        assert_eq!(sources.into_vec().len(), 2);
    }

    #[test]
    fn absorb_ignores_failures_and_non_contributors() {
        let mut sources = SourceSet::new();
        let hits = json!([{"document_id": "d1"}, {"document_id": "d2"}]);

        sources.absorb(&Dispatched {
            outcome: ToolOutcome::ok(hits.clone()),
            contributes_sources: false,
        });
        sources.absorb(&Dispatched {
            outcome: ToolOutcome::failure("boom"),
            contributes_sources: true,
        });
        assert!(sources.is_empty());

        sources.absorb(&Dispatched {
            outcome: ToolOutcome::ok(hits),
            contributes_sources: true,
        });
        assert_eq!(sources.len(), 2);
    }
}
