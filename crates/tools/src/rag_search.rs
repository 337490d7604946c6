//! Retrieval tool: semantic search over the user's document chunks.
//!
//! Embeds the query, then asks the request's [`ChunkIndex`] for the
//! nearest chunks. Hits are returned as `data` (an array of chunk records)
//! and become citation sources for the invocation.
//!
//! Scores are cosine distances: lower is more relevant.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use toolwright_core::error::ToolError;
use toolwright_core::retrieval::{ChunkQuery, Embedder};
use toolwright_core::tool::{Tool, ToolContext, ToolOutcome, ToolParams};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_TOP_K: usize = 50;

pub struct RagSearchTool {
    embedder: Arc<dyn Embedder>,
}

impl RagSearchTool {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl Tool for RagSearchTool {
    fn name(&self) -> &str {
        "rag_search"
    }

    fn description(&self) -> &str {
        "Search the user's documents for passages relevant to a query. \
         Params: {\"query\": \"...\", \"top_k\": 5, \"document_ids\": [...], \"project_id\": \"...\"}. \
         Returns chunks ordered by relevance."
    }

    fn contributes_sources(&self) -> bool {
        true
    }

    async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let query = params
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let top_k = match params.get("top_k") {
            None | Some(Value::Null) => DEFAULT_TOP_K,
            Some(v) => v
                .as_u64()
                .ok_or_else(|| ToolError::InvalidArguments("'top_k' must be a positive integer".into()))?
                .clamp(1, MAX_TOP_K as u64) as usize,
        };

        // Ownership scope comes from the caller only; a directive naming a
        // different user is refused.
        let user_id = ctx.user_id.ok_or_else(|| ToolError::MissingContext {
            tool_name: self.name().into(),
            what: "user_id".into(),
        })?;
        if let Some(v) = params.get("user_id") {
            if parse_uuid("user_id", v)? != user_id {
                return Err(ToolError::InvalidArguments(
                    "'user_id' does not match the acting user".into(),
                ));
            }
        }

        let document_ids = match params.get("document_ids") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|v| parse_uuid("document_ids", v))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(_) => {
                return Err(ToolError::InvalidArguments(
                    "'document_ids' must be an array of UUID strings".into(),
                ));
            }
        };

        let project_id = match params.get("project_id") {
            None | Some(Value::Null) => None,
            Some(v) => Some(parse_uuid("project_id", v)?),
        };

        let index = ctx.chunk_index.as_ref().ok_or_else(|| ToolError::MissingContext {
            tool_name: self.name().into(),
            what: "chunk index".into(),
        })?;

        let embedding = self.embedder.embed_query(query).await?;
        let hits = index
            .search(ChunkQuery {
                embedding,
                top_k,
                user_id,
                document_ids,
                project_id,
            })
            .await?;

        debug!(query, top_k, hits = hits.len(), index = index.name(), "rag_search complete");
        Ok(ToolOutcome::ok(serde_json::to_value(hits).map_err(|e| {
            ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            }
        })?))
    }
}

fn parse_uuid(field: &str, value: &Value) -> Result<Uuid, ToolError> {
    value
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| ToolError::InvalidArguments(format!("'{field}' must contain UUID strings")))
}
