//! Built-in tool implementations for Toolwright.
//!
//! - `rag_search`: semantic search over the user's documents
//! - `summarize`: condense text with the language model
//! - `calculator`: arithmetic

pub mod calculator;
pub mod rag_search;
pub mod summarize;

use std::sync::Arc;

use toolwright_core::retrieval::Embedder;
use toolwright_core::tool::ToolRegistry;
use toolwright_core::Provider;

pub use calculator::CalculatorTool;
pub use rag_search::RagSearchTool;
pub use summarize::SummarizeTool;

/// Create a registry with all built-in tools.
///
/// `provider` and `model` back the summarize tool; `embedder` backs
/// retrieval.
pub fn default_registry(
    embedder: Arc<dyn Embedder>,
    provider: Arc<dyn Provider>,
    model: impl Into<String>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(RagSearchTool::new(embedder)));
    registry.register(Arc::new(SummarizeTool::new(provider, model)));
    registry.register(Arc::new(CalculatorTool));
    registry
}
