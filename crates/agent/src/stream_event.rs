//! Agent-level streaming events.
//!
//! `AgentEvent` is the wire shape of `process_stream`: a tagged JSON object
//! per event, ready to be forwarded over SSE or WebSocket.

use serde::{Deserialize, Serialize};
use toolwright_core::tool::{ToolOutcome, ToolParams};

/// Events emitted by the engine during streaming execution.
///
/// Per round with directives: `thinking`, then `tool_call` / `tool_result`
/// for each directive. Final round: `content` fragments, then `done`.
/// A model failure ends the stream with `error` instead of `done`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Progress note, e.g. "Processing with 2 tool(s)...".
    Thinking { content: String },

    /// The engine is about to run a tool.
    ToolCall { name: String, params: ToolParams },

    /// Tool execution completed.
    ToolResult { name: String, result: ToolOutcome },

    /// Answer text. `done` is true only for the processing-limit message.
    Content { content: String, done: bool },

    /// The stream is complete.
    Done {
        tools_used: Vec<String>,
        sources: Vec<serde_json::Value>,
    },

    /// The model call failed; no further events follow.
    Error { message: String },
}

impl AgentEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Content { .. } => "content",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}
