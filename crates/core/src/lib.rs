//! # Toolwright Core
//!
//! Domain types, traits, and error definitions for the Toolwright agent
//! engine. This crate has **zero framework dependencies**. It defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the engine is defined as a trait here:
//! - [`Provider`]: the language-model client
//! - [`Tool`]: a pluggable side-effecting operation
//! - [`AgentStore`]: the agent configuration provider
//! - [`Embedder`] / [`ChunkIndex`]: what the retrieval tool consumes
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted stubs.

pub mod agent;
pub mod error;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentProfile, AgentSettings, AgentStore};
pub use error::{Error, Result};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
pub use retrieval::{ChunkHit, ChunkIndex, ChunkQuery, Embedder};
pub use tool::{Tool, ToolContext, ToolOutcome, ToolParams, ToolRegistry};
