//! LLM Provider implementations for Toolwright.
//!
//! All providers implement the `toolwright_core::Provider` trait.
//! [`ProviderEmbedder`] turns a provider into the query embedder used by
//! retrieval.

pub mod embedder;
pub mod openai_compat;

pub use embedder::ProviderEmbedder;
pub use openai_compat::OpenAiCompatProvider;
