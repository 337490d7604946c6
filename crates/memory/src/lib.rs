//! Chunk-index implementations for Toolwright retrieval.
//!
//! Both backends implement `toolwright_core::ChunkIndex` and score hits by
//! cosine distance (lower is more relevant).

pub mod in_memory;
pub mod vector;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::{InMemoryChunkIndex, NewChunk};
pub use vector::{cosine_distance, cosine_similarity};

#[cfg(feature = "postgres")]
pub use postgres::PostgresChunkIndex;
