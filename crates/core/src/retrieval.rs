//! Retrieval interfaces: query embedding and nearest-neighbor chunk search.
//!
//! Scores are **cosine distances**: lower is more relevant. Consumers that
//! want a similarity must compute `1.0 - score` themselves.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::error::MemoryError;

/// A nearest-neighbor query over document chunks.
#[derive(Debug, Clone)]
pub struct ChunkQuery {
    /// Query embedding vector
    pub embedding: Vec<f32>,

    /// Maximum number of hits
    pub top_k: usize,

    /// Only chunks of documents owned by this user are considered
    pub user_id: Uuid,

    /// Optional restriction to an explicit set of documents
    pub document_ids: Option<Vec<Uuid>>,

    /// Optional restriction to documents assigned to a project
    pub project_id: Option<Uuid>,
}

/// A single chunk returned by a search, ordered by ascending `score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkHit {
    /// Chunk identifier
    pub id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub chunk_index: i32,
    /// Cosine distance to the query (0 = identical direction)
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl ChunkHit {
    /// Similarity in the conventional sense (`1 - distance`).
    pub fn similarity(&self) -> f32 {
        1.0 - self.score
    }
}

/// Produces fixed-length embedding vectors for query text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, MemoryError>;

    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;
}

/// A searchable index of embedded document chunks.
///
/// Implementations: in-memory (tests, demos) and PostgreSQL + pgvector.
#[async_trait]
pub trait ChunkIndex: Send + Sync {
    /// The backend name (e.g., "in_memory", "postgres").
    fn name(&self) -> &str;

    /// Nearest chunks to `query.embedding`, ascending cosine distance.
    async fn search(&self, query: ChunkQuery) -> Result<Vec<ChunkHit>, MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_inverts_distance() {
        let hit = ChunkHit {
            id: Uuid::nil(),
            document_id: Uuid::nil(),
            content: "x".into(),
            chunk_index: 0,
            score: 0.25,
            metadata: None,
        };
        assert!((hit.similarity() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn hit_serializes_document_id_as_string() {
        let hit = ChunkHit {
            id: Uuid::nil(),
            document_id: Uuid::nil(),
            content: "chunk".into(),
            chunk_index: 2,
            score: 0.1,
            metadata: Some(serde_json::json!({"page": 3})),
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["document_id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["chunk_index"], 2);
        assert_eq!(json["metadata"]["page"], 3);
    }
}
