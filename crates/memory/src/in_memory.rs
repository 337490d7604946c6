//! In-memory chunk index: useful for testing, demos and small corpora.
//!
//! Mirrors the PostgreSQL backend's semantics: chunks are visible only
//! through documents owned by the querying user, optionally narrowed to a
//! project or an explicit document set, and ranked by ascending cosine
//! distance.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use toolwright_core::error::MemoryError;
use toolwright_core::retrieval::{ChunkHit, ChunkIndex, ChunkQuery};
use uuid::Uuid;

use crate::vector::cosine_distance;

/// A chunk to be inserted into the index.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub document_id: Uuid,
    pub content: String,
    pub chunk_index: i32,
    /// Chunks without an embedding are stored but never returned
    pub embedding: Option<Vec<f32>>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
struct DocumentRecord {
    owner: Uuid,
    projects: HashSet<Uuid>,
}

#[derive(Debug)]
struct ChunkRecord {
    id: Uuid,
    document_id: Uuid,
    content: String,
    chunk_index: i32,
    embedding: Option<Vec<f32>>,
    metadata: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
struct Store {
    documents: HashMap<Uuid, DocumentRecord>,
    chunks: Vec<ChunkRecord>,
    dimension: Option<usize>,
}

/// A chunk index that keeps documents and chunks in process memory.
#[derive(Debug, Default)]
pub struct InMemoryChunkIndex {
    store: RwLock<Store>,
}

impl InMemoryChunkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document owned by `owner`.
    pub async fn add_document(&self, document_id: Uuid, owner: Uuid) {
        let mut store = self.store.write().await;
        store.documents.entry(document_id).or_default().owner = owner;
    }

    /// Assign a registered document to a project.
    pub async fn assign_to_project(&self, document_id: Uuid, project_id: Uuid) -> Result<(), MemoryError> {
        let mut store = self.store.write().await;
        let doc = store
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| MemoryError::Storage(format!("unknown document {document_id}")))?;
        doc.projects.insert(project_id);
        Ok(())
    }

    /// Insert a chunk of a registered document. Returns the chunk id.
    pub async fn add_chunk(&self, chunk: NewChunk) -> Result<Uuid, MemoryError> {
        let mut store = self.store.write().await;
        if !store.documents.contains_key(&chunk.document_id) {
            return Err(MemoryError::Storage(format!(
                "unknown document {}",
                chunk.document_id
            )));
        }

        if let Some(embedding) = &chunk.embedding {
            match store.dimension {
                Some(expected) if expected != embedding.len() => {
                    return Err(MemoryError::DimensionMismatch {
                        expected,
                        actual: embedding.len(),
                    });
                }
                Some(_) => {}
                None => store.dimension = Some(embedding.len()),
            }
        }

        let id = Uuid::new_v4();
        store.chunks.push(ChunkRecord {
            id,
            document_id: chunk.document_id,
            content: chunk.content,
            chunk_index: chunk.chunk_index,
            embedding: chunk.embedding,
            metadata: chunk.metadata,
        });
        Ok(id)
    }

    pub async fn chunk_count(&self) -> usize {
        self.store.read().await.chunks.len()
    }
}

#[async_trait]
impl ChunkIndex for InMemoryChunkIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, query: ChunkQuery) -> Result<Vec<ChunkHit>, MemoryError> {
        let store = self.store.read().await;

        if let Some(expected) = store.dimension
            && expected != query.embedding.len()
        {
            return Err(MemoryError::DimensionMismatch {
                expected,
                actual: query.embedding.len(),
            });
        }

        let allowed_docs: Option<HashSet<Uuid>> = query
            .document_ids
            .as_ref()
            .map(|ids| ids.iter().copied().collect());

        let visible = |document_id: &Uuid| -> bool {
            let Some(doc) = store.documents.get(document_id) else {
                return false;
            };
            doc.owner == query.user_id
                && query.project_id.is_none_or(|p| doc.projects.contains(&p))
                && allowed_docs.as_ref().is_none_or(|set| set.contains(document_id))
        };

        let mut hits: Vec<ChunkHit> = store
            .chunks
            .iter()
            .filter(|c| visible(&c.document_id))
            .filter_map(|c| {
                let embedding = c.embedding.as_ref()?;
                Some(ChunkHit {
                    id: c.id,
                    document_id: c.document_id,
                    content: c.content.clone(),
                    chunk_index: c.chunk_index,
                    score: cosine_distance(embedding, &query.embedding),
                    metadata: c.metadata.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(query.top_k);

        tracing::debug!(hits = hits.len(), top_k = query.top_k, "In-memory chunk search");
        Ok(hits)
    }
}
