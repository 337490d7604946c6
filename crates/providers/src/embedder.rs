//! Query embedding through a provider's `/embeddings` endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use toolwright_config::EmbeddingConfig;
use toolwright_core::error::MemoryError;
use toolwright_core::provider::EmbeddingRequest;
use toolwright_core::{Embedder, Provider};

/// Adapts any [`Provider`] that supports embeddings into an [`Embedder`].
///
/// Every vector is checked against the configured dimension so a model
/// swap cannot silently corrupt index lookups.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimension: usize,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            dimension,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &EmbeddingConfig) -> Self {
        Self::new(provider, config.model.clone(), config.dimension)
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: vec![text.to_string()],
            })
            .await
            .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;

        let embedding = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::EmbeddingFailed("empty embedding response".into()))?;

        if embedding.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolwright_core::error::ProviderError;
    use toolwright_core::message::Message;
    use toolwright_core::provider::{EmbeddingResponse, ProviderRequest, ProviderResponse};

    struct FixedEmbeddings(Vec<Vec<f32>>);

    #[async_trait]
    impl Provider for FixedEmbeddings {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant(""),
                usage: None,
                model: request.model,
            })
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            Ok(EmbeddingResponse {
                embeddings: self.0.clone(),
                model: request.model,
                usage: None,
            })
        }
    }

    #[tokio::test]
    async fn returns_first_vector() {
        let embedder = ProviderEmbedder::new(Arc::new(FixedEmbeddings(vec![vec![1.0, 0.0, 0.0]])), "m", 3);
        assert_eq!(embedder.embed_query("q").await.unwrap(), vec![1.0, 0.0, 0.0]);
        assert_eq!(embedder.dimension(), 3);
    }

    #[tokio::test]
    async fn rejects_wrong_dimension() {
        let embedder = ProviderEmbedder::new(Arc::new(FixedEmbeddings(vec![vec![1.0, 0.0]])), "m", 3);
        let err = embedder.embed_query("q").await.unwrap_err();
        assert!(matches!(err, MemoryError::DimensionMismatch { expected: 3, actual: 2 }));
    }

    #[tokio::test]
    async fn empty_response_is_an_error() {
        let embedder = ProviderEmbedder::new(Arc::new(FixedEmbeddings(vec![])), "m", 3);
        assert!(matches!(
            embedder.embed_query("q").await,
            Err(MemoryError::EmbeddingFailed(_))
        ));
    }

    #[tokio::test]
    async fn provider_without_embeddings_maps_to_memory_error() {
        struct NoEmbed;
        #[async_trait]
        impl Provider for NoEmbed {
            fn name(&self) -> &str {
                "none"
            }
            async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
                Ok(ProviderResponse {
                    message: Message::assistant(""),
                    usage: None,
                    model: request.model,
                })
            }
        }
        let embedder = ProviderEmbedder::new(Arc::new(NoEmbed), "m", 3);
        assert!(matches!(
            embedder.embed_query("q").await,
            Err(MemoryError::EmbeddingFailed(_))
        ));
    }
}
