pub mod agents;
pub mod chat;
pub mod init;
pub mod tools;

use std::sync::Arc;

use toolwright_config::AppConfig;
use toolwright_core::{ChunkIndex, Provider, ToolRegistry};
use toolwright_providers::{OpenAiCompatProvider, ProviderEmbedder};

/// The model client described by `[provider]`.
pub fn build_provider(config: &AppConfig) -> Arc<dyn Provider> {
    Arc::new(OpenAiCompatProvider::from_config(&config.provider))
}

/// Built-in tools wired to the configured provider and embedding model.
pub fn build_registry(config: &AppConfig, provider: Arc<dyn Provider>) -> ToolRegistry {
    let embedder = Arc::new(ProviderEmbedder::from_config(provider.clone(), &config.embedding));
    toolwright_tools::default_registry(embedder, provider, config.provider.model.clone())
}

/// The chunk index for retrieval, when one is configured.
#[cfg(feature = "postgres")]
pub async fn build_chunk_index(config: &AppConfig) -> Result<Option<Arc<dyn ChunkIndex>>, Box<dyn std::error::Error>> {
    let Some(url) = &config.database_url else {
        return Ok(None);
    };
    let index = toolwright_memory::PostgresChunkIndex::connect(url)
        .await?
        .with_embedding_dim(config.embedding.dimension);
    Ok(Some(Arc::new(index)))
}

#[cfg(not(feature = "postgres"))]
pub async fn build_chunk_index(config: &AppConfig) -> Result<Option<Arc<dyn ChunkIndex>>, Box<dyn std::error::Error>> {
    if config.database_url.is_some() {
        tracing::warn!("database_url is set but this build has no postgres support; retrieval is disabled");
    }
    Ok(None)
}
