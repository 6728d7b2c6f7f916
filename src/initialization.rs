use std::sync::Arc;

use anyhow::{Context, Result};

use crate::application::document_service::VectorStoreDocumentManager;
use crate::config::AppConfig;
use crate::domain::embedder::Embedder;
use crate::domain::vector_repository::VectorRepository;
use crate::infrastructure::embedding::EmbeddingGenerator;
use crate::infrastructure::vector_db::{self, VectorDb};

/// Connects to Qdrant, loads the embedding model and opens the collection.
pub async fn build_document_manager(config: &AppConfig) -> Result<VectorStoreDocumentManager> {
    log::info!("Connecting to Qdrant at {}...", config.qdrant.url);
    let client = vector_db::connect(&config.qdrant)?;
    let vector_db: Arc<dyn VectorRepository> =
        Arc::new(VectorDb::new(client, config.collection.name.clone())?);

    let model_name = config.embedding.model.clone();
    let cache_dir = config.embedding.cache_dir.clone();
    // Model loading may download files, keep it off the async workers.
    let embedder = tokio::task::spawn_blocking(move || EmbeddingGenerator::from_name(&model_name, cache_dir))
        .await?
        .with_context(|| format!("Failed to create embedder '{}'", config.embedding.model))?;
    let embedder: Arc<dyn Embedder> = Arc::new(embedder);

    let manager = VectorStoreDocumentManager::new(embedder, vector_db, config.collection.clone())
        .await
        .with_context(|| format!("Failed to open collection '{}'", config.collection.name))?;
    Ok(manager)
}
