use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{error, info};
use uuid::Uuid;

use crate::domain::collection::{CollectionSettings, DistanceMetric};
use crate::domain::document::{validate_metadata, Document, Filters, Metadata, UpsertRequest};
use crate::domain::document_manager::DocumentManager;
use crate::domain::embedder::Embedder;
use crate::domain::error::{DocumentStoreError, Result};
use crate::domain::vector_repository::{StoredRecord, VectorRepository};

/// Document manager backed by an [`Embedder`] and a [`VectorRepository`].
pub struct VectorStoreDocumentManager {
    embedder: Arc<dyn Embedder>,
    vector_db: Arc<dyn VectorRepository>,
    collection: CollectionSettings,
    // Metric of the collection as it exists, which may differ from the
    // requested one when the collection was already there.
    distance: DistanceMetric,
}

impl std::fmt::Debug for VectorStoreDocumentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStoreDocumentManager")
            .field("collection", &self.collection)
            .field("distance", &self.distance)
            .finish_non_exhaustive()
    }
}

impl VectorStoreDocumentManager {
    /// Opens (or creates) the configured collection sized for `embedder`.
    pub async fn new(
        embedder: Arc<dyn Embedder>,
        vector_db: Arc<dyn VectorRepository>,
        collection: CollectionSettings,
    ) -> Result<Self> {
        let dimension = embedder.dimension() as u64;
        let distance = vector_db
            .ensure_collection(&collection.name, dimension, collection.distance)
            .await?;
        info!(
            "Using collection '{}' (distance: {}, category: {:?}, created_by: {:?}, description: {:?}, version: {:?})",
            collection.name,
            distance,
            collection.category,
            collection.created_by,
            collection.description,
            collection.version
        );
        Ok(Self {
            embedder,
            vector_db,
            collection,
            distance,
        })
    }

    pub fn collection(&self) -> &CollectionSettings {
        &self.collection
    }

    pub fn distance(&self) -> DistanceMetric {
        self.distance
    }

    /// Runs the embedder off the async runtime. Hands the texts back with
    /// their vectors.
    async fn embed(&self, texts: Vec<String>) -> Result<(Vec<String>, Vec<Vec<f32>>)> {
        let embedder = Arc::clone(&self.embedder);
        let (texts, vectors) = tokio::task::spawn_blocking(move || {
            let vectors = embedder.embed_documents(&texts);
            (texts, vectors)
        })
        .await?;
        let vectors = vectors?;
        if vectors.len() != texts.len() {
            return Err(DocumentStoreError::Embedding(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        Ok((texts, vectors))
    }
}

fn check_ids(ids: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if id.is_empty() {
            return Err(DocumentStoreError::InvalidInput(
                "document ids cannot be empty".to_string(),
            ));
        }
        if !seen.insert(id.as_str()) {
            return Err(DocumentStoreError::DuplicateId(id.clone()));
        }
    }
    Ok(())
}

fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[async_trait]
impl DocumentManager for VectorStoreDocumentManager {
    async fn upsert(
        &self,
        texts: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
        ids: Option<Vec<String>>,
    ) -> Result<()> {
        let request = UpsertRequest::new(texts, metadatas, ids);
        request.validate_lengths()?;
        let total = request.texts.len();
        if total == 0 {
            info!("No documents provided for upsert.");
            return Ok(());
        }

        let ids = match request.ids {
            Some(ids) => {
                check_ids(&ids)?;
                ids
            }
            None => (0..total).map(|_| Uuid::new_v4().to_string()).collect(),
        };
        let metadatas = request
            .metadatas
            .unwrap_or_else(|| vec![Metadata::new(); total]);
        for (id, metadata) in ids.iter().zip(&metadatas) {
            validate_metadata(id, metadata)?;
        }

        let (texts, vectors) = self.embed(request.texts).await?;
        let records: Vec<StoredRecord> = ids
            .into_iter()
            .zip(texts)
            .zip(metadatas)
            .zip(vectors)
            .map(|(((id, text), metadata), vector)| StoredRecord {
                id,
                text,
                metadata,
                vector,
            })
            .collect();

        info!(
            "Upserting {} documents into collection '{}'...",
            records.len(),
            self.collection.name
        );
        self.vector_db.upsert(records).await
    }

    async fn upsert_parallel(
        &self,
        texts: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
        ids: Option<Vec<String>>,
        batch_size: usize,
        workers: usize,
    ) -> Result<()> {
        if workers == 0 {
            return Err(DocumentStoreError::InvalidInput(
                "workers must be greater than zero".to_string(),
            ));
        }
        if let Some(ids) = &ids {
            check_ids(ids)?;
        }
        let total = texts.len();
        let batches = UpsertRequest::new(texts, metadatas, ids).into_batches(batch_size)?;
        info!(
            "Upserting {} documents in {} batches with up to {} workers...",
            total,
            batches.len(),
            workers
        );

        let mut failures: Vec<(usize, DocumentStoreError)> = stream::iter(batches.into_iter().enumerate())
            .map(|(index, batch)| async move {
                let result = self.upsert(batch.texts, batch.metadatas, batch.ids).await;
                (index, result)
            })
            .buffer_unordered(workers)
            .filter_map(|(index, result)| async move { result.err().map(|e| (index, e)) })
            .collect()
            .await;

        if failures.is_empty() {
            info!("All {} documents upserted.", total);
            return Ok(());
        }
        failures.sort_by_key(|(index, _)| *index);
        for (index, e) in &failures {
            error!("Upsert batch {} failed: {}", index, e);
        }
        let (_, first) = failures.swap_remove(0);
        Err(first)
    }

    async fn search(&self, query: &str, k: usize, options: Filters) -> Result<Vec<Document>> {
        info!("Performing search for query: '{}', k: {}", query, k);
        if k == 0 {
            return Ok(Vec::new());
        }

        let (_, mut vectors) = self.embed(vec![query.to_string()]).await?;
        let query_vector = vectors.pop().ok_or_else(|| {
            DocumentStoreError::Embedding(format!("Failed to generate embedding for query: {}", query))
        })?;

        let filter = if options.is_empty() { None } else { Some(options) };
        let hits = self.vector_db.query(query_vector, k as u64, filter).await?;
        info!("Search returned {} results.", hits.len());

        Ok(hits
            .into_iter()
            .map(|hit| {
                let score = self.distance.similarity(hit.score);
                Document::from_hit(&hit.id, hit.text, score, hit.metadata)
            })
            .collect())
    }

    async fn delete(&self, ids: Option<Vec<String>>, filters: Option<Filters>) -> Result<usize> {
        let ids = ids.filter(|ids| !ids.is_empty()).map(dedup_preserving_order);
        let filters = filters.filter(|f| !f.is_empty());

        let to_delete = match (ids, filters) {
            (None, None) => {
                let all = self.vector_db.ids_matching(None).await?;
                if all.is_empty() {
                    info!("Collection '{}' is empty, nothing to delete.", self.collection.name);
                    return Ok(0);
                }
                all
            }
            (Some(ids), None) => ids,
            (None, Some(filters)) => {
                let matched = self.vector_db.ids_matching(Some(filters)).await?;
                if matched.is_empty() {
                    info!("No matching data found for filters, nothing to delete.");
                    return Ok(0);
                }
                matched
            }
            (Some(ids), Some(filters)) => {
                let matched: HashSet<String> = self
                    .vector_db
                    .ids_matching(Some(filters))
                    .await?
                    .into_iter()
                    .collect();
                let intersection: Vec<String> = ids.into_iter().filter(|id| matched.contains(id)).collect();
                if intersection.is_empty() {
                    info!("No matching data found for the given ids and filters.");
                    return Ok(0);
                }
                intersection
            }
        };

        let count = to_delete.len();
        self.vector_db.delete(to_delete).await?;
        info!("{} documents deleted from '{}'.", count, self.collection.name);
        Ok(count)
    }
}
