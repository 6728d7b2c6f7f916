use async_trait::async_trait;

use super::document::{Document, Filters, Metadata};
use super::error::Result;

pub const DEFAULT_SEARCH_K: usize = 10;
pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_WORKERS: usize = 10;

/// Uniform document-store API over a vector database.
#[async_trait]
pub trait DocumentManager: Send + Sync {
    /// Embeds and stores `texts`. When `ids` is `None` every text gets a fresh
    /// UUID; storing under an existing id replaces that document.
    async fn upsert(
        &self,
        texts: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
        ids: Option<Vec<String>>,
    ) -> Result<()>;

    /// Same as [`DocumentManager::upsert`], split into batches of
    /// `batch_size` with at most `workers` batches in flight.
    async fn upsert_parallel(
        &self,
        texts: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
        ids: Option<Vec<String>>,
        batch_size: usize,
        workers: usize,
    ) -> Result<()>;

    /// Returns the `k` documents most similar to `query`.
    async fn search(&self, query: &str, k: usize, options: Filters) -> Result<Vec<Document>>;

    /// Deletes documents and returns how many were removed.
    ///
    /// * no ids and no filters: everything in the collection
    /// * ids only: those ids
    /// * filters only: every document matching the filters
    /// * both: the given ids that also match the filters
    async fn delete(&self, ids: Option<Vec<String>>, filters: Option<Filters>) -> Result<usize>;
}
