use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::collection::DistanceMetric;
use super::document::{Filters, Metadata};
use super::error::Result;

/// A document as written to the vector database.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub vector: Vec<f32>,
}

/// A nearest-neighbour hit with the engine's raw score.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordHit {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Opens the collection `name`, creating it when missing. Returns the
    /// distance metric the collection actually uses.
    async fn ensure_collection(&self, name: &str, dimension: u64, distance: DistanceMetric) -> Result<DistanceMetric>;

    /// Inserts records, replacing any stored under the same id.
    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<()>;

    /// Returns up to `limit` records closest to `vector`, best first.
    async fn query(&self, vector: Vec<f32>, limit: u64, filter: Option<Filters>) -> Result<Vec<RecordHit>>;

    /// Ids of every record matching `filter`, or of every record when `None`.
    async fn ids_matching(&self, filter: Option<Filters>) -> Result<Vec<String>>;

    async fn delete(&self, ids: Vec<String>) -> Result<()>;
}
