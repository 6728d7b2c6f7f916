use super::error::Result;

/// Turns texts into vectors. The same embedder is used for stored documents
/// and for queries, so both land in one vector space.
pub trait Embedder: Send + Sync {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;
}
