pub mod embedding;
pub mod vector_db;

// Re-export key types for easier access from application layer
pub use embedding::EmbeddingGenerator;

// Re-export EmbeddingModel directly from the dependency
pub use fastembed::EmbeddingModel;
