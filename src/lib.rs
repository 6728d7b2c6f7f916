pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod initialization;
pub mod input;

/// Re-export necessary items for main.rs and tests
pub use application::document_service::VectorStoreDocumentManager;
pub use config::{load_config, AppConfig};
pub use domain::collection::{CollectionSettings, DistanceMetric};
pub use domain::document::{Document, Filters, Metadata, UpsertRequest};
pub use domain::document_manager::DocumentManager;
pub use domain::embedder::Embedder;
pub use domain::error::{DocumentStoreError, Result};
pub use domain::filter::{DocumentFilter, WhereFilter};
pub use domain::vector_repository::VectorRepository;
pub use infrastructure::embedding::EmbeddingGenerator;
pub use infrastructure::vector_db::{qdrant_client, VectorDb};
