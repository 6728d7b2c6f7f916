//! End-to-end tests against a real Qdrant started with testcontainers.
//! Run with `cargo test -- --ignored` on a machine with a docker daemon.
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use testcontainers::core::{ContainerAsync, IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{GenericImage, ImageExt};
use uuid::Uuid;
use vecdoc::domain::vector_repository::VectorRepository;
use vecdoc::qdrant_client::Qdrant;
use vecdoc::{
    CollectionSettings, DistanceMetric, DocumentFilter, DocumentManager, DocumentStoreError, Embedder,
    Filters, Metadata, VectorDb, VectorStoreDocumentManager, WhereFilter,
};

const KEYWORDS: [&str; 3] = ["rust", "python", "database"];

/// Embeds texts by counting a few keywords, so similarity is predictable.
struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn embed_documents(&self, texts: &[String]) -> vecdoc::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let mut vector: Vec<f32> = KEYWORDS.iter().map(|k| lower.matches(k).count() as f32).collect();
                vector.push(0.1);
                vector
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        KEYWORDS.len() + 1
    }
}

async fn start_qdrant() -> Result<(Qdrant, ContainerAsync<GenericImage>)> {
    let container = GenericImage::new("qdrant/qdrant", "latest")
        .with_exposed_port(6334.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Qdrant gRPC listening on 6334"))
        .with_startup_timeout(std::time::Duration::from_secs(120))
        .start()
        .await?;
    let grpc_port = container.get_host_port_ipv4(6334.tcp()).await?;
    let client = Qdrant::from_url(&format!("http://localhost:{}", grpc_port)).build()?;
    Ok((client, container))
}

async fn setup_manager(
    distance: DistanceMetric,
) -> Result<(VectorStoreDocumentManager, ContainerAsync<GenericImage>)> {
    let (client, container) = start_qdrant().await?;
    let collection_name = format!("test_coll_{}", Uuid::new_v4().as_simple());
    let vector_db: Arc<dyn VectorRepository> = Arc::new(VectorDb::new(client, collection_name.clone())?);
    let manager = VectorStoreDocumentManager::new(
        Arc::new(KeywordEmbedder),
        vector_db,
        CollectionSettings::named(collection_name).with_distance(distance),
    )
    .await?;
    Ok((manager, container))
}

fn meta(value: serde_json::Value) -> Metadata {
    value.as_object().cloned().unwrap_or_default()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

async fn seed(manager: &VectorStoreDocumentManager) -> Result<()> {
    manager
        .upsert(
            strings(&[
                "Rust makes systems programming safe.",
                "Python is great for data science.",
                "A vector database stores embeddings.",
                "Rust clients talk to the database over gRPC.",
            ]),
            Some(vec![
                meta(json!({"lang": "rust", "year": 2021})),
                meta(json!({"lang": "python", "year": 2019})),
                meta(json!({"lang": "none", "year": 2023})),
                meta(json!({"lang": "rust", "year": 2024})),
            ]),
            Some(strings(&["r1", "p1", "d1", "r2"])),
        )
        .await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn test_upsert_and_search_ranks_by_similarity() -> Result<()> {
    let (manager, _container) = setup_manager(DistanceMetric::Cosine).await?;
    seed(&manager).await?;

    let results = manager.search("rust", 2, Filters::default()).await?;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id(), Some("r1"));
    assert_eq!(results[1].id(), Some("r2"));
    assert!(results[0].score().unwrap() > results[1].score().unwrap());
    assert!(results[0].score().unwrap() <= 1.0);
    assert_eq!(results[0].metadata.get("lang"), Some(&json!("rust")));
    assert_eq!(results[0].page_content, "Rust makes systems programming safe.");
    Ok(())
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn test_search_honours_filters() -> Result<()> {
    let (manager, _container) = setup_manager(DistanceMetric::Cosine).await?;
    seed(&manager).await?;

    let by_year = Filters::with_where(WhereFilter::from_json(&json!({"year": {"$gte": 2023}}))?);
    let mut ids: Vec<String> = manager
        .search("database", 10, by_year)
        .await?
        .iter()
        .filter_map(|d| d.id().map(str::to_string))
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["d1", "r2"]);

    let by_text = Filters::new(
        Some(WhereFilter::eq("lang", "rust")),
        Some(DocumentFilter::Contains("gRPC".to_string())),
    );
    let results = manager.search("rust", 10, by_text).await?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id(), Some("r2"));
    Ok(())
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn test_upsert_same_id_replaces_document() -> Result<()> {
    let (manager, _container) = setup_manager(DistanceMetric::Cosine).await?;
    manager
        .upsert(strings(&["old rust text"]), None, Some(strings(&["doc"])))
        .await?;
    manager
        .upsert(strings(&["new rust text"]), None, Some(strings(&["doc"])))
        .await?;

    let results = manager.search("rust", 10, Filters::default()).await?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].page_content, "new rust text");
    Ok(())
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn test_upsert_parallel_stores_every_batch() -> Result<()> {
    let (manager, _container) = setup_manager(DistanceMetric::Cosine).await?;
    let texts: Vec<String> = (0..25).map(|i| format!("rust note {}", i)).collect();
    manager.upsert_parallel(texts, None, None, 4, 3).await?;

    let results = manager.search("rust", 100, Filters::default()).await?;
    assert_eq!(results.len(), 25);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn test_delete_cases() -> Result<()> {
    let (manager, _container) = setup_manager(DistanceMetric::Cosine).await?;
    seed(&manager).await?;

    // ids and filters: only the overlap goes
    let rust_only = Filters::with_where(WhereFilter::eq("lang", "rust"));
    let deleted = manager
        .delete(Some(strings(&["r1", "p1"])), Some(rust_only))
        .await?;
    assert_eq!(deleted, 1);

    // filters only
    let python_docs = Filters::with_where_document(DocumentFilter::Contains("Python".to_string()));
    assert_eq!(manager.delete(None, Some(python_docs.clone())).await?, 1);
    assert_eq!(manager.delete(None, Some(python_docs)).await?, 0);

    // ids only
    assert_eq!(manager.delete(Some(strings(&["d1"])), None).await?, 1);

    // everything that is left
    assert_eq!(manager.delete(None, None).await?, 1);
    assert!(manager.search("rust", 10, Filters::default()).await?.is_empty());
    Ok(())
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn test_reopening_keeps_distance_and_checks_dimension() -> Result<()> {
    let (client, _container) = start_qdrant().await?;
    let name = format!("test_coll_{}", Uuid::new_v4().as_simple());

    let first = VectorDb::new(client, name.clone())?;
    assert_eq!(first.ensure_collection(&name, 4, DistanceMetric::L2).await?, DistanceMetric::L2);
    // Existing collection wins over the requested metric
    assert_eq!(first.ensure_collection(&name, 4, DistanceMetric::Cosine).await?, DistanceMetric::L2);

    let mismatch = first.ensure_collection(&name, 8, DistanceMetric::L2).await;
    assert!(matches!(
        mismatch,
        Err(DocumentStoreError::DimensionMismatch { expected: 4, actual: 8, .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_vector_db_new_invalid_params() -> Result<()> {
    let client = Qdrant::from_url("http://dummy-url").build()?;
    assert!(VectorDb::new(client, "".to_string()).is_err());
    Ok(())
}

#[tokio::test]
async fn test_ensure_collection_rejects_other_name() -> Result<()> {
    let client = Qdrant::from_url("http://dummy-url").build()?;
    let vector_db = VectorDb::new(client, "papers".to_string())?;
    let result = vector_db.ensure_collection("documents", 4, DistanceMetric::Cosine).await;
    assert!(matches!(result, Err(DocumentStoreError::Config(msg)) if msg.contains("papers")));
    Ok(())
}
