use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

// Use the re-exported module path for Qdrant internally
pub use qdrant_client; // Re-export the entire module
use self::qdrant_client::qdrant::value::Kind as QdrantValueKind;
use self::qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use self::qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PayloadIncludeSelector,
    PointId, PointStruct, PointsIdsList, Range, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use self::qdrant_client::{Payload, Qdrant, QdrantError};

use crate::config::QdrantSettings;
use crate::domain::collection::DistanceMetric;
use crate::domain::document::{Filters, Metadata};
use crate::domain::error::{DocumentStoreError, Result};
use crate::domain::filter::{Comparison, DocumentFilter, Scalar, WhereFilter};
use crate::domain::vector_repository::{RecordHit, StoredRecord, VectorRepository};

/// Payload keys every point carries.
pub const FIELD_DOC_ID: &str = "doc_id";
pub const FIELD_DOCUMENT: &str = "document";
pub const FIELD_METADATA: &str = "metadata";

const SCROLL_PAGE_SIZE: u32 = 1000;
const DELETE_BATCH_SIZE: usize = 1000;

impl From<QdrantError> for DocumentStoreError {
    fn from(err: QdrantError) -> Self {
        DocumentStoreError::Store(err.to_string())
    }
}

/// Builds a Qdrant client from the connection settings.
pub fn connect(settings: &QdrantSettings) -> Result<Qdrant> {
    let mut builder = Qdrant::from_url(&settings.url).timeout(Duration::from_secs(settings.timeout_secs));
    if let Some(key) = &settings.api_key {
        builder = builder.api_key(key.clone());
    }
    builder.build().map_err(DocumentStoreError::from)
}

/// Qdrant point ids must be UUIDs or integers, so document ids are mapped
/// onto a stable UUIDv5. The original id travels in the payload.
pub fn point_id_for(doc_id: &str) -> PointId {
    PointId::from(Uuid::new_v5(&Uuid::NAMESPACE_OID, doc_id.as_bytes()).to_string())
}

pub fn distance_to_qdrant(distance: DistanceMetric) -> Distance {
    match distance {
        DistanceMetric::Cosine => Distance::Cosine,
        DistanceMetric::L2 => Distance::Euclid,
        DistanceMetric::Ip => Distance::Dot,
    }
}

pub fn distance_from_qdrant(distance: Distance) -> Option<DistanceMetric> {
    match distance {
        Distance::Cosine => Some(DistanceMetric::Cosine),
        Distance::Euclid => Some(DistanceMetric::L2),
        Distance::Dot => Some(DistanceMetric::Ip),
        _ => None,
    }
}

pub struct VectorDb {
    client: Qdrant,
    collection_name: String,
}

impl VectorDb {
    /// Creates a new VectorDb instance bound to one collection.
    ///
    /// The collection itself is opened or created by
    /// [`VectorRepository::ensure_collection`].
    pub fn new(client: Qdrant, collection_name: String) -> Result<Self> {
        if collection_name.is_empty() {
            return Err(DocumentStoreError::InvalidInput(
                "Collection name cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            client,
            collection_name,
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    async fn create_collection(&self, dimension: u64, distance: DistanceMetric) -> Result<()> {
        log::info!(
            "Creating collection '{}' with size {} and distance {}...",
            self.collection_name,
            dimension,
            distance
        );
        let create_builder = CreateCollectionBuilder::new(self.collection_name.clone())
            .vectors_config(VectorParamsBuilder::new(dimension, distance_to_qdrant(distance)));

        match self.client.create_collection(create_builder).await {
            Ok(_) => {
                log::info!("Successfully created collection '{}'.", self.collection_name);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to create collection '{}': {}", self.collection_name, e);
                Err(e.into())
            }
        }
    }

    /// Reads vector size and distance of an existing collection.
    async fn existing_params(&self) -> Result<(u64, DistanceMetric)> {
        let info = self
            .client
            .collection_info(self.collection_name.as_str())
            .await?
            .result
            .ok_or_else(|| DocumentStoreError::Store("Collection info result was empty".to_string()))?;

        let vectors_config = info
            .config
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|vc| vc.config);
        match vectors_config {
            Some(VectorsConfigKind::Params(params)) => {
                let distance = Distance::try_from(params.distance)
                    .ok()
                    .and_then(distance_from_qdrant)
                    .ok_or_else(|| {
                        DocumentStoreError::Store(format!(
                            "Collection '{}' uses an unsupported distance ({})",
                            self.collection_name, params.distance
                        ))
                    })?;
                Ok((params.size, distance))
            }
            Some(VectorsConfigKind::ParamsMap(_)) => Err(DocumentStoreError::Store(format!(
                "Collection '{}' uses named vectors, which are not supported",
                self.collection_name
            ))),
            None => Err(DocumentStoreError::Store(format!(
                "Collection '{}' has no vector configuration",
                self.collection_name
            ))),
        }
    }
}

#[async_trait]
impl VectorRepository for VectorDb {
    async fn ensure_collection(&self, name: &str, dimension: u64, distance: DistanceMetric) -> Result<DistanceMetric> {
        if name != self.collection_name {
            return Err(DocumentStoreError::Config(format!(
                "repository is bound to collection '{}', not '{}'",
                self.collection_name, name
            )));
        }
        if dimension == 0 {
            return Err(DocumentStoreError::InvalidInput(
                "Vector size must be greater than zero".to_string(),
            ));
        }
        log::info!("Checking if collection '{}' exists...", self.collection_name);

        if !self.client.collection_exists(self.collection_name.as_str()).await? {
            self.create_collection(dimension, distance).await?;
            return Ok(distance);
        }

        let (size, existing) = self.existing_params().await?;
        log::info!(
            "Collection '{}' already exists (size {}, distance {}).",
            self.collection_name,
            size,
            existing
        );
        if size != dimension {
            return Err(DocumentStoreError::DimensionMismatch {
                collection: self.collection_name.clone(),
                expected: size,
                actual: dimension,
            });
        }
        if existing != distance {
            log::warn!(
                "Collection '{}' keeps its distance {}; requested {} is ignored.",
                self.collection_name,
                existing,
                distance
            );
        }
        Ok(existing)
    }

    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<()> {
        if records.is_empty() {
            log::info!("No documents provided for upsert.");
            return Ok(());
        }

        let points = records
            .into_iter()
            .map(|record| {
                let StoredRecord {
                    id,
                    text,
                    metadata,
                    vector,
                } = record;
                let payload = Payload::try_from(json!({
                    FIELD_DOC_ID: id.clone(),
                    FIELD_DOCUMENT: text,
                    FIELD_METADATA: JsonValue::Object(metadata),
                }))
                .map_err(|e| DocumentStoreError::Store(format!("Failed to build payload for '{}': {}", id, e)))?;
                Ok(PointStruct::new(point_id_for(&id), vector, payload))
            })
            .collect::<Result<Vec<_>>>()?;

        let points_count = points.len();
        log::debug!("Upserting {} points into collection '{}'...", points_count, self.collection_name);

        let upsert_builder = UpsertPointsBuilder::new(self.collection_name.clone(), points).wait(true);
        match self.client.upsert_points(upsert_builder).await {
            Ok(response) => {
                if let Some(result) = response.result {
                    log::debug!("Upsert operation completed with status: {:?}", result.status());
                }
                log::info!("Upserted {} points into '{}'.", points_count, self.collection_name);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to upsert points into collection '{}': {}", self.collection_name, e);
                Err(e.into())
            }
        }
    }

    async fn query(&self, vector: Vec<f32>, limit: u64, filter: Option<Filters>) -> Result<Vec<RecordHit>> {
        log::info!("Searching in collection '{}' with limit {}...", self.collection_name, limit);

        let mut builder = SearchPointsBuilder::new(self.collection_name.clone(), vector, limit).with_payload(true);
        if let Some(filter) = filter.as_ref().and_then(build_filter) {
            builder = builder.filter(filter);
        }

        let response = self.client.search_points(builder).await.map_err(|e| {
            log::error!("Qdrant search failed in collection '{}': {}", self.collection_name, e);
            DocumentStoreError::from(e)
        })?;
        log::debug!("Search returned {} points.", response.result.len());

        let hits = response
            .result
            .into_iter()
            .filter_map(|point| {
                let score = point.score;
                match record_from_payload(point.payload) {
                    Some((id, text, metadata)) => Some(RecordHit {
                        id,
                        text,
                        metadata,
                        score,
                    }),
                    None => {
                        log::warn!("Search result point {:?} has no document payload, skipping.", point.id);
                        None
                    }
                }
            })
            .collect();
        Ok(hits)
    }

    async fn ids_matching(&self, filter: Option<Filters>) -> Result<Vec<String>> {
        let qdrant_filter = filter.as_ref().and_then(build_filter);
        let mut ids = Vec::new();
        let mut offset: Option<PointId> = None;
        loop {
            let mut builder = ScrollPointsBuilder::new(self.collection_name.clone())
                .limit(SCROLL_PAGE_SIZE)
                .with_payload(PayloadIncludeSelector {
                    fields: vec![FIELD_DOC_ID.to_string()],
                })
                .with_vectors(false);
            if let Some(f) = &qdrant_filter {
                builder = builder.filter(f.clone());
            }
            if let Some(o) = offset.take() {
                builder = builder.offset(o);
            }

            let response = self.client.scroll(builder).await?;
            for point in response.result {
                match point.payload.get(FIELD_DOC_ID).and_then(|v| v.kind.as_ref()) {
                    Some(QdrantValueKind::StringValue(id)) => ids.push(id.clone()),
                    _ => log::warn!("Point {:?} has no '{}' payload, skipping.", point.id, FIELD_DOC_ID),
                }
            }
            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }
        log::debug!("{} ids matched in collection '{}'.", ids.len(), self.collection_name);
        Ok(ids)
    }

    async fn delete(&self, ids: Vec<String>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let point_ids: Vec<PointId> = ids.iter().map(|id| point_id_for(id)).collect();
        for chunk in point_ids.chunks(DELETE_BATCH_SIZE) {
            let delete_request = DeletePointsBuilder::new(self.collection_name.clone())
                .points(PointsIdsList { ids: chunk.to_vec() })
                .wait(true);
            self.client.delete_points(delete_request).await.map_err(|e| {
                log::error!("Failed to delete points from collection '{}': {}", self.collection_name, e);
                DocumentStoreError::from(e)
            })?;
            log::debug!("Deleted batch of {} points.", chunk.len());
        }
        Ok(())
    }
}

/// Combines the metadata and document filters into one Qdrant filter.
/// Returns `None` when neither is set.
pub fn build_filter(filters: &Filters) -> Option<Filter> {
    let mut conditions = Vec::new();
    if let Some(where_filter) = &filters.where_filter {
        conditions.push(where_condition(where_filter));
    }
    if let Some(where_document) = &filters.where_document {
        conditions.push(document_condition(where_document));
    }
    if conditions.is_empty() {
        None
    } else {
        Some(Filter::must(conditions))
    }
}

fn metadata_field(key: &str) -> String {
    format!("{}.{}", FIELD_METADATA, key)
}

fn where_condition(filter: &WhereFilter) -> Condition {
    match filter {
        WhereFilter::Field { key, comparison } => comparison_condition(&metadata_field(key), comparison),
        WhereFilter::And(parts) => Filter::must(parts.iter().map(where_condition)).into(),
        WhereFilter::Or(parts) => Filter::should(parts.iter().map(where_condition)).into(),
    }
}

fn comparison_condition(field: &str, comparison: &Comparison) -> Condition {
    match comparison {
        Comparison::Eq(value) => eq_condition(field, value),
        Comparison::Ne(value) => Filter::must_not([eq_condition(field, value)]).into(),
        Comparison::Gt(v) => Condition::range(field, Range { gt: Some(*v), ..Default::default() }),
        Comparison::Gte(v) => Condition::range(field, Range { gte: Some(*v), ..Default::default() }),
        Comparison::Lt(v) => Condition::range(field, Range { lt: Some(*v), ..Default::default() }),
        Comparison::Lte(v) => Condition::range(field, Range { lte: Some(*v), ..Default::default() }),
        Comparison::In(values) => in_condition(field, values),
        Comparison::Nin(values) => Filter::must_not([in_condition(field, values)]).into(),
    }
}

fn eq_condition(field: &str, value: &Scalar) -> Condition {
    match value {
        Scalar::Str(s) => Condition::matches(field, s.clone()),
        Scalar::Int(i) => Condition::matches(field, *i),
        Scalar::Bool(b) => Condition::matches(field, *b),
        // Match conditions do not take floats.
        Scalar::Float(f) => Condition::range(
            field,
            Range {
                gte: Some(*f),
                lte: Some(*f),
                ..Default::default()
            },
        ),
    }
}

fn in_condition(field: &str, values: &[Scalar]) -> Condition {
    let keywords: Option<Vec<String>> = values
        .iter()
        .map(|v| match v {
            Scalar::Str(s) => Some(s.clone()),
            _ => None,
        })
        .collect();
    if let Some(keywords) = keywords {
        return Condition::matches(field, keywords);
    }
    let integers: Option<Vec<i64>> = values
        .iter()
        .map(|v| match v {
            Scalar::Int(i) => Some(*i),
            _ => None,
        })
        .collect();
    if let Some(integers) = integers {
        return Condition::matches(field, integers);
    }
    Filter::should(values.iter().map(|v| eq_condition(field, v))).into()
}

fn document_condition(filter: &DocumentFilter) -> Condition {
    match filter {
        DocumentFilter::Contains(text) => Condition::matches_text(FIELD_DOCUMENT, text.clone()),
        DocumentFilter::NotContains(text) => {
            Filter::must_not([Condition::matches_text(FIELD_DOCUMENT, text.clone())]).into()
        }
        DocumentFilter::And(parts) => Filter::must(parts.iter().map(document_condition)).into(),
        DocumentFilter::Or(parts) => Filter::should(parts.iter().map(document_condition)).into(),
    }
}

/// Pulls `(doc_id, document, metadata)` out of a point payload.
fn record_from_payload(payload: HashMap<String, QdrantValue>) -> Option<(String, String, Metadata)> {
    let JsonValue::Object(mut map) = qdrant_payload_to_serde_value(payload) else {
        return None;
    };
    let id = match map.remove(FIELD_DOC_ID)? {
        JsonValue::String(s) => s,
        _ => return None,
    };
    let text = match map.remove(FIELD_DOCUMENT)? {
        JsonValue::String(s) => s,
        _ => return None,
    };
    let metadata = match map.remove(FIELD_METADATA) {
        Some(JsonValue::Object(m)) => m,
        _ => Metadata::new(),
    };
    Some((id, text, metadata))
}

// Helper function to convert a Qdrant payload map to serde_json::Value
fn qdrant_payload_to_serde_value(payload_map: HashMap<String, QdrantValue>) -> JsonValue {
    JsonValue::Object(
        payload_map
            .into_iter()
            .map(|(key, value)| (key, qdrant_value_to_serde_value(value)))
            .collect(),
    )
}

fn qdrant_value_to_serde_value(value: QdrantValue) -> JsonValue {
    match value.kind {
        Some(QdrantValueKind::NullValue(_)) | None => JsonValue::Null,
        Some(QdrantValueKind::BoolValue(b)) => JsonValue::Bool(b),
        Some(QdrantValueKind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Some(QdrantValueKind::IntegerValue(i)) => JsonValue::Number(i.into()),
        Some(QdrantValueKind::StringValue(s)) => JsonValue::String(s),
        Some(QdrantValueKind::ListValue(list)) => {
            JsonValue::Array(list.values.into_iter().map(qdrant_value_to_serde_value).collect())
        }
        Some(QdrantValueKind::StructValue(s)) => qdrant_payload_to_serde_value(s.fields),
    }
}
