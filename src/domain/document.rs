use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{DocumentStoreError, Result};
use super::filter::{DocumentFilter, WhereFilter};

/// Metadata attached to a stored document. Values must be scalars.
pub type Metadata = Map<String, Value>;

/// A document returned from a similarity search.
///
/// `metadata` carries the document id under `"id"` and the similarity under
/// `"score"`, followed by the metadata stored with the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn from_hit(id: &str, text: String, score: f64, stored: Metadata) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("id".to_string(), Value::String(id.to_string()));
        metadata.insert(
            "score".to_string(),
            serde_json::Number::from_f64(score)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        );
        // Stored keys win over the generated ones.
        metadata.extend(stored);
        Self {
            page_content: text,
            metadata,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.metadata.get("id").and_then(Value::as_str)
    }

    pub fn score(&self) -> Option<f64> {
        self.metadata.get("score").and_then(Value::as_f64)
    }
}

/// Optional metadata and document-content filters.
///
/// Used both as search options and as delete filters. A value with neither
/// part set means "no filters".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Filters {
    #[serde(default, rename = "where")]
    pub where_filter: Option<WhereFilter>,
    #[serde(default)]
    pub where_document: Option<DocumentFilter>,
}

impl Filters {
    pub fn new(where_filter: Option<WhereFilter>, where_document: Option<DocumentFilter>) -> Self {
        Self {
            where_filter,
            where_document,
        }
    }

    pub fn with_where(where_filter: WhereFilter) -> Self {
        Self::new(Some(where_filter), None)
    }

    pub fn with_where_document(where_document: DocumentFilter) -> Self {
        Self::new(None, Some(where_document))
    }

    pub fn is_empty(&self) -> bool {
        self.where_filter.is_none() && self.where_document.is_none()
    }
}

/// A batch of texts with optional aligned metadata and ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertRequest {
    pub texts: Vec<String>,
    pub metadatas: Option<Vec<Metadata>>,
    pub ids: Option<Vec<String>>,
}

impl UpsertRequest {
    pub fn new(texts: Vec<String>, metadatas: Option<Vec<Metadata>>, ids: Option<Vec<String>>) -> Self {
        Self {
            texts,
            metadatas,
            ids,
        }
    }

    /// Splits the request into consecutive slices of at most `batch_size`
    /// texts, keeping metadata and ids aligned with their texts.
    pub fn into_batches(self, batch_size: usize) -> Result<Vec<UpsertRequest>> {
        if batch_size == 0 {
            return Err(DocumentStoreError::InvalidInput(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        self.validate_lengths()?;

        let total = self.texts.len();
        let mut texts = self.texts.into_iter();
        let mut metadatas = self.metadatas.map(Vec::into_iter);
        let mut ids = self.ids.map(Vec::into_iter);

        let mut batches = Vec::with_capacity(total.div_ceil(batch_size));
        let mut start = 0;
        while start < total {
            let len = batch_size.min(total - start);
            batches.push(UpsertRequest {
                texts: texts.by_ref().take(len).collect(),
                metadatas: metadatas.as_mut().map(|m| m.by_ref().take(len).collect()),
                ids: ids.as_mut().map(|i| i.by_ref().take(len).collect()),
            });
            start += len;
        }
        Ok(batches)
    }

    pub fn validate_lengths(&self) -> Result<()> {
        let total = self.texts.len();
        if let Some(metadatas) = &self.metadatas {
            if metadatas.len() != total {
                return Err(DocumentStoreError::InvalidInput(format!(
                    "got {} metadatas for {} texts",
                    metadatas.len(),
                    total
                )));
            }
        }
        if let Some(ids) = &self.ids {
            if ids.len() != total {
                return Err(DocumentStoreError::InvalidInput(format!(
                    "got {} ids for {} texts",
                    ids.len(),
                    total
                )));
            }
        }
        Ok(())
    }
}

/// Checks that every metadata value is a string, number or bool.
pub fn validate_metadata(id: &str, metadata: &Metadata) -> Result<()> {
    for (key, value) in metadata {
        let ok = matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_));
        if !ok {
            return Err(DocumentStoreError::InvalidMetadata {
                id: id.to_string(),
                reason: format!("value for '{}' must be a string, number or bool, got {}", key, value),
            });
        }
    }
    Ok(())
}
