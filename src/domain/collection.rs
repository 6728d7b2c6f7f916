use serde::{Deserialize, Serialize};

/// Distance function a collection is built with.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// Euclidean distance.
    #[serde(rename = "l2")]
    L2,
    /// Inner product.
    #[serde(rename = "ip")]
    Ip,
    #[default]
    #[serde(rename = "cosine")]
    Cosine,
}

impl DistanceMetric {
    /// Converts the raw score the vector database reports into the similarity
    /// handed to callers, `1 - distance`, rounded to two decimals.
    ///
    /// The engine reports cosine similarity for `Cosine`, the euclidean
    /// distance for `L2` and the dot product for `Ip`.
    pub fn similarity(&self, raw_score: f32) -> f64 {
        let raw = raw_score as f64;
        let distance = match self {
            DistanceMetric::Cosine => 1.0 - raw,
            DistanceMetric::L2 => raw,
            DistanceMetric::Ip => 1.0 - raw,
        };
        round2(1.0 - distance)
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DistanceMetric::L2 => "l2",
            DistanceMetric::Ip => "ip",
            DistanceMetric::Cosine => "cosine",
        };
        f.write_str(name)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub const DEFAULT_COLLECTION_NAME: &str = "documents";

/// Collection the document manager reads and writes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CollectionSettings {
    pub name: String,
    #[serde(default)]
    pub distance: DistanceMetric,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<u32>,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_COLLECTION_NAME.to_string(),
            distance: DistanceMetric::default(),
            category: None,
            created_by: None,
            description: None,
            version: None,
        }
    }
}

impl CollectionSettings {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = distance;
        self
    }
}
