use std::path::PathBuf;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::domain::embedder::Embedder;
use crate::domain::error::{DocumentStoreError, Result};

pub const DEFAULT_MODEL_NAME: &str = "AllMiniLML6V2";

/// Local ONNX embedder backed by fastembed.
pub struct EmbeddingGenerator {
    model: TextEmbedding,
    dimension: usize,
}

impl EmbeddingGenerator {
    /// Creates a new EmbeddingGenerator, initializing the specified embedding model.
    ///
    /// # Arguments
    ///
    /// * `model_name` - The embedding model to use (e.g., EmbeddingModel::AllMiniLML6V2).
    /// * `cache_dir` - The cache directory for the embedding model (None for default).
    ///
    /// The model files are downloaded on first use.
    pub fn new(model_name: EmbeddingModel, cache_dir: Option<PathBuf>) -> Result<Self> {
        let (_, dimension) = supported_model(|model, _| *model == model_name).ok_or_else(|| {
            DocumentStoreError::Config(format!("Embedding model {:?} is not supported", model_name))
        })?;

        let mut opts = InitOptions::new(model_name.clone());
        if let Some(dir) = cache_dir {
            opts = opts.with_cache_dir(dir);
        }
        log::info!("Loading embedding model {:?} ({} dimensions)...", model_name, dimension);
        let model = TextEmbedding::try_new(opts).map_err(|e| {
            DocumentStoreError::Embedding(format!("Failed to load model {:?}: {}", model_name, e))
        })?;
        Ok(EmbeddingGenerator { model, dimension })
    }

    /// Same as [`EmbeddingGenerator::new`] with the model looked up by name.
    pub fn from_name(name: &str, cache_dir: Option<PathBuf>) -> Result<Self> {
        let model = resolve_model(name)?;
        Self::new(model, cache_dir)
    }
}

impl Embedder for EmbeddingGenerator {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.model
            .embed(texts.to_vec(), None)
            .map_err(|e| DocumentStoreError::Embedding(e.to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn supported_model<F>(pred: F) -> Option<(EmbeddingModel, usize)>
where
    F: Fn(&EmbeddingModel, &str) -> bool,
{
    TextEmbedding::list_supported_models()
        .into_iter()
        .find(|info| pred(&info.model, info.model_code.as_str()))
        .map(|info| (info.model, info.dim))
}

fn normalize_model_code(code: &str) -> String {
    code.rsplit('/')
        .next()
        .unwrap_or(code)
        .trim_end_matches("-onnx")
        .to_ascii_lowercase()
}

/// Looks up a fastembed model by variant name (`AllMiniLML6V2`) or by model
/// code (`sentence-transformers/all-MiniLM-L6-v2`), ignoring case.
pub fn resolve_model(name: &str) -> Result<EmbeddingModel> {
    let by_variant = supported_model(|model, _| format!("{:?}", model).eq_ignore_ascii_case(name));
    let wanted = normalize_model_code(name);
    by_variant
        .or_else(|| supported_model(|_, code| code.eq_ignore_ascii_case(name)))
        .or_else(|| supported_model(|_, code| normalize_model_code(code) == wanted))
        .map(|(model, _)| model)
        .ok_or_else(|| DocumentStoreError::Config(format!("Unknown embedding model '{}'", name)))
}
