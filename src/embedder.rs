use std::path::PathBuf;
use std::sync::OnceLock;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use crate::error::{RagError, RagResult};
use crate::utils::ensure_dir;

/// Width of `all-MiniLM-L6-v2` sentence vectors.
pub const MINILM_DIMENSION: usize = 384;

/// Maps text to fixed-length vectors. Same input, same output.
pub trait Embedder {
    fn dimension(&self) -> usize;

    fn encode(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>>;

    fn encode_one(&self, text: &str) -> RagResult<Vec<f32>> {
        self.encode(&[text])?
            .pop()
            .ok_or_else(|| RagError::Embedding("model returned no vector".to_string()))
    }
}

/// `all-MiniLM-L6-v2` through fastembed. Weights are fetched and the ONNX
/// session built on first use, then reused for the life of the process.
pub struct SentenceEmbedder {
    cache_dir: PathBuf,
    model: OnceLock<TextEmbedding>,
}

impl SentenceEmbedder {
    pub fn new(cache_dir: PathBuf) -> Self {
        SentenceEmbedder {
            cache_dir,
            model: OnceLock::new(),
        }
    }

    /// Default weights location under the platform cache directory.
    pub fn default_cache_dir() -> RagResult<PathBuf> {
        let dir = dirs::cache_dir()
            .ok_or_else(|| RagError::ModelLoad("could not determine cache directory".to_string()))?
            .join("java-rag")
            .join("models");
        Ok(dir)
    }

    /// Loads the model now so a failure surfaces before any query is served.
    pub fn warm_up(&self) -> RagResult<()> {
        self.model().map(|_| ())
    }

    fn model(&self) -> RagResult<&TextEmbedding> {
        if let Some(model) = self.model.get() {
            return Ok(model);
        }

        ensure_dir(&self.cache_dir)?;
        info!(cache_dir = ?self.cache_dir, "loading all-MiniLM-L6-v2");
        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_cache_dir(self.cache_dir.clone())
            .with_show_download_progress(true);
        let model = TextEmbedding::try_new(options).map_err(|e| RagError::ModelLoad(e.to_string()))?;

        Ok(self.model.get_or_init(|| model))
    }
}

impl Embedder for SentenceEmbedder {
    fn dimension(&self) -> usize {
        MINILM_DIMENSION
    }

    fn encode(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>> {
        let vectors = self
            .model()?
            .embed(texts.to_vec(), None)
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        if let Some(bad) = vectors.iter().find(|v| v.len() != MINILM_DIMENSION) {
            return Err(RagError::DimensionMismatch {
                expected: MINILM_DIMENSION,
                got: bad.len(),
            });
        }
        Ok(vectors)
    }
}
