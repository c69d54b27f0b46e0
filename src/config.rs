use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::embedder::SentenceEmbedder;
use crate::error::{RagError, RagResult};
use crate::llm::{LLMConfig, DEFAULT_API_BASE, DEFAULT_MODEL};

#[derive(Parser, Debug)]
#[command(
    name = "java-rag",
    about = "Answer Java questions from a precomputed textbook knowledge base"
)]
pub struct Config {
    /// JSON array of embedding vectors, one per chunk
    #[arg(long, env = "RAG_EMBEDDINGS_PATH", default_value = "embeddings.json")]
    pub embeddings: PathBuf,

    /// JSON array of chunks, or an object holding it under "chunks"
    #[arg(long, env = "RAG_CHUNKS_PATH", default_value = "chunks.json")]
    pub chunks: PathBuf,

    /// Number of chunks passed to the model as context
    #[arg(long, env = "RAG_TOP_K", default_value_t = 5)]
    pub top_k: usize,

    /// Gemini model used for answers
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Base URL of the Gemini API
    #[arg(long, env = "GEMINI_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Seconds before a Gemini request is abandoned
    #[arg(long, env = "GEMINI_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Where the sentence-embedding weights are cached
    #[arg(long, env = "RAG_MODEL_CACHE")]
    pub model_cache: Option<PathBuf>,

    /// Print the retrieved context under each answer
    #[arg(long, default_value_t = false)]
    pub show_context: bool,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true, hide = true)]
    pub api_key: Option<String>,
}

impl Config {
    /// Checks settings that must hold before anything is loaded.
    pub fn validate(&self) -> RagResult<()> {
        if self.top_k == 0 {
            return Err(RagError::InvalidTopK);
        }
        self.api_key()?;
        Ok(())
    }

    pub fn api_key(&self) -> RagResult<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(RagError::MissingCredential)
    }

    pub fn model_cache_dir(&self) -> RagResult<PathBuf> {
        match &self.model_cache {
            Some(dir) => Ok(dir.clone()),
            None => SentenceEmbedder::default_cache_dir(),
        }
    }

    pub fn llm_config(&self) -> RagResult<LLMConfig> {
        let mut config = LLMConfig::new(self.api_key()?);
        config.api_base = self.api_base.clone();
        config.model = self.model.clone();
        config.timeout = Duration::from_secs(self.timeout_secs);
        Ok(config)
    }
}
