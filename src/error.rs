use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures raised while loading the knowledge base or answering a retrieval.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("GOOGLE_API_KEY is not set. Add it to your .env file or the environment and restart.")]
    MissingCredential,

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("chunk {index} in {path:?} is neither a string nor an object with a string \"text\" field")]
    InvalidChunk { path: PathBuf, index: usize },

    #[error("embedding row {row} has {got} values, expected {expected}")]
    RaggedEmbeddings { row: usize, expected: usize, got: usize },

    #[error("corpus has {embeddings} embeddings but {chunks} chunks")]
    LengthMismatch { embeddings: usize, chunks: usize },

    #[error("embedding row {row} has zero norm")]
    ZeroNormEmbedding { row: usize },

    #[error("failed to load embedding model: {0}")]
    ModelLoad(String),

    #[error("failed to embed text: {0}")]
    Embedding(String),

    #[error("vector has {got} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("query embedding has zero norm")]
    DegenerateQuery,

    #[error("top-k must be at least 1")]
    InvalidTopK,
}

/// Per-turn generation failures. `Display` yields the labeled answer text.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("[Error: Gemini API returned {0}]")]
    Status(u16),

    #[error("[Error: Unexpected Gemini API response format]")]
    UnexpectedFormat,

    #[error("[Error: Gemini API timed out after {0:?}]")]
    Timeout(Duration),

    #[error("[Error: Gemini API request failed: {0}]")]
    Transport(String),
}

pub type RagResult<T> = Result<T, RagError>;
