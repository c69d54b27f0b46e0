use std::fs::{self, DirBuilder};
use std::path::Path;

use serde::de::DeserializeOwned;
use unicode_normalization::UnicodeNormalization;

use crate::error::{RagError, RagResult};

/// Creates a directory if it doesn't exist
pub fn ensure_dir(path: impl AsRef<Path>) -> RagResult<()> {
    let path = path.as_ref();
    DirBuilder::new()
        .recursive(true)
        .create(path)
        .map_err(|source| RagError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Reads a UTF-8 JSON artifact from disk and deserializes it.
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> RagResult<T> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| RagError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| RagError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// NFC-normalizes a query and trims its ends. Inner whitespace is kept so
/// pasted code reaches the embedder with its layout intact.
pub fn normalize_query(text: &str) -> String {
    text.trim().nfc().collect()
}
