use tracing::debug;

use crate::embedder::Embedder;
use crate::error::{RagError, RagResult};
use crate::utils::normalize_query;
use crate::vector_db::{CorpusStore, RankedChunk};

/// Embeds queries and ranks them against a loaded corpus.
pub struct Retriever<'a, E: Embedder> {
    store: &'a CorpusStore,
    embedder: &'a E,
}

impl<'a, E: Embedder> Retriever<'a, E> {
    /// Fails when a non-empty corpus was built with a different embedding width.
    pub fn new(store: &'a CorpusStore, embedder: &'a E) -> RagResult<Self> {
        if !store.is_empty() && store.dimension() != embedder.dimension() {
            return Err(RagError::DimensionMismatch {
                expected: embedder.dimension(),
                got: store.dimension(),
            });
        }
        Ok(Retriever { store, embedder })
    }

    pub fn retrieve(&self, query: &str, top_k: usize) -> RagResult<Vec<RankedChunk>> {
        if self.store.is_empty() {
            return self.store.search_similar(&[], top_k);
        }

        let query = normalize_query(query);
        let query_embedding = self.embedder.encode_one(&query)?;
        let ranked = self.store.search_similar(&query_embedding, top_k)?;

        debug!(
            returned = ranked.len(),
            top_score = ranked.first().map(|r| r.score),
            "retrieved chunks"
        );
        Ok(ranked)
    }
}
