use std::cmp::Ordering;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::{RagError, RagResult};
use crate::utils::read_json;

/// One chunk paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedChunk {
    pub index: usize,
    pub text: String,
    pub score: f32,
}

/// Chunks artifact: either the bare array or an object wrapping it under `chunks`.
/// Elements stay raw until `into_texts` so a bad one can be reported by index.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChunksArtifact {
    Bare(Vec<Value>),
    Wrapped { chunks: Vec<Value> },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChunkRecord {
    PlainText(String),
    StructuredText(StructuredChunk),
}

#[derive(Debug, Deserialize)]
struct StructuredChunk {
    #[serde(default)]
    text: Option<String>,
}

impl ChunksArtifact {
    fn into_texts(self, path: &Path) -> RagResult<Vec<String>> {
        let records = match self {
            ChunksArtifact::Bare(records) => records,
            ChunksArtifact::Wrapped { chunks } => chunks,
        };
        records
            .into_iter()
            .enumerate()
            .map(|(index, raw)| match serde_json::from_value(raw) {
                Ok(ChunkRecord::PlainText(text)) => Ok(text),
                Ok(ChunkRecord::StructuredText(chunk)) => Ok(chunk.text.unwrap_or_default()),
                Err(_) => Err(RagError::InvalidChunk {
                    path: path.to_path_buf(),
                    index,
                }),
            })
            .collect()
    }
}

/// Immutable knowledge base: an `n x dim` embedding matrix aligned row-for-row
/// with `n` chunk texts. Scoring runs in f64 so squared components of f32
/// inputs can neither underflow nor overflow.
#[derive(Debug)]
pub struct CorpusStore {
    embeddings: Array2<f64>,
    norms: Array1<f64>,
    chunks: Vec<String>,
}

impl CorpusStore {
    /// Loads and validates both artifacts. Any failure leaves nothing loaded.
    pub fn load(embeddings_path: impl AsRef<Path>, chunks_path: impl AsRef<Path>) -> RagResult<Self> {
        let chunks_path = chunks_path.as_ref();
        let embeddings: Vec<Vec<f32>> = read_json(embeddings_path)?;
        let artifact: ChunksArtifact = read_json(chunks_path)?;
        let store = Self::from_parts(embeddings, artifact.into_texts(chunks_path)?)?;

        info!(
            entries = store.len(),
            dimension = store.dimension(),
            "corpus loaded"
        );
        Ok(store)
    }

    pub fn from_parts(rows: Vec<Vec<f32>>, chunks: Vec<String>) -> RagResult<Self> {
        if rows.len() != chunks.len() {
            return Err(RagError::LengthMismatch {
                embeddings: rows.len(),
                chunks: chunks.len(),
            });
        }

        let dim = rows.first().map_or(0, Vec::len);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != dim {
                return Err(RagError::RaggedEmbeddings {
                    row,
                    expected: dim,
                    got: values.len(),
                });
            }
        }

        let embeddings = Array2::from_shape_fn((rows.len(), dim), |(i, j)| f64::from(rows[i][j]));
        let norms = embeddings.map_axis(Axis(1), |row| row.dot(&row).sqrt());
        if let Some(row) = norms.iter().position(|&norm| norm == 0.0) {
            return Err(RagError::ZeroNormEmbedding { row });
        }

        Ok(CorpusStore {
            embeddings,
            norms,
            chunks,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embedding width, or 0 for an empty corpus.
    pub fn dimension(&self) -> usize {
        self.embeddings.ncols()
    }

    pub fn chunk(&self, index: usize) -> Option<&str> {
        self.chunks.get(index).map(String::as_str)
    }

    /// Scores every entry against `query` and returns the `top_k` best,
    /// highest score first. Equal scores keep ascending corpus order.
    pub fn search_similar(&self, query: &[f32], top_k: usize) -> RagResult<Vec<RankedChunk>> {
        if top_k == 0 {
            return Err(RagError::InvalidTopK);
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension() {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension(),
                got: query.len(),
            });
        }

        let query = widen(query);
        let query_norm = query.dot(&query).sqrt();
        if query_norm == 0.0 {
            return Err(RagError::DegenerateQuery);
        }

        let scores = self.embeddings.dot(&query) / (&self.norms * query_norm);

        let by_rank = |a: &usize, b: &usize| -> Ordering {
            scores[*b].total_cmp(&scores[*a]).then(a.cmp(b))
        };
        let mut order: Vec<usize> = (0..self.len()).collect();
        if top_k < order.len() {
            order.select_nth_unstable_by(top_k - 1, by_rank);
            order.truncate(top_k);
        }
        order.sort_by(by_rank);

        Ok(order
            .into_iter()
            .map(|index| RankedChunk {
                index,
                text: self.chunks[index].clone(),
                score: scores[index] as f32,
            })
            .collect())
    }
}

fn widen(values: &[f32]) -> Array1<f64> {
    ArrayView1::from(values).mapv(f64::from)
}

/// Cosine similarity of two vectors; `None` when either has zero norm or
/// the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let a = widen(a);
    let b = widen(b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        None
    } else {
        Some((a.dot(&b) / (norm_a * norm_b)) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const EPS: f32 = 1e-6;

    fn store(rows: &[&[f32]], chunks: &[&str]) -> CorpusStore {
        CorpusStore::from_parts(
            rows.iter().map(|r| r.to_vec()).collect(),
            chunks.iter().map(|c| c.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_cosine_identity_and_orthogonal() {
        let a = [0.3, -1.2, 4.0];
        assert!((cosine_similarity(&a, &a).unwrap() - 1.0).abs() < EPS);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 2.5]).unwrap().abs() < EPS);
        assert!((cosine_similarity(&[1.0, 0.0], &[-3.0, 0.0]).unwrap() + 1.0).abs() < EPS);
    }

    #[test]
    fn test_cosine_undefined() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
    }

    #[test]
    fn test_top_two_scenario() {
        let corpus = store(&[&[1.0, 0.0], &[0.0, 1.0], &[1.0, 1.0]], &["A", "B", "C"]);
        let ranked = corpus.search_similar(&[1.0, 0.0], 2).unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].text, "A");
        assert!((ranked[0].score - 1.0).abs() < EPS);
        assert_eq!(ranked[1].text, "C");
        assert!((ranked[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < EPS);
    }

    #[test]
    fn test_top_k_sorted_and_bounded() {
        let corpus = store(
            &[&[1.0, 0.2], &[-1.0, 0.0], &[0.5, 0.5], &[0.0, 1.0], &[0.9, -0.1]],
            &["a", "b", "c", "d", "e"],
        );
        for k in 1..=5 {
            let ranked = corpus.search_similar(&[1.0, 0.1], k).unwrap();
            assert_eq!(ranked.len(), k);
            assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        }

        let all = corpus.search_similar(&[1.0, 0.1], 50).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all.last().unwrap().text, "b");
    }

    #[test]
    fn test_batch_scores_match_pairwise() {
        let rows: [&[f32]; 3] = [&[0.2, 0.9, -0.4], &[1.0, 1.0, 1.0], &[-0.5, 0.1, 0.3]];
        let corpus = store(&rows, &["x", "y", "z"]);
        let query = [0.7, -0.2, 0.5];

        for ranked in corpus.search_similar(&query, 3).unwrap() {
            let expected = cosine_similarity(rows[ranked.index], &query).unwrap();
            assert!((ranked.score - expected).abs() < EPS);
        }
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let corpus = store(
            &[&[0.0, 1.0], &[2.0, 0.0], &[1.0, 0.0], &[3.0, 0.0]],
            &["w", "x", "y", "z"],
        );
        let ranked = corpus.search_similar(&[1.0, 0.0], 2).unwrap();
        let indices: Vec<usize> = ranked.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![1, 2]);

        let ranked = corpus.search_similar(&[1.0, 0.0], 4).unwrap();
        let indices: Vec<usize> = ranked.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_empty_corpus() {
        let corpus = CorpusStore::from_parts(Vec::new(), Vec::new()).unwrap();
        assert!(corpus.is_empty());
        assert_eq!(corpus.dimension(), 0);
        for k in [1, 5, 100] {
            assert!(corpus.search_similar(&[1.0, 0.0, 0.0], k).unwrap().is_empty());
        }
    }

    #[test]
    fn test_search_rejects_bad_queries() {
        let corpus = store(&[&[1.0, 0.0]], &["A"]);
        assert!(matches!(corpus.search_similar(&[1.0, 0.0], 0), Err(RagError::InvalidTopK)));
        assert!(matches!(
            corpus.search_similar(&[1.0, 0.0, 0.0], 1),
            Err(RagError::DimensionMismatch { expected: 2, got: 3 })
        ));
        assert!(matches!(
            corpus.search_similar(&[0.0, 0.0], 1),
            Err(RagError::DegenerateQuery)
        ));
    }

    #[test]
    fn test_tiny_and_huge_components_score_correctly() {
        let corpus = store(&[&[1e-25, 0.0], &[1.0, 1.0], &[1e20, 0.0]], &["tiny", "diag", "huge"]);

        let ranked = corpus.search_similar(&[1.0, 0.0], 3).unwrap();
        let texts: Vec<&str> = ranked.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["tiny", "huge", "diag"]);
        assert!((ranked[0].score - 1.0).abs() < EPS);
        assert!((ranked[1].score - 1.0).abs() < EPS);

        let ranked = corpus.search_similar(&[0.0, 3e-30], 1).unwrap();
        assert_eq!(ranked[0].text, "diag");
        assert!((ranked[0].score - std::f32::consts::FRAC_1_SQRT_2).abs() < EPS);

        assert!((cosine_similarity(&[1e-25, 0.0], &[1e20, 0.0]).unwrap() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_from_parts_validation() {
        let mismatch = CorpusStore::from_parts(vec![vec![1.0]], vec![]);
        assert!(matches!(
            mismatch,
            Err(RagError::LengthMismatch { embeddings: 1, chunks: 0 })
        ));

        let ragged = CorpusStore::from_parts(
            vec![vec![1.0, 0.0], vec![1.0]],
            vec!["a".into(), "b".into()],
        );
        assert!(matches!(
            ragged,
            Err(RagError::RaggedEmbeddings { row: 1, expected: 2, got: 1 })
        ));

        let zero = CorpusStore::from_parts(
            vec![vec![1.0, 0.0], vec![0.0, 0.0]],
            vec!["a".into(), "b".into()],
        );
        assert!(matches!(zero, Err(RagError::ZeroNormEmbedding { row: 1 })));
    }

    #[test]
    fn test_load_wrapped_matches_bare() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let embeddings = dir.path().join("embeddings.json");
        let bare = dir.path().join("bare.json");
        let wrapped = dir.path().join("wrapped.json");
        fs::write(&embeddings, "[[1, 0], [0, 1], [1, 1]]")?;
        fs::write(&bare, r#"["A", {"text": "B", "page": 4}, {"title": "no text"}]"#)?;
        fs::write(
            &wrapped,
            r#"{"source": "java.pdf", "chunks": ["A", {"text": "B", "page": 4}, {"title": "no text"}]}"#,
        )?;

        let from_bare = CorpusStore::load(&embeddings, &bare)?;
        let from_wrapped = CorpusStore::load(&embeddings, &wrapped)?;

        assert_eq!(from_bare.len(), 3);
        assert_eq!(from_bare.dimension(), 2);
        for i in 0..3 {
            assert_eq!(from_bare.chunk(i), from_wrapped.chunk(i));
        }
        assert_eq!(from_bare.chunk(0), Some("A"));
        assert_eq!(from_bare.chunk(1), Some("B"));
        assert_eq!(from_bare.chunk(2), Some(""));
        Ok(())
    }

    #[test]
    fn test_load_rejects_malformed_artifacts() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let embeddings = dir.path().join("embeddings.json");
        let chunks = dir.path().join("chunks.json");

        fs::write(&embeddings, r#"[[1, 0], ["x", 1]]"#)?;
        fs::write(&chunks, r#"["A", "B"]"#)?;
        assert!(matches!(
            CorpusStore::load(&embeddings, &chunks),
            Err(RagError::Parse { .. })
        ));

        fs::write(&embeddings, "[[1, 0], [0, 1]]")?;
        fs::write(&chunks, r#"{"documents": ["A", "B"]}"#)?;
        assert!(matches!(
            CorpusStore::load(&embeddings, &chunks),
            Err(RagError::Parse { .. })
        ));

        fs::write(&chunks, r#"["A", {"text": 5}]"#)?;
        let err = CorpusStore::load(&embeddings, &chunks).unwrap_err();
        assert!(matches!(err, RagError::InvalidChunk { index: 1, .. }));
        assert!(err.to_string().contains("chunk 1"));

        fs::write(&chunks, r#"["A", "B", "C"]"#)?;
        assert!(matches!(
            CorpusStore::load(&embeddings, &chunks),
            Err(RagError::LengthMismatch { embeddings: 2, chunks: 3 })
        ));
        Ok(())
    }
}
