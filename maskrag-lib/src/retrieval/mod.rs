//! Document retrieval behind one interface
//!
//! Three interchangeable backends rank an ingested document sequence against a
//! query:
//!
//! - [`ExactDense`]: brute-force cosine similarity over document embeddings
//! - [`IndexedDense`]: HNSW nearest-neighbour search by squared Euclidean distance
//! - [`Bm25`]: sparse lexical ranking over lowercased whitespace tokens
//!
//! Backends only produce positions and scores. [`Retriever`] owns the documents
//! and applies the contract shared by every backend: an empty collection yields
//! nothing, `k` is clamped to the collection size, and positions that do not
//! address an ingested document are dropped before text is resolved.
//!
//! # Usage
//!
//! ```ignore
//! use maskrag_lib::retrieval::{RetrievalMethod, Retriever};
//!
//! let mut retriever = Retriever::for_method(RetrievalMethod::SparseBm25, &mut embedder);
//! retriever.ingest(documents)?;
//! let top = retriever.retrieve("Who founded the company?", 1)?;
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::embed::Embedder;
use crate::{Error, Result};

mod exact;
mod indexed;
mod sparse;

pub use exact::*;
pub use indexed::*;
pub use sparse::*;

/// Which backend a retriever (and a persisted result row) uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
    /// Exact cosine search over every document embedding
    #[serde(alias = "dense_numpy")]
    DenseExact,
    /// BM25 over whitespace tokens
    SparseBm25,
    /// Approximate nearest-neighbour search through an HNSW graph
    #[serde(alias = "dense_faiss")]
    DenseIndexed,
}

impl RetrievalMethod {
    pub const ALL: [RetrievalMethod; 3] = [Self::DenseExact, Self::SparseBm25, Self::DenseIndexed];

    /// Label written to the `retrieval_method` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DenseExact => "dense_exact",
            Self::SparseBm25 => "sparse_bm25",
            Self::DenseIndexed => "dense_indexed",
        }
    }

    pub fn is_dense(&self) -> bool {
        !matches!(self, Self::SparseBm25)
    }
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dense_exact" | "dense_numpy" | "exact" => Ok(Self::DenseExact),
            "sparse_bm25" | "bm25" => Ok(Self::SparseBm25),
            "dense_indexed" | "dense_faiss" | "indexed" | "hnsw" => Ok(Self::DenseIndexed),
            other => Err(Error::InvalidInput(format!("unknown retrieval method: {other}"))),
        }
    }
}

/// A document position with the backend's relevance score (higher is better).
#[derive(Debug, Clone, Copy)]
pub struct Ranked {
    pub position: usize,
    pub score: f32,
}

// Higher score first; equal scores put the lower position first.
impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.position.cmp(&self.position))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Keep the `k` best of `ranked`, best first.
pub(crate) fn top_k(ranked: impl IntoIterator<Item = Ranked>, k: usize) -> Vec<Ranked> {
    let heap: std::collections::BinaryHeap<Ranked> = ranked.into_iter().collect();
    heap.into_sorted_vec().into_iter().rev().take(k).collect()
}

/// Trait for ranking backends
///
/// A backend holds only derived index state. `build` replaces that state
/// wholesale and must leave the previous index untouched when it fails.
pub trait RankingBackend {
    /// The method this backend implements
    fn method(&self) -> RetrievalMethod;

    /// Build the index for a document sequence, discarding any previous one
    fn build(&mut self, documents: &[String]) -> Result<()>;

    /// Rank indexed documents against a query
    ///
    /// Returns at most `k` entries, best first. Callers guarantee
    /// `1 <= k <= documents.len()`.
    fn rank(&mut self, query: &str, k: usize) -> Result<Vec<Ranked>>;
}

/// A retrieved document with its position and score.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit<'a> {
    pub position: usize,
    pub score: f32,
    pub text: &'a str,
}

/// Owns an ingested document sequence and the backend index built from it.
pub struct Retriever<'a> {
    documents: Vec<String>,
    backend: Box<dyn RankingBackend + 'a>,
}

impl<'a> Retriever<'a> {
    /// Wrap a backend. Nothing is indexed until [`ingest`](Self::ingest).
    pub fn new(backend: impl RankingBackend + 'a) -> Self {
        Self {
            documents: Vec::new(),
            backend: Box::new(backend),
        }
    }

    /// Construct the backend for `method`. Sparse retrieval ignores the embedder.
    pub fn for_method<E: Embedder + 'a>(method: RetrievalMethod, embedder: E) -> Self {
        match method {
            RetrievalMethod::DenseExact => Self::new(ExactDense::new(embedder)),
            RetrievalMethod::DenseIndexed => Self::new(IndexedDense::new(embedder)),
            RetrievalMethod::SparseBm25 => Self::new(Bm25::default()),
        }
    }

    pub fn method(&self) -> RetrievalMethod {
        self.backend.method()
    }

    /// Replace the document sequence and rebuild the index from it.
    ///
    /// On failure the previous documents and index stay in place together.
    #[instrument(skip_all, fields(method = %self.backend.method(), documents = documents.len()))]
    pub fn ingest(&mut self, documents: Vec<String>) -> Result<()> {
        self.backend.build(&documents)?;
        self.documents = documents;
        Ok(())
    }

    /// Top-`k` documents for `query`, best first.
    pub fn retrieve(&mut self, query: &str, k: usize) -> Result<Vec<&str>> {
        Ok(self
            .retrieve_scored(query, k)?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve) but keeps positions and scores.
    pub fn retrieve_scored(&mut self, query: &str, k: usize) -> Result<Vec<Hit<'_>>> {
        if self.documents.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let k = k.min(self.documents.len());

        let ranked = self.backend.rank(query, k)?;
        let documents = &self.documents;

        Ok(ranked
            .into_iter()
            .filter_map(|r| {
                documents.get(r.position).map(|text| Hit {
                    position: r.position,
                    score: r.score,
                    text: text.as_str(),
                })
            })
            .take(k)
            .collect())
    }

    /// Returns the number of ingested documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if no documents are ingested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::HashEmbedder;

    fn corpus() -> Vec<String> {
        vec![
            "paris is the capital of france".to_string(),
            "rome is the capital of italy".to_string(),
            "the danube flows through vienna".to_string(),
        ]
    }

    /// Backend that reports positions the retriever must never resolve.
    struct RogueBackend;

    impl RankingBackend for RogueBackend {
        fn method(&self) -> RetrievalMethod {
            RetrievalMethod::DenseIndexed
        }

        fn build(&mut self, _documents: &[String]) -> Result<()> {
            Ok(())
        }

        fn rank(&mut self, _query: &str, _k: usize) -> Result<Vec<Ranked>> {
            Ok(vec![
                Ranked { position: usize::MAX, score: 9.0 },
                Ranked { position: 7, score: 8.0 },
                Ranked { position: 1, score: 0.5 },
            ])
        }
    }

    #[test]
    fn test_method_labels_round_trip() {
        for method in RetrievalMethod::ALL {
            assert_eq!(method.as_str().parse::<RetrievalMethod>().unwrap(), method);
        }
        assert_eq!("dense_numpy".parse::<RetrievalMethod>().unwrap(), RetrievalMethod::DenseExact);
        assert_eq!("dense_faiss".parse::<RetrievalMethod>().unwrap(), RetrievalMethod::DenseIndexed);
        assert!("tfidf".parse::<RetrievalMethod>().is_err());
    }

    #[test]
    fn test_ranked_ordering() {
        let ranked = vec![
            Ranked { position: 2, score: 0.5 },
            Ranked { position: 0, score: 0.9 },
            Ranked { position: 1, score: 0.5 },
        ];
        let top = top_k(ranked, 3);
        let positions: Vec<_> = top.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_out_of_range_positions_are_dropped() {
        let mut retriever = Retriever::new(RogueBackend);
        retriever.ingest(corpus()).unwrap();

        let hits = retriever.retrieve_scored("anything", 3).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position, 1);
        assert_eq!(hits[0].text, "rome is the capital of italy");
    }

    #[test]
    fn test_k_larger_than_collection_returns_all_for_every_backend() {
        let mut embedder = HashEmbedder::default();
        for method in RetrievalMethod::ALL {
            let mut retriever = Retriever::for_method(method, &mut embedder);
            retriever.ingest(corpus()).unwrap();

            let docs = retriever.retrieve("capital", 10).unwrap();
            assert_eq!(docs.len(), 3, "{method} should return every document");

            let mut sorted = docs.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(sorted.len(), 3, "{method} returned duplicates");
        }
    }

    #[test]
    fn test_k_at_collection_size_on_large_corpus_for_every_backend() {
        let docs: Vec<String> = (0..120)
            .map(|i| format!("document {i} about topic{} and theme{}", i % 7, i % 11))
            .collect();
        let mut embedder = HashEmbedder::default();

        for method in RetrievalMethod::ALL {
            let mut retriever = Retriever::for_method(method, &mut embedder);
            retriever.ingest(docs.clone()).unwrap();

            for k in [120, 150] {
                let hits = retriever.retrieve_scored("topic3 theme5", k).unwrap();
                assert_eq!(hits.len(), 120, "{method} k={k}");

                let mut positions: Vec<_> = hits.iter().map(|h| h.position).collect();
                positions.sort_unstable();
                positions.dedup();
                assert_eq!(positions.len(), 120, "{method} returned duplicates");
            }
        }
    }

    #[test]
    fn test_empty_collection_returns_empty_for_every_backend() {
        let mut embedder = HashEmbedder::default();
        for method in RetrievalMethod::ALL {
            let mut retriever = Retriever::for_method(method, &mut embedder);
            retriever.ingest(Vec::new()).unwrap();
            assert!(retriever.is_empty());

            for k in [0, 1, 5] {
                assert!(retriever.retrieve("capital of france", k).unwrap().is_empty());
            }
        }
    }

    #[test]
    fn test_k_zero_returns_empty() {
        let mut embedder = HashEmbedder::default();
        for method in RetrievalMethod::ALL {
            let mut retriever = Retriever::for_method(method, &mut embedder);
            retriever.ingest(corpus()).unwrap();
            assert!(retriever.retrieve("paris", 0).unwrap().is_empty());
        }
    }

    #[test]
    fn test_every_backend_finds_the_obvious_match() {
        let mut embedder = HashEmbedder::default();
        for method in RetrievalMethod::ALL {
            let mut retriever = Retriever::for_method(method, &mut embedder);
            retriever.ingest(corpus()).unwrap();

            let top = retriever.retrieve("danube vienna", 1).unwrap();
            assert_eq!(top, vec!["the danube flows through vienna"], "{method}");
        }
    }

    #[test]
    fn test_reingest_replaces_documents() {
        let mut embedder = HashEmbedder::default();
        for method in RetrievalMethod::ALL {
            let mut retriever = Retriever::for_method(method, &mut embedder);
            retriever.ingest(corpus()).unwrap();
            retriever
                .ingest(vec!["berlin is the capital of germany".to_string()])
                .unwrap();

            assert_eq!(retriever.len(), 1);
            let docs = retriever.retrieve("capital", 5).unwrap();
            assert_eq!(docs, vec!["berlin is the capital of germany"], "{method}");
        }
    }

    #[test]
    fn test_failed_ingest_keeps_previous_index() {
        let mut embedder = HashEmbedder::default();
        for method in [RetrievalMethod::DenseExact, RetrievalMethod::DenseIndexed] {
            let mut retriever = Retriever::for_method(method, &mut embedder);
            retriever.ingest(corpus()).unwrap();

            // blank text makes the embedder return a zero-width vector
            let err = retriever
                .ingest(vec!["fine".to_string(), "   ".to_string()])
                .unwrap_err();
            assert!(matches!(err, Error::Embedding(_)), "{method}");

            assert_eq!(retriever.len(), 3);
            assert_eq!(retriever.retrieve("danube", 1).unwrap().len(), 1);
        }
    }
}
