// rust-cv/hnsw index over squared Euclidean distance

use std::collections::HashSet;

use hnsw::{Hnsw, Searcher};
use rand::rngs::StdRng;
use space::{Metric, Neighbor};

use crate::embed::{validate_batch, Embedder};
use crate::retrieval::{top_k, RankingBackend, Ranked, RetrievalMethod};
use crate::Result;

/// Minimum ef_search parameter for HNSW queries.
///
/// The effective value is max(k * 2, MIN_EF_SEARCH) so small `k` still
/// explores enough of the graph to find the true nearest neighbours.
const MIN_EF_SEARCH: usize = 50;

/// Slot value the searcher leaves in unfilled neighbour entries.
const NO_MATCH: usize = !0;

/// Squared Euclidean distance.
///
/// hnsw needs an unsigned, totally ordered distance. For non-negative finite
/// floats the IEEE-754 bit pattern orders the same way as the value, so the
/// raw bits serve as the distance unit without any scaling loss.
struct SquaredEuclidean;

impl Metric<Box<[f32]>> for SquaredEuclidean {
    type Unit = u32;

    fn distance(&self, a: &Box<[f32]>, b: &Box<[f32]>) -> u32 {
        let a: &[f32] = a;
        let b: &[f32] = b;

        let sum: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
        sum.to_bits()
    }
}

type Index = Hnsw<SquaredEuclidean, Box<[f32]>, StdRng, 16, 32>;

/// Approximate dense retrieval.
///
/// Document embeddings are inserted into an HNSW graph once at build time. Each
/// query is a k-nearest search; scores are negated squared distances so that,
/// as with every backend, higher is better.
///
/// The graph search can only hand back nodes it reaches from the entry point,
/// which is not always the whole collection. Queries asking for more than half
/// the collection are therefore ranked exactly over the stored vectors, and a
/// graph search that comes back short is topped up the same way.
pub struct IndexedDense<E: Embedder> {
    embedder: E,
    index: Index,
    searcher: Searcher<u32>,
    vectors: Vec<Box<[f32]>>,
}

impl<E: Embedder> IndexedDense<E> {
    #[must_use]
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            index: Hnsw::new(SquaredEuclidean),
            searcher: Searcher::default(),
            vectors: Vec::new(),
        }
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Exact ranking of every stored vector not already in `found`.
    fn exact_rest(&self, query: &Box<[f32]>, found: &[Ranked]) -> impl Iterator<Item = Ranked> {
        let taken: HashSet<usize> = found.iter().map(|r| r.position).collect();
        self.vectors
            .iter()
            .enumerate()
            .filter(move |(position, _)| !taken.contains(position))
            .map(|(position, vector)| Ranked {
                position,
                score: -f32::from_bits(SquaredEuclidean.distance(query, vector)),
            })
    }

    fn graph_search(&mut self, query: &Box<[f32]>, k: usize) -> Vec<Ranked> {
        let mut neighbors = vec![
            Neighbor {
                index: NO_MATCH,
                distance: !0
            };
            k
        ];
        let ef_search = std::cmp::max(k * 2, MIN_EF_SEARCH);

        self.index
            .nearest(query, ef_search, &mut self.searcher, &mut neighbors);

        let len = self.vectors.len();
        neighbors
            .into_iter()
            .filter(|n| n.index != NO_MATCH && n.index < len)
            .map(|n| Ranked {
                position: n.index,
                score: -f32::from_bits(n.distance),
            })
            .collect()
    }
}

impl<E: Embedder> RankingBackend for IndexedDense<E> {
    fn method(&self) -> RetrievalMethod {
        RetrievalMethod::DenseIndexed
    }

    fn build(&mut self, documents: &[String]) -> Result<()> {
        let mut index: Index = Hnsw::new(SquaredEuclidean);
        let mut searcher: Searcher<u32> = Searcher::default();
        let mut vectors = Vec::with_capacity(documents.len());

        if !documents.is_empty() {
            let texts: Vec<&str> = documents.iter().map(String::as_str).collect();
            let embeddings = self.embedder.embed_documents(&texts)?;
            validate_batch(&embeddings, texts.len(), self.embedder.dimension())?;

            for embedding in embeddings {
                let vector = embedding.into_boxed_slice();
                index.insert(vector.clone(), &mut searcher);
                vectors.push(vector);
            }
        }

        self.index = index;
        self.searcher = searcher;
        self.vectors = vectors;
        Ok(())
    }

    fn rank(&mut self, query: &str, k: usize) -> Result<Vec<Ranked>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_query(query)?;
        validate_batch(
            std::slice::from_ref(&query_embedding),
            1,
            self.embedder.dimension(),
        )?;
        let query_box = query_embedding.into_boxed_slice();

        let k = k.min(self.len());
        // nearest() panics when handed more slots than the graph search reaches
        let found = if k * 2 <= self.len() {
            self.graph_search(&query_box, k)
        } else {
            Vec::new()
        };

        if found.len() >= k {
            return Ok(found);
        }

        let rest: Vec<Ranked> = self.exact_rest(&query_box, &found).collect();
        Ok(top_k(found.into_iter().chain(rest), k))
    }
}
