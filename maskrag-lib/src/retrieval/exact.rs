use crate::embed::{validate_batch, Embedder, Embedding};
use crate::retrieval::{top_k, RankingBackend, Ranked, RetrievalMethod};
use crate::Result;

/// Exact dense retrieval.
///
/// Keeps every document embedding and scores all of them by cosine similarity
/// on each query. Linear in the collection size, which is fine for the few
/// hundred contexts an experiment batch ingests.
pub struct ExactDense<E: Embedder> {
    embedder: E,
    embeddings: Vec<Embedding>,
}

impl<E: Embedder> ExactDense<E> {
    #[must_use]
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            embeddings: Vec::new(),
        }
    }
}

impl<E: Embedder> RankingBackend for ExactDense<E> {
    fn method(&self) -> RetrievalMethod {
        RetrievalMethod::DenseExact
    }

    fn build(&mut self, documents: &[String]) -> Result<()> {
        if documents.is_empty() {
            self.embeddings.clear();
            return Ok(());
        }

        let texts: Vec<&str> = documents.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed_documents(&texts)?;
        validate_batch(&embeddings, texts.len(), self.embedder.dimension())?;

        self.embeddings = embeddings;
        Ok(())
    }

    fn rank(&mut self, query: &str, k: usize) -> Result<Vec<Ranked>> {
        if self.embeddings.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_query(query)?;
        validate_batch(
            std::slice::from_ref(&query_embedding),
            1,
            self.embedder.dimension(),
        )?;

        let scored = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(position, embedding)| Ranked {
                position,
                score: cosine_similarity(&query_embedding, embedding),
            });

        Ok(top_k(scored, k))
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 means identical direction; 0 when either
/// vector has zero length.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
