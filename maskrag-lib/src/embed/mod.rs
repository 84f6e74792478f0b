//! Text embedding for the dense retrieval backends
//!
//! Uses sentence-transformers/all-MiniLM-L6-v2 via the fastembed crate (ONNX runtime).
//!
//! # Model Details
//!
//! - Dimensions: 384
//! - Max tokens: 256
//!
//! Documents and queries go through the same encoder; MiniLM has no query prompt.
//!
//! # Usage
//!
//! ```ignore
//! use maskrag_lib::embed::{Embedder, MiniLmEmbedder};
//!
//! let mut embedder = MiniLmEmbedder::new()?;
//!
//! let doc_embeddings = embedder.embed_documents(&["Paris is the capital.", "Rome is old."])?;
//! let query_embedding = embedder.embed_query("What is the capital?")?;
//! ```

use crate::{Error, Result};

/// A vector embedding - fixed size array of floats
pub type Embedding = Vec<f32>;

/// Trait for text embedding models
pub trait Embedder: Send + Sync {
    /// Embed multiple documents for indexing
    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Embed a single query for searching
    fn embed_query(&mut self, text: &str) -> Result<Embedding>;

    /// Returns the embedding dimension
    fn dimension(&self) -> usize;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

// Lets a single loaded model back many short-lived retrievers.
impl<E: Embedder + ?Sized> Embedder for &mut E {
    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        (**self).embed_documents(texts)
    }

    fn embed_query(&mut self, text: &str) -> Result<Embedding> {
        (**self).embed_query(text)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Check that an embedding batch has one vector per input, each of the expected width.
///
/// A short or ragged batch would leave the index silently out of step with the
/// document sequence, so it is rejected outright.
pub fn validate_batch(embeddings: &[Embedding], expected_len: usize, dimension: usize) -> Result<()> {
    if embeddings.len() != expected_len {
        return Err(Error::Embedding(format!(
            "expected {expected_len} embeddings, model returned {}",
            embeddings.len()
        )));
    }

    if let Some((i, bad)) = embeddings
        .iter()
        .enumerate()
        .find(|(_, e)| e.len() != dimension)
    {
        return Err(Error::Embedding(format!(
            "embedding {i} has dimension {}, expected {dimension}",
            bad.len()
        )));
    }

    Ok(())
}

mod minilm;
pub use minilm::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_batch_accepts_matching() {
        let batch = vec![vec![0.0; 3], vec![1.0; 3]];
        assert!(validate_batch(&batch, 2, 3).is_ok());
    }

    #[test]
    fn test_validate_batch_rejects_count_mismatch() {
        let batch = vec![vec![0.0; 3]];
        let err = validate_batch(&batch, 2, 3).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[test]
    fn test_validate_batch_rejects_dimension_mismatch() {
        let batch = vec![vec![0.0; 3], vec![0.0; 2]];
        let err = validate_batch(&batch, 2, 3).unwrap_err();
        assert!(err.to_string().contains("embedding 1"));
    }
}
