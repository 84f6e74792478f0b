use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::embed::{validate_batch, Embedder, Embedding};
use crate::{Error, Result};

const DIMENSION: usize = 384;

/// MiniLM sentence-transformers embedder.
///
/// Uses fastembed for ONNX-based inference. Small and fast enough to re-embed
/// a few hundred contexts per experiment batch on a CPU.
pub struct MiniLmEmbedder {
    model: TextEmbedding,
    name: &'static str,
}

/// Supported checkpoints by short and full name. All produce 384-dim vectors.
const MODELS: &[(&str, &str, EmbeddingModel)] = &[
    ("all-MiniLM-L6-v2", "sentence-transformers/all-MiniLM-L6-v2", EmbeddingModel::AllMiniLML6V2),
    ("all-MiniLM-L12-v2", "sentence-transformers/all-MiniLM-L12-v2", EmbeddingModel::AllMiniLML12V2),
];

/// Default checkpoint name.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

impl MiniLmEmbedder {
    /// Create the default all-MiniLM-L6-v2 embedder.
    ///
    /// Downloads the model on first use (~90MB).
    pub fn new() -> Result<Self> {
        Self::with_model(DEFAULT_EMBEDDING_MODEL)
    }

    /// Create an embedder for a checkpoint given by short or full name.
    pub fn with_model(name: &str) -> Result<Self> {
        let &(_, full_name, ref model) = MODELS
            .iter()
            .find(|(short, full, _)| name.eq_ignore_ascii_case(short) || name.eq_ignore_ascii_case(full))
            .ok_or_else(|| Error::Config(format!("unsupported embedding model: {name}")))?;

        let opts = InitOptions::new(model.clone()).with_show_download_progress(true);

        TextEmbedding::try_new(opts)
            .map(|model| Self { model, name: full_name })
            .map_err(|e| Error::Embedding(e.to_string()))
    }
}

impl Embedder for MiniLmEmbedder {
    fn model_name(&self) -> &str {
        self.name
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let embeddings = self
            .model
            .embed(texts, None)
            .map_err(|e| Error::Embedding(e.to_string()))?;

        validate_batch(&embeddings, texts.len(), DIMENSION)?;
        Ok(embeddings)
    }

    fn embed_query(&mut self, text: &str) -> Result<Embedding> {
        let embedding = self
            .model
            .embed(vec![text], None)
            .map_err(|e| Error::Embedding(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("model returned no embeddings".to_string()))?;

        validate_batch(std::slice::from_ref(&embedding), 1, DIMENSION)?;
        Ok(embedding)
    }
}
