//! BM25 sparse retrieval on the `bm25` crate.
//!
//! BM25 scores documents based on:
//! - **Term Frequency (TF)**: how often query terms appear in the document
//! - **Inverse Document Frequency (IDF)**: rarity of terms across the corpus
//! - **Document Length**: normalized against the average to avoid favouring long documents
//!
//! Tokenization is deliberately plain: lowercase, then split on whitespace.
//! Punctuation stays attached to its token, so `paris.` and `paris` are
//! different terms. Documents and queries go through the same tokenizer.
//!
//! The engine only reports documents sharing a term with the query. Every
//! other document follows with score 0, so a query always ranks the whole
//! collection.

use bm25::{Document, SearchEngine, SearchEngineBuilder, Tokenizer};

use crate::retrieval::{top_k, RankingBackend, Ranked, RetrievalMethod};
use crate::Result;

/// Term frequency saturation
pub const BM25_K1: f32 = 1.5;
/// Length normalization strength
pub const BM25_B: f32 = 0.75;

/// Lowercase and split on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// [`tokenize`] as a `bm25` tokenizer, replacing the crate's stemming and
/// stop-word removal.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, input_text: &str) -> Vec<String> {
        tokenize(input_text)
    }
}

/// Sparse lexical backend.
#[derive(Default)]
pub struct Bm25 {
    /// None until a non-empty corpus is built
    engine: Option<SearchEngine<usize, u32, WhitespaceTokenizer>>,
    len: usize,
}

impl Bm25 {
    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl RankingBackend for Bm25 {
    fn method(&self) -> RetrievalMethod {
        RetrievalMethod::SparseBm25
    }

    fn build(&mut self, documents: &[String]) -> Result<()> {
        if documents.is_empty() {
            self.engine = None;
            self.len = 0;
            return Ok(());
        }

        let corpus = documents.iter().enumerate().map(|(id, text)| Document {
            id,
            contents: text.clone(),
        });

        let engine = SearchEngineBuilder::<usize, u32, WhitespaceTokenizer>::with_tokenizer_and_documents(
            WhitespaceTokenizer,
            corpus,
        )
        .k1(BM25_K1)
        .b(BM25_B)
        .build();

        self.engine = Some(engine);
        self.len = documents.len();
        Ok(())
    }

    fn rank(&mut self, query: &str, k: usize) -> Result<Vec<Ranked>> {
        let Some(engine) = &self.engine else {
            return Ok(Vec::new());
        };

        let mut scores = vec![0.0f32; self.len];
        for hit in engine.search(query, self.len) {
            if let Some(score) = scores.get_mut(hit.document.id) {
                *score = hit.score;
            }
        }

        let ranked = scores
            .into_iter()
            .enumerate()
            .map(|(position, score)| Ranked { position, score });

        Ok(top_k(ranked, k))
    }
}
