//! Deterministic stand-ins for the model-backed collaborators.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;

use crate::embed::{Embedder, Embedding};
use crate::generate::Generator;
use crate::{Error, Result};

/// Bag-of-words embedder: each lowercase token is hashed into a bucket and the
/// vector is L2-normalized. Blank text yields a zero-width vector, the same
/// shape failure a real model produces for empty input.
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimension: 64 }
    }
}

impl HashEmbedder {
    fn embed(&self, text: &str) -> Embedding {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut v = vec![0.0f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            v[(hasher.finish() % self.dimension as u64) as usize] += 1.0;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter_mut().for_each(|x| *x /= norm);
        v
    }
}

impl Embedder for HashEmbedder {
    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn embed_query(&mut self, text: &str) -> Result<Embedding> {
        Ok(self.embed(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hash-bow"
    }
}

/// Embedder with hand-picked vectors per exact text.
pub struct FixedEmbedder {
    vectors: HashMap<String, Embedding>,
    dimension: usize,
}

impl FixedEmbedder {
    pub fn new(vectors: Vec<(&str, Embedding)>, dimension: usize) -> Self {
        Self {
            vectors: vectors
                .into_iter()
                .map(|(text, v)| (text.to_string(), v))
                .collect(),
            dimension,
        }
    }

    fn lookup(&self, text: &str) -> Result<Embedding> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| Error::Embedding(format!("no vector for {text:?}")))
    }
}

impl Embedder for FixedEmbedder {
    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.lookup(t)).collect()
    }

    fn embed_query(&mut self, text: &str) -> Result<Embedding> {
        self.lookup(text)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

/// Generator that records prompts and answers through a closure.
pub struct ScriptedGenerator<F> {
    respond: F,
    pub prompts: Vec<String>,
}

impl<F> ScriptedGenerator<F>
where
    F: FnMut(&str) -> Result<String> + Send,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            prompts: Vec::new(),
        }
    }
}

#[async_trait]
impl<F> Generator for ScriptedGenerator<F>
where
    F: FnMut(&str) -> Result<String> + Send,
{
    async fn generate(&mut self, prompt: &str) -> Result<String> {
        self.prompts.push(prompt.to_string());
        (self.respond)(prompt)
    }
}

/// Pull the context back out of a prompt built by [`crate::generate::build_prompt`].
pub fn prompt_context(prompt: &str) -> &str {
    prompt
        .strip_prefix("Context: ")
        .and_then(|rest| rest.split("\n\nQuestion: ").next())
        .unwrap_or("")
}
