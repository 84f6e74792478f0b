//! Answer generation
//!
//! The generator is an external text-to-text model reached over HTTP. The
//! harness only depends on the prompt contract below: the retrieved context
//! and the question are embedded in a fixed template and the model's reply is
//! taken verbatim (trimmed) as the predicted answer.

use async_trait::async_trait;

use crate::Result;

mod ollama;
pub use ollama::*;

/// Build the prompt sent for every query.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!("Context: {context}\n\nQuestion: {question}\n\nAnswer:")
}

/// Trait for answer generators
///
/// Calls may be slow. No retries happen here; a failure aborts the batch that
/// issued it.
#[async_trait]
pub trait Generator: Send {
    /// Generate an answer for a fully built prompt
    async fn generate(&mut self, prompt: &str) -> Result<String>;
}
