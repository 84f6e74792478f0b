//! Experiment runner
//!
//! One batch = one anonymized document collection × one retrieval method. The
//! runner indexes the documents once, then answers every question in order:
//!
//! ```text
//! question -> Retriever (top-k) -> first document -> prompt -> Generator -> ResultRow
//! ```
//!
//! Every question produces exactly one row, in input order, even when
//! retrieval comes back empty (the context is then the empty string).

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::anonymize::Strategy;
use crate::embed::Embedder;
use crate::generate::{build_prompt, Generator};
use crate::retrieval::{RetrievalMethod, Retriever};
use crate::Result;

mod plan;
mod store;

pub use plan::*;
pub use store::*;

/// Outcome of one query, as persisted to the results CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub anonymization_strategy: Strategy,
    pub retrieval_method: RetrievalMethod,
    pub question: String,
    pub ground_truth: String,
    /// Leading characters of the retrieved context
    pub retrieved_context_snippet: String,
    #[serde(rename = "model_answer")]
    pub predicted_answer: String,
}

/// Per-batch retrieval and reporting knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Documents retrieved per query; only the first is used as context
    pub top_k: usize,
    /// Characters of context kept in the result row
    pub snippet_chars: usize,
    /// Log progress every this many queries, 0 disables it
    pub progress_every: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            top_k: 1,
            snippet_chars: 200,
            progress_every: 50,
        }
    }
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Runs experiment batches with one embedder and one generator.
///
/// The embedder is loaded once and lent to a fresh retriever per batch, so no
/// index ever outlives the document collection it was built from.
pub struct ExperimentRunner<E: Embedder, G: Generator> {
    embedder: E,
    generator: G,
    settings: RunSettings,
}

impl<E: Embedder, G: Generator> ExperimentRunner<E, G> {
    #[must_use]
    pub fn new(embedder: E, generator: G, settings: RunSettings) -> Self {
        Self {
            embedder,
            generator,
            settings,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Run one batch and return its rows.
    ///
    /// `questions` and `ground_truths` are paired by position; if their lengths
    /// differ the extra entries of the longer one are ignored. Any retrieval or
    /// generation error aborts the batch and no rows are returned.
    pub async fn run_batch(
        &mut self,
        documents: &[String],
        questions: &[String],
        ground_truths: &[String],
        strategy: Strategy,
        method: RetrievalMethod,
    ) -> Result<Vec<ResultRow>> {
        info!(strategy = %strategy, method = %method, "running experiment batch");

        if questions.len() != ground_truths.len() {
            warn!(
                questions = questions.len(),
                ground_truths = ground_truths.len(),
                "question/ground truth count mismatch, extra entries ignored"
            );
        }
        let total = questions.len().min(ground_truths.len());
        let started = Instant::now();

        let mut retriever = Retriever::for_method(method, &mut self.embedder);
        retriever.ingest(documents.to_vec())?;

        let mut rows = Vec::with_capacity(total);
        for (i, (question, truth)) in questions.iter().zip(ground_truths).enumerate() {
            let context = retriever
                .retrieve(question, self.settings.top_k)?
                .first()
                .map(|doc| doc.to_string())
                .unwrap_or_default();

            let answer = self
                .generator
                .generate(&build_prompt(&context, question))
                .await?;
            debug!(query = i, answer = %answer, "generated answer");

            rows.push(ResultRow {
                anonymization_strategy: strategy,
                retrieval_method: method,
                question: question.clone(),
                ground_truth: truth.clone(),
                retrieved_context_snippet: truncate_chars(&context, self.settings.snippet_chars),
                predicted_answer: answer,
            });

            let every = self.settings.progress_every;
            if every > 0 && (i + 1) % every == 0 {
                info!("processed {}/{} queries", i + 1, total);
            }
        }

        info!(
            rows = rows.len(),
            elapsed = ?started.elapsed(),
            "batch finished"
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{prompt_context, HashEmbedder, ScriptedGenerator};
    use crate::Error;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 5), "");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[tokio::test]
    async fn test_rows_follow_question_order() {
        let generator = ScriptedGenerator::new(|prompt: &str| {
            Ok(prompt_context(prompt).split_whitespace().next().unwrap_or("").to_string())
        });
        let mut runner =
            ExperimentRunner::new(HashEmbedder::default(), generator, RunSettings::default());

        let docs = strings(&["paris is in france", "rome is in italy", "vienna is in austria"]);
        let questions = strings(&["where is rome", "where is vienna", "where is paris"]);
        let truths = strings(&["italy", "austria", "france"]);

        for method in RetrievalMethod::ALL {
            let rows = runner
                .run_batch(&docs, &questions, &truths, Strategy::Baseline, method)
                .await
                .unwrap();

            assert_eq!(rows.len(), 3);
            for (row, (q, t)) in rows.iter().zip(questions.iter().zip(&truths)) {
                assert_eq!(&row.question, q);
                assert_eq!(&row.ground_truth, t);
                assert_eq!(row.retrieval_method, method);
                assert_eq!(row.anonymization_strategy, Strategy::Baseline);
            }
        }
    }

    #[tokio::test]
    async fn test_prompt_uses_full_context_and_snippet_is_truncated() {
        let long_doc = format!("needle {}", "x".repeat(500));
        let generator = ScriptedGenerator::new(|_: &str| Ok("answer".to_string()));
        let mut runner = ExperimentRunner::new(
            HashEmbedder::default(),
            generator,
            RunSettings { snippet_chars: 20, ..RunSettings::default() },
        );

        let rows = runner
            .run_batch(
                &[long_doc.clone()],
                &strings(&["needle?"]),
                &strings(&["needle"]),
                Strategy::Placeholder,
                RetrievalMethod::SparseBm25,
            )
            .await
            .unwrap();

        assert_eq!(rows[0].retrieved_context_snippet.chars().count(), 20);
        assert!(long_doc.starts_with(&rows[0].retrieved_context_snippet));
        assert_eq!(rows[0].predicted_answer, "answer");
        assert_eq!(prompt_context(&runner.generator().prompts[0]), long_doc);
    }

    #[tokio::test]
    async fn test_empty_collection_still_yields_one_row_per_question() {
        let generator = ScriptedGenerator::new(|_: &str| Ok("unknown".to_string()));
        let mut runner =
            ExperimentRunner::new(HashEmbedder::default(), generator, RunSettings::default());

        let rows = runner
            .run_batch(
                &[],
                &strings(&["who?", "where?"]),
                &strings(&["a", "b"]),
                Strategy::Faker,
                RetrievalMethod::DenseExact,
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.retrieved_context_snippet.is_empty()));
        assert!(runner
            .generator()
            .prompts
            .iter()
            .all(|p| p.starts_with("Context: \n\nQuestion: ")));
    }

    #[tokio::test]
    async fn test_count_mismatch_uses_shorter() {
        let generator = ScriptedGenerator::new(|_: &str| Ok(String::new()));
        let mut runner =
            ExperimentRunner::new(HashEmbedder::default(), generator, RunSettings::default());

        let rows = runner
            .run_batch(
                &strings(&["doc"]),
                &strings(&["q1", "q2", "q3"]),
                &strings(&["t1"]),
                Strategy::Baseline,
                RetrievalMethod::SparseBm25,
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_aborts_batch() {
        let mut calls = 0;
        let generator = ScriptedGenerator::new(move |_: &str| {
            calls += 1;
            if calls == 2 {
                Err(Error::Generation("server went away".to_string()))
            } else {
                Ok("ok".to_string())
            }
        });
        let mut runner =
            ExperimentRunner::new(HashEmbedder::default(), generator, RunSettings::default());

        let result = runner
            .run_batch(
                &strings(&["doc one", "doc two"]),
                &strings(&["q1", "q2", "q3"]),
                &strings(&["t1", "t2", "t3"]),
                Strategy::Baseline,
                RetrievalMethod::SparseBm25,
            )
            .await;
        assert!(matches!(result, Err(Error::Generation(_))));
    }

    #[tokio::test]
    async fn test_ingest_failure_aborts_batch() {
        let generator = ScriptedGenerator::new(|_: &str| Ok("ok".to_string()));
        let mut runner =
            ExperimentRunner::new(HashEmbedder::default(), generator, RunSettings::default());

        let result = runner
            .run_batch(
                &strings(&["fine", ""]),
                &strings(&["q"]),
                &strings(&["t"]),
                Strategy::Baseline,
                RetrievalMethod::DenseIndexed,
            )
            .await;
        assert!(matches!(result, Err(Error::Embedding(_))));
        assert!(runner.generator().prompts.is_empty());
    }
}
