//! maskrag - measuring what PII anonymization does to retrieval-augmented QA
//!
//! # Architecture
//!
//! ```text
//! SQuAD samples -> Anonymizer -> documents
//!                                    |
//!                                    v
//! question -> Retriever (exact | bm25 | hnsw) -> context -> Generator -> ResultRow -> CSV
//!                                                                                    |
//!                                              summary table <- Metrics <- filter <--+
//! ```
//!
//! # Example
//!
//! ```ignore
//! use maskrag_lib::{
//!     embed::MiniLmEmbedder,
//!     generate::{GeneratorConfig, OllamaGenerator},
//!     experiment::{ExperimentRunner, RunSettings},
//!     anonymize::Strategy,
//!     retrieval::RetrievalMethod,
//! };
//!
//! let embedder = MiniLmEmbedder::new()?;
//! let generator = OllamaGenerator::new(GeneratorConfig::default())?;
//! let mut runner = ExperimentRunner::new(embedder, generator, RunSettings::default());
//!
//! let rows = runner
//!     .run_batch(&documents, &questions, &answers, Strategy::Baseline, RetrievalMethod::SparseBm25)
//!     .await?;
//! let scores = maskrag_lib::metrics::compute_metrics(&eval_rows);
//! ```

pub mod anonymize;
pub mod config;
pub mod dataset;
pub mod embed;
pub mod error;
pub mod experiment;
pub mod filter;
pub mod generate;
pub mod metrics;
pub mod normalize;
pub mod retrieval;

#[cfg(test)]
mod test_utils;

pub use error::{Error, Result};
