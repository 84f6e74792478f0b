//! The fixed experiment plan.
//!
//! Two result collections are produced:
//!
//! - **plain**: Baseline, Placeholder and Faker corpora, each run with exact
//!   dense and BM25 retrieval, one file per corpus
//! - **indexed**: the same corpora run with HNSW dense retrieval
//!
//! A scenario whose corpus cannot be built or whose batch fails is logged and
//! skipped; nothing is written for it and the plan moves on.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::anonymize::{Anonymizer, EntityRecognizer, Strategy};
use crate::dataset::Sample;
use crate::embed::Embedder;
use crate::experiment::{write_results, ExperimentRunner};
use crate::generate::Generator;
use crate::retrieval::RetrievalMethod;
use crate::Result;

/// Which result collection a scenario belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Plain,
    Indexed,
}

/// One corpus variant and the retrieval methods run over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub strategy: Strategy,
    pub methods: Vec<RetrievalMethod>,
    pub file_name: String,
}

const PLAN_STRATEGIES: [Strategy; 3] = [Strategy::Baseline, Strategy::Placeholder, Strategy::Faker];

/// Scenarios of a collection, in run order.
pub fn scenarios(collection: Collection) -> Vec<Scenario> {
    PLAN_STRATEGIES
        .iter()
        .enumerate()
        .map(|(i, &strategy)| match collection {
            Collection::Plain => Scenario {
                strategy,
                methods: vec![RetrievalMethod::DenseExact, RetrievalMethod::SparseBm25],
                file_name: format!("results_{:02}_{}.csv", i + 1, strategy.file_stem()),
            },
            Collection::Indexed => Scenario {
                strategy,
                methods: vec![RetrievalMethod::DenseIndexed],
                file_name: format!("results_{}_indexed.csv", strategy.file_stem()),
            },
        })
        .collect()
}

/// What a plan run produced.
#[derive(Debug, Default)]
pub struct PlanReport {
    pub written: Vec<PathBuf>,
    /// Scenario file name and the error that stopped it
    pub failed: Vec<(String, String)>,
}

/// Run every scenario of `collection` over `samples`, writing into `out_dir`.
///
/// Only filesystem errors while saving abort the plan.
pub async fn run_plan<E, G, R>(
    runner: &mut ExperimentRunner<E, G>,
    anonymizer: &mut Anonymizer<R>,
    samples: &[Sample],
    collection: Collection,
    out_dir: &Path,
) -> Result<PlanReport>
where
    E: Embedder,
    G: Generator,
    R: EntityRecognizer,
{
    let documents: Vec<String> = samples.iter().map(|s| s.context.clone()).collect();
    let questions: Vec<String> = samples.iter().map(|s| s.question.clone()).collect();
    let truths: Vec<String> = samples.iter().map(|s| s.answer.clone()).collect();

    let mut report = PlanReport::default();

    for scenario in scenarios(collection) {
        info!(strategy = %scenario.strategy, file = %scenario.file_name, "starting scenario");

        let corpus = match anonymizer.anonymize_all(&documents, scenario.strategy) {
            Ok(corpus) => corpus,
            Err(e) => {
                error!(strategy = %scenario.strategy, error = %e, "failed to build corpus");
                report.failed.push((scenario.file_name, e.to_string()));
                continue;
            }
        };

        let mut rows = Vec::new();
        let mut failure = None;
        for &method in &scenario.methods {
            match runner
                .run_batch(&corpus, &questions, &truths, scenario.strategy, method)
                .await
            {
                Ok(batch) => rows.extend(batch),
                Err(e) => {
                    error!(strategy = %scenario.strategy, method = %method, error = %e, "batch aborted");
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        if let Some(message) = failure {
            report.failed.push((scenario.file_name, message));
            continue;
        }

        let path = out_dir.join(&scenario.file_name);
        if write_results(&path, &rows)? {
            report.written.push(path);
        }
    }

    Ok(report)
}
