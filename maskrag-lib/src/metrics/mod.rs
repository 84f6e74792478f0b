//! Answer quality metrics
//!
//! Five numbers describe a batch of results, all percentages over the row
//! count:
//!
//! - **Retrieval recall**: the ground truth appears in the retrieved context
//! - **Exact match**: prediction and ground truth normalize to the same string
//! - **F1**: token overlap between prediction and ground truth
//! - **Faithfulness**: the prediction appears in the retrieved context
//! - **Gap**: faithfulness minus exact match
//!
//! A large gap means the generator is copying retrieved text that does not
//! hold the answer, which is what anonymized contexts tend to provoke.
//!
//! Every comparison runs on [`normalize`]d text; "appears in" is a plain
//! substring test and an empty string never counts as appearing.

use std::collections::HashMap;

use csv::StringRecord;

use crate::experiment::{Table, ANSWER_COLUMNS};
use crate::normalize::{normalize, tokens};

mod report;

pub use report::*;

/// The fields of a result row the metrics look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalRow {
    pub prediction: String,
    /// Raw ground truth, possibly a list rendered as text
    pub ground_truth: String,
    pub context: String,
}

impl EvalRow {
    pub fn new(
        prediction: impl Into<String>,
        ground_truth: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            prediction: prediction.into(),
            ground_truth: ground_truth.into(),
            context: context.into(),
        }
    }

    /// Pull the evaluated fields out of a raw CSV record. Missing columns read
    /// as empty strings.
    pub fn from_record(table: &Table, record: &StringRecord) -> Self {
        Self {
            prediction: table.get_first(record, ANSWER_COLUMNS).unwrap_or_default().to_string(),
            ground_truth: table.get(record, "ground_truth").unwrap_or_default().to_string(),
            context: table
                .get(record, "retrieved_context_snippet")
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// First answer of a ground truth that may be stored as a list literal such
/// as `['Paris', 'Paris, France']`.
pub fn first_ground_truth(raw: &str) -> String {
    raw.replace("['", "")
        .replace("']", "")
        .replace("[\"", "")
        .replace("\"]", "")
        .split("', '")
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Whether two answers normalize to the same text.
pub fn exact_match(prediction: &str, ground_truth: &str) -> bool {
    normalize(prediction) == normalize(ground_truth)
}

/// Token-level F1 between two answers, in `[0, 1]`.
///
/// Tokens are counted as a multiset, so repeated words only match as often
/// as they occur on both sides.
pub fn f1_score(prediction: &str, ground_truth: &str) -> f64 {
    let prediction = normalize(prediction);
    let ground_truth = normalize(ground_truth);
    let pred_tokens = tokens(&prediction);
    let truth_tokens = tokens(&ground_truth);

    let mut truth_counts: HashMap<&str, usize> = HashMap::new();
    for token in &truth_tokens {
        *truth_counts.entry(*token).or_default() += 1;
    }

    let mut common = 0usize;
    for token in &pred_tokens {
        if let Some(count) = truth_counts.get_mut(token) {
            if *count > 0 {
                *count -= 1;
                common += 1;
            }
        }
    }

    if common == 0 {
        return 0.0;
    }

    let precision = common as f64 / pred_tokens.len() as f64;
    let recall = common as f64 / truth_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

fn contains_non_empty(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.contains(needle)
}

/// Aggregate scores of a group of rows, as percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Scores {
    pub recall: f64,
    pub exact_match: f64,
    pub f1: f64,
    pub faithfulness: f64,
    /// Faithfulness minus exact match
    pub gap: f64,
}

/// Score a group of rows. An empty group scores zero everywhere.
pub fn compute_metrics(rows: &[EvalRow]) -> Scores {
    if rows.is_empty() {
        return Scores::default();
    }

    let mut recall_hits = 0usize;
    let mut em_hits = 0usize;
    let mut faithful = 0usize;
    let mut f1_sum = 0.0;

    for row in rows {
        let truth = first_ground_truth(&row.ground_truth);
        let pred = normalize(&row.prediction);
        let norm_truth = normalize(&truth);
        let context = normalize(&row.context);

        if pred == norm_truth {
            em_hits += 1;
        }
        f1_sum += f1_score(&row.prediction, &truth);
        if contains_non_empty(&context, &pred) {
            faithful += 1;
        }
        if contains_non_empty(&context, &norm_truth) {
            recall_hits += 1;
        }
    }

    let total = rows.len() as f64;
    let pct = |count: usize| count as f64 / total * 100.0;

    let exact_match = pct(em_hits);
    let faithfulness = pct(faithful);

    Scores {
        recall: pct(recall_hits),
        exact_match,
        f1: f1_sum / total * 100.0,
        faithfulness,
        gap: faithfulness - exact_match,
    }
}
