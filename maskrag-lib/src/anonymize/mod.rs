//! PII anonymization of documents before they are indexed
//!
//! Entity detection is delegated to an [`EntityRecognizer`]; this module only
//! decides which detections to act on and what to put in their place.
//!
//! # Strategies
//!
//! - `Baseline`: documents are indexed unchanged
//! - `Placeholder`: each entity becomes its type tag, e.g. `[PERSON]`
//! - `Faker`: each entity becomes a synthetic value of the same type
//! - `ContextAware`: masked-language-model substitution. Produced by an
//!   external tool; the harness only recognises its result files.
//!
//! # Usage
//!
//! ```ignore
//! use maskrag_lib::anonymize::{Anonymizer, GazetteerRecognizer, Substitution};
//!
//! let recognizer = GazetteerRecognizer::from_json_file("gazetteer.json")?;
//! let mut anonymizer = Anonymizer::new(recognizer, 0.4, 42);
//! let text = anonymizer.anonymize("Marie Curie lived in Paris.", Substitution::Placeholder)?;
//! assert_eq!(text, "[PERSON] lived in [GPE].");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

mod gazetteer;
mod synthetic;

pub use gazetteer::*;
pub use synthetic::*;

/// Entity types the anonymizer acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Person,
    Location,
    Organization,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [Self::Person, Self::Location, Self::Organization];

    /// Tag used by placeholder substitution.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Person => "PERSON",
            Self::Location => "GPE",
            Self::Organization => "ORG",
        }
    }
}

/// A detected entity span, as byte offsets into the analysed text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entity {
    pub start: usize,
    pub end: usize,
    pub kind: EntityKind,
    /// Recognizer confidence in [0, 1]
    pub score: f32,
}

impl Entity {
    fn len(&self) -> usize {
        self.end - self.start
    }

    fn overlaps(&self, other: &Entity) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Trait for PII detectors
pub trait EntityRecognizer {
    /// Detect entities in `text`. Spans may overlap and arrive in any order.
    fn recognize(&self, text: &str) -> Result<Vec<Entity>>;
}

/// Anonymization strategy of an experiment, as recorded in result files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strategy {
    Baseline,
    Placeholder,
    Faker,
    ContextAware,
    Unknown,
}

impl Strategy {
    /// Label written to the `anonymization_strategy` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Baseline => "Baseline",
            Self::Placeholder => "Placeholder",
            Self::Faker => "Faker",
            Self::ContextAware => "ContextAware",
            Self::Unknown => "Unknown",
        }
    }

    /// Name used in result file names.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Placeholder => "placeholder",
            Self::Faker => "faker",
            Self::ContextAware => "context_aware",
            Self::Unknown => "unknown",
        }
    }

    /// Name shown in reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ContextAware => "Context-Aware",
            other => other.as_str(),
        }
    }

    /// Classify a result file by its name. Checks run in a fixed order, so a
    /// name mentioning several strategies takes the first match.
    pub fn from_file_name(name: &str) -> Self {
        let name = name.to_lowercase();
        [Self::Baseline, Self::Placeholder, Self::Faker, Self::ContextAware]
            .into_iter()
            .find(|s| name.contains(s.file_stem()))
            .unwrap_or(Self::Unknown)
    }

    /// How documents are rewritten for this strategy, if the harness does it itself.
    pub fn substitution(&self) -> Option<Substitution> {
        match self {
            Self::Placeholder => Some(Substitution::Placeholder),
            Self::Faker => Some(Substitution::Synthetic),
            _ => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "baseline" => Ok(Self::Baseline),
            "placeholder" => Ok(Self::Placeholder),
            "faker" | "semantic" => Ok(Self::Faker),
            "contextaware" | "context_aware" => Ok(Self::ContextAware),
            other => Err(Error::InvalidInput(format!("unknown anonymization strategy: {other}"))),
        }
    }
}

/// Replacement policy applied to each kept entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Substitution {
    /// `[PERSON]`, `[GPE]`, `[ORG]`
    Placeholder,
    /// A made-up value of the same type
    Synthetic,
}

/// Rewrites detected entities according to a [`Substitution`].
pub struct Anonymizer<R: EntityRecognizer> {
    recognizer: R,
    threshold: f32,
    synthetic: SyntheticValues,
}

impl<R: EntityRecognizer> Anonymizer<R> {
    /// `threshold` is exclusive: entities must score strictly above it.
    pub fn new(recognizer: R, threshold: f32, seed: u64) -> Self {
        Self {
            recognizer,
            threshold,
            synthetic: SyntheticValues::new(seed),
        }
    }

    /// Entities that will be replaced: above threshold, non-overlapping, in text order.
    ///
    /// Among overlapping spans the earliest wins, then the longest.
    pub fn entities(&self, text: &str) -> Result<Vec<Entity>> {
        let mut found: Vec<Entity> = self
            .recognizer
            .recognize(text)?
            .into_iter()
            .filter(|e| e.score > self.threshold)
            .filter(|e| e.start < e.end && e.end <= text.len())
            .filter(|e| text.is_char_boundary(e.start) && text.is_char_boundary(e.end))
            .collect();

        found.sort_by(|a, b| a.start.cmp(&b.start).then(b.len().cmp(&a.len())));

        let mut kept: Vec<Entity> = Vec::with_capacity(found.len());
        for entity in found {
            if kept.last().is_none_or(|last| !last.overlaps(&entity)) {
                kept.push(entity);
            }
        }
        Ok(kept)
    }

    /// Rewrite every kept entity in `text`.
    ///
    /// Text without detections is returned unchanged.
    pub fn anonymize(&mut self, text: &str, substitution: Substitution) -> Result<String> {
        let entities = self.entities(text)?;
        if entities.is_empty() {
            return Ok(text.to_string());
        }
        debug!(entities = entities.len(), "anonymizing document");

        // Replace back to front so earlier offsets stay valid.
        let mut out = text.to_string();
        for entity in entities.iter().rev() {
            let replacement = match substitution {
                Substitution::Placeholder => format!("[{}]", entity.kind.tag()),
                Substitution::Synthetic => self.synthetic.value(entity.kind),
            };
            out.replace_range(entity.start..entity.end, &replacement);
        }
        Ok(out)
    }

    /// Rewrite a whole document collection for `strategy`.
    ///
    /// Strategies without an in-harness substitution return the documents as given.
    pub fn anonymize_all(&mut self, documents: &[String], strategy: Strategy) -> Result<Vec<String>> {
        match strategy.substitution() {
            Some(substitution) => documents
                .iter()
                .map(|d| self.anonymize(d, substitution))
                .collect(),
            None => Ok(documents.to_vec()),
        }
    }
}
