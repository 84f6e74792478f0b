use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::anonymize::{Entity, EntityKind, EntityRecognizer};
use crate::{Error, Result};

/// Known entity surface forms, grouped by type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gazetteer {
    pub person: Vec<String>,
    pub location: Vec<String>,
    pub organization: Vec<String>,
}

impl Gazetteer {
    fn terms(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::Person => &self.person,
            EntityKind::Location => &self.location,
            EntityKind::Organization => &self.organization,
        }
    }
}

/// Dictionary recognizer: exact, case-sensitive, whole-word matches of known names.
///
/// Each match is reported with score 1.0. Longer names are tried first, so
/// "New York City" wins over "New York".
pub struct GazetteerRecognizer {
    patterns: Vec<(EntityKind, Regex)>,
}

impl GazetteerRecognizer {
    pub fn new(gazetteer: &Gazetteer) -> Result<Self> {
        let mut patterns = Vec::new();

        for kind in EntityKind::ALL {
            let mut terms: Vec<&str> = gazetteer
                .terms(kind)
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .collect();
            if terms.is_empty() {
                continue;
            }
            terms.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
            terms.dedup();

            let alternation = terms
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            let regex = Regex::new(&format!(r"\b(?:{alternation})\b"))
                .map_err(|e| Error::Config(format!("invalid gazetteer for {}: {e}", kind.tag())))?;

            patterns.push((kind, regex));
        }

        Ok(Self { patterns })
    }

    /// Load a gazetteer from a JSON file of the form
    /// `{"person": [...], "location": [...], "organization": [...]}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let gazetteer: Gazetteer = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse gazetteer {}: {e}", path.display())))?;
        Self::new(&gazetteer)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl EntityRecognizer for GazetteerRecognizer {
    fn recognize(&self, text: &str) -> Result<Vec<Entity>> {
        Ok(self
            .patterns
            .iter()
            .flat_map(|(kind, regex)| {
                regex.find_iter(text).map(move |m| Entity {
                    start: m.start(),
                    end: m.end(),
                    kind: *kind,
                    score: 1.0,
                })
            })
            .collect())
    }
}
