//! Configuration for experiment runs
//!
//! Loaded from `maskrag.toml`. Every section and field is optional; missing
//! values take the defaults the experiments were designed around.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::default_triggers;
use crate::embed::DEFAULT_EMBEDDING_MODEL;
use crate::experiment::RunSettings;
use crate::generate::GeneratorConfig;
use crate::{Error, Result};

/// Default config file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "maskrag.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub retrieval: RunSettings,
    pub embedding: EmbeddingConfig,
    pub generator: GeneratorConfig,
    pub anonymize: AnonymizeConfig,
    pub output: OutputConfig,
    pub filter: FilterConfig,
}

/// Where questions come from and which ones are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// SQuAD v1.1 JSON file
    pub path: PathBuf,
    pub num_samples: usize,
    /// A question is kept when it contains any of these, case-insensitively
    pub triggers: Vec<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("squad/train-v1.1.json"),
            num_samples: 500,
            triggers: default_triggers(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnonymizeConfig {
    /// Entities scoring at or below this are left in place
    pub score_threshold: f32,
    /// Seed for synthetic replacement values
    pub seed: u64,
    /// JSON gazetteer with `person`, `location` and `organization` term lists
    pub gazetteer: Option<PathBuf>,
}

impl Default for AnonymizeConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.4,
            seed: 42,
            gazetteer: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Results of the exact dense and BM25 runs
    pub plain_dir: PathBuf,
    /// Results of the HNSW runs
    pub indexed_dir: PathBuf,
    pub summary_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            plain_dir: PathBuf::from("data"),
            indexed_dir: PathBuf::from("faiss_data"),
            summary_path: PathBuf::from("final_analysis_results.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub target_rows: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { target_rows: 250 }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Load from `./maskrag.toml` if present, otherwise use defaults
    pub fn load_default() -> Result<Self> {
        let local_path = Path::new(DEFAULT_CONFIG_FILE);
        if local_path.exists() {
            return Self::load(local_path);
        }
        Ok(Self::default())
    }

    fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Render as TOML, e.g. to seed a config file
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
