//! Error types for maskrag

use thiserror::Error;

/// Result type alias for maskrag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in maskrag operations
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load or run the embedding model
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Failed to build or query a retrieval index
    #[error("index error: {0}")]
    Index(String),

    /// The answer generation service failed or returned garbage
    #[error("generation error: {0}")]
    Generation(String),

    /// Failed to load the question/answer dataset
    #[error("dataset error: {0}")]
    Dataset(String),

    /// Configuration could not be read or parsed
    #[error("config error: {0}")]
    Config(String),

    /// Invalid input provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
