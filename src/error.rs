//! Error types for the graph ingestion and Q&A pipelines

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Language model error: {0}")]
    Gateway(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Graph store error: {0}")]
    Store(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Timed out after {secs}s: {operation}")]
    Timeout { operation: String, secs: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for failures that originate in the language model gateway.
    pub fn is_gateway(&self) -> bool {
        matches!(self, Error::Gateway(_) | Error::Extraction(_))
    }
}

impl From<neo4rs::Error> for Error {
    fn from(err: neo4rs::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl From<neo4rs::DeError> for Error {
    fn from(err: neo4rs::DeError) -> Self {
        Error::Store(format!("row decode: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
