//! Error type shared by every engine component.
//!
//! Missing personalization data is not represented here: an empty interaction
//! window, a user without history or a user without stored preferences are
//! reported through tagged outcomes by the scorers. Errors in this module mean
//! a dependency failed or the caller asked for something invalid.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Data store error: {0}")]
    DataStore(String),

    #[error("Embedding model error: {0}")]
    Embedding(String),

    #[error("Recommendation cache error: {0}")]
    Cache(String),

    #[error("Index persistence error: {0}")]
    Persistence(String),

    #[error("Index not ready: {0}")]
    IndexNotReady(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl EngineError {
    /// True when the failure came from the data store or the embedding model.
    pub fn is_upstream(&self) -> bool {
        matches!(self, EngineError::DataStore(_) | EngineError::Embedding(_))
    }

    /// True for failures that may succeed on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::DataStore(_) | EngineError::Embedding(_) | EngineError::Cache(_)
        )
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::DataStore(err.to_string())
    }
}

impl From<redis::RedisError> for EngineError {
    fn from(err: redis::RedisError) -> Self {
        EngineError::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for EngineError {
    fn from(err: bincode::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Persistence(err.to_string())
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}
