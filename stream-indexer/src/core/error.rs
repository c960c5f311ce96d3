//! Centralized error types for the stream indexer

use thiserror::Error;

/// Main indexer error type
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Chain read error: {0}")]
    Chain(#[from] ChainError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Corrupt document {collection}/{key}: {reason}")]
    CorruptDocument {
        collection: String,
        key: String,
        reason: String,
    },
}

/// Errors raised while reading authoritative state from the chain
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Read-only call {function} returned an error: {cause}")]
    CallFailed { function: String, cause: String },

    #[error("Unexpected Clarity value: {0}")]
    UnexpectedValue(String),

    #[error("Malformed Clarity encoding: {0}")]
    Codec(String),
}

/// Errors raised when a raw print record does not match a known event shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("print value is not a tuple")]
    NotATuple,

    #[error("missing event tag")]
    MissingTag,

    #[error("unknown event tag `{0}`")]
    UnknownTag(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not a valid {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// Result type alias for indexer operations
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Helper to convert sqlx errors
impl From<sqlx::Error> for IndexerError {
    fn from(err: sqlx::Error) -> Self {
        IndexerError::Storage(StorageError::Database(err.to_string()))
    }
}

/// Helper to convert redis errors
impl From<redis::RedisError> for IndexerError {
    fn from(err: redis::RedisError) -> Self {
        IndexerError::Storage(StorageError::Cache(err.to_string()))
    }
}

impl From<reqwest::Error> for IndexerError {
    fn from(err: reqwest::Error) -> Self {
        IndexerError::Chain(ChainError::Request(err.to_string()))
    }
}

impl From<serde_json::Error> for IndexerError {
    fn from(err: serde_json::Error) -> Self {
        IndexerError::Serialization(err.to_string())
    }
}
