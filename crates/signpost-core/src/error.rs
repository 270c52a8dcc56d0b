use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors related to the core value types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Failures of the durable (relational) store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}

/// Failures of the distributed cache store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out: {0}")]
    Timeout(String),
    #[error("cache value is invalid: {0}")]
    InvalidData(String),
    #[error("cache operation failed: {0}")]
    Operation(String),
}

/// The error arm of a [`LookupResult`](crate::LookupResult).
///
/// Cache failures never appear here: they degrade to a miss inside
/// `resolve`. Every durable-store failure is reported as `ConnectFailed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("durable store connection failed: {0}")]
    ConnectFailed(String),
    #[error("invalid input: {0}")]
    Invalid(String),
}

impl From<CoreError> for ResolveError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidKey(message) => Self::Invalid(message),
        }
    }
}

impl From<StorageError> for ResolveError {
    fn from(value: StorageError) -> Self {
        Self::ConnectFailed(value.to_string())
    }
}
