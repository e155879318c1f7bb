//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for every store and the facade.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is absent or its item has expired
    #[error("Item {0} not found")]
    NotFound(String),

    /// Counter operation on a value that is not an integer
    #[error("Item {0} does not hold an integer")]
    TypeMismatch(String),

    /// Counter operation would leave the i64 range
    #[error("Counter {0} would overflow")]
    Overflow(String),

    /// Stored bytes could not be turned back into a value
    #[error("Decode error: {0}")]
    Decode(String),

    /// Value could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),

    /// Failure of the underlying medium (I/O, connection, transaction)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CacheError {
    /// Returns true for the `NotFound` variant.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

// == Conversions ==
impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Backend(err.to_string())
    }
}

#[cfg(feature = "sled-backend")]
impl From<sled::Error> for CacheError {
    fn from(err: sled::Error) -> Self {
        CacheError::Backend(err.to_string())
    }
}

#[cfg(feature = "sled-backend")]
impl From<sled::transaction::TransactionError<CacheError>> for CacheError {
    fn from(err: sled::transaction::TransactionError<CacheError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(e) => CacheError::Backend(e.to_string()),
        }
    }
}

#[cfg(feature = "redis-backend")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
