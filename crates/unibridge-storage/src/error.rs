//! Error types for the storage crate.

use thiserror::Error;

pub use unibridge_core::error::Error as BridgeCoreError;
use unibridge_core::storage::StorageError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage error types.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Database error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid backend configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<Error> for BridgeCoreError {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => BridgeCoreError::Storage(e.to_string()),
            Error::Serialization(s) => BridgeCoreError::Serialization(s),
            Error::Storage(s) => BridgeCoreError::Storage(s),
            Error::InvalidConfig(s) => BridgeCoreError::Config(s),
        }
    }
}

impl From<Error> for StorageError {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => StorageError::Io(e),
            Error::Serialization(s) => StorageError::Serialization(s),
            Error::Storage(s) => StorageError::Backend(s),
            Error::InvalidConfig(s) => StorageError::Configuration(s),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(feature = "redb")]
mod redb_conversions {
    use super::Error;

    impl From<redb::Error> for Error {
        fn from(e: redb::Error) -> Self {
            Error::Storage(format!("Redb error: {}", e))
        }
    }

    impl From<redb::TransactionError> for Error {
        fn from(e: redb::TransactionError) -> Self {
            Error::Storage(format!("Redb transaction error: {}", e))
        }
    }

    impl From<redb::TableError> for Error {
        fn from(e: redb::TableError) -> Self {
            Error::Storage(format!("Redb table error: {}", e))
        }
    }

    impl From<redb::StorageError> for Error {
        fn from(e: redb::StorageError) -> Self {
            Error::Storage(format!("Redb storage error: {}", e))
        }
    }

    impl From<redb::CommitError> for Error {
        fn from(e: redb::CommitError) -> Self {
            Error::Storage(format!("Redb commit error: {}", e))
        }
    }

    impl From<redb::DatabaseError> for Error {
        fn from(e: redb::DatabaseError) -> Self {
            Error::Storage(format!("Redb database error: {}", e))
        }
    }
}
