//! Error types for the translation engine.

use crate::fabric::Status;
use thiserror::Error;
use unibridge_core::error::Error as CoreError;
use unibridge_core::storage::StorageError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Engine error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Cluster, attribute or command has no mapping.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// No live endpoint or group mapping, or no value received yet.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Device-network payload failed validation.
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// Publish or subscribe was refused by the transport.
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// No free fabric endpoint or group identifier.
    #[error("Allocation exhausted: {0}")]
    AllocationExhausted(String),

    /// Group already mapped.
    #[error("Duplicate exists: {0}")]
    DuplicateExists(String),

    /// Persistence layer failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Fabric stack refused an operation.
    #[error("Fabric error: {0}")]
    Fabric(String),
}

impl BridgeError {
    /// Interaction status reported to the fabric stack for this error.
    pub fn status(&self) -> Status {
        match self {
            BridgeError::Unsupported(_) => Status::UnsupportedCluster,
            BridgeError::NotFound(_) => Status::NotFound,
            BridgeError::Malformed(_) => Status::InvalidDataType,
            BridgeError::TransportFailure(_) => Status::Failure,
            BridgeError::AllocationExhausted(_) => Status::ResourceExhausted,
            BridgeError::DuplicateExists(_) => Status::DuplicateExists,
            BridgeError::Storage(_) => Status::Failure,
            BridgeError::Fabric(_) => Status::Failure,
        }
    }
}

impl From<StorageError> for BridgeError {
    fn from(e: StorageError) -> Self {
        BridgeError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Malformed(e.to_string())
    }
}

impl From<BridgeError> for CoreError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Unsupported(s) => CoreError::Validation(s),
            BridgeError::NotFound(s) => CoreError::NotFound(s),
            BridgeError::Malformed(s) => CoreError::Serialization(s),
            BridgeError::TransportFailure(s) => CoreError::Transport(s),
            BridgeError::AllocationExhausted(s) => CoreError::Device(s),
            BridgeError::DuplicateExists(s) => CoreError::Validation(s),
            BridgeError::Storage(s) => CoreError::Storage(s),
            BridgeError::Fabric(s) => CoreError::Fabric(s),
        }
    }
}
