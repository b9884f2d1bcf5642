//! Key-value storage backends for Unibridge.
//!
//! Both backends implement [`unibridge_core::storage::StorageBackend`]:
//! - `redb`: persistent, single embedded database file with an LRU read cache
//! - `memory`: volatile, for tests and throwaway deployments

pub mod backends;
pub mod error;

pub use backends::{available_backends, create_backend, create_from_settings};
pub use error::{Error, Result};

#[cfg(feature = "memory")]
pub use backends::MemoryBackend;
#[cfg(feature = "redb")]
pub use backends::{RedbBackend, RedbBackendConfig};
