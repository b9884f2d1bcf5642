//! Storage backend implementations.
//!
//! Backends are feature-gated; `create_backend` picks one by name.

use serde_json::Value;
use std::sync::Arc;
use unibridge_core::config::StorageSettings;
use unibridge_core::storage::{Result, StorageBackend, StorageError};

#[cfg(feature = "redb")]
pub mod redb;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "redb")]
pub use self::redb::{RedbBackend, RedbBackendConfig};

#[cfg(feature = "memory")]
pub use memory::MemoryBackend;

/// Create a storage backend by type identifier.
///
/// # Example
/// ```no_run
/// use unibridge_storage::backends::create_backend;
/// use serde_json::json;
///
/// let backend = create_backend("redb", &json!({ "path": "./data/bridge.redb" })).unwrap();
/// assert!(backend.is_persistent());
/// ```
pub fn create_backend(backend_type: &str, config: &Value) -> Result<Arc<dyn StorageBackend>> {
    match backend_type {
        #[cfg(feature = "redb")]
        "redb" => {
            let cfg: RedbBackendConfig = serde_json::from_value(config.clone()).map_err(|e| {
                StorageError::Configuration(format!("Invalid redb config: {}", e))
            })?;
            Ok(Arc::new(RedbBackend::new(cfg)?))
        }

        #[cfg(feature = "memory")]
        "memory" => Ok(Arc::new(MemoryBackend::new())),

        _ => Err(StorageError::Configuration(format!(
            "Unknown backend type: {}. Available backends: {}",
            backend_type,
            available_backends().join(", ")
        ))),
    }
}

/// Create the backend described by the `[storage]` configuration section.
pub fn create_from_settings(settings: &StorageSettings) -> Result<Arc<dyn StorageBackend>> {
    let config = serde_json::json!({
        "path": settings.path.to_string_lossy(),
        "cache_capacity": settings.cache_capacity,
    });
    tracing::info!(
        backend = %settings.backend,
        path = %settings.path.display(),
        "Opening storage backend"
    );
    create_backend(&settings.backend, &config)
}

/// Get list of available backend types (based on enabled features).
pub fn available_backends() -> Vec<&'static str> {
    let mut backends = Vec::new();
    #[cfg(feature = "redb")]
    backends.push("redb");
    #[cfg(feature = "memory")]
    backends.push("memory");
    backends
}
