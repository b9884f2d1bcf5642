//! Core traits and types for Unibridge.
//!
//! This crate defines the foundational abstractions shared by the storage,
//! translation engine and binary crates: the unified error type,
//! configuration loading, the key-value storage trait and the bridge event bus.

pub mod config;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod storage;

pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use event::{BridgeEvent, EventMetadata};
pub use eventbus::{
    DEFAULT_CHANNEL_CAPACITY, EventBus, EventBusReceiver, FilterBuilder, FilteredReceiver,
    SharedEventBus,
};

/// Re-exports commonly used types.
pub mod prelude {
    // Configuration
    pub use crate::config::{
        defaults, env_vars, BridgeConfig, EndpointSettings, GroupSettings, MqttSettings,
        StorageSettings, TopicSettings,
    };

    // Error handling
    pub use crate::error::{Error, Result};

    // Events
    pub use crate::event::{BridgeEvent, EventMetadata};
    pub use crate::eventbus::{EventBus, SharedEventBus};

    // Storage
    pub use crate::storage::{StorageBackend, StorageError};
}
