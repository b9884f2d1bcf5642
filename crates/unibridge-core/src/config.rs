//! Bridge configuration loading.
//!
//! Sources, lowest priority first: built-in defaults, a TOML file (an
//! explicit path, otherwise `config.toml` in the working directory), then
//! environment variables, which override file values field by field.

use crate::config_err;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default values.
pub mod defaults {
    pub const MQTT_HOST: &str = "localhost";
    pub const MQTT_PORT: u16 = 1883;
    pub const MQTT_CLIENT_ID: &str = "unibridge";
    pub const MQTT_KEEP_ALIVE_SECS: u64 = 30;
    /// Outgoing request queue depth of the MQTT client.
    pub const MQTT_REQUEST_CAPACITY: usize = 64;
    /// Incoming message channel depth between the event loop and the router.
    pub const MQTT_INCOMING_CAPACITY: usize = 1024;

    pub const FIRST_DYNAMIC_ENDPOINT: u16 = 2;
    pub const ENDPOINT_CAPACITY: u16 = 254;

    pub const GROUP_ID_MIN: u16 = 1;
    pub const GROUP_ID_MAX: u16 = 0xFEFF;

    pub const STORAGE_BACKEND: &str = "redb";
    pub const STORAGE_PATH: &str = "data/unibridge.redb";
    pub const STORAGE_CACHE_CAPACITY: usize = 1000;
    /// File name used under `UNIBRIDGE_DATA_DIR`.
    pub const STORAGE_FILE_NAME: &str = "unibridge.redb";

    pub const CONFIG_FILE: &str = "config.toml";

    /// Storage backends the binary knows how to build.
    pub const KNOWN_BACKENDS: &[&str] = &["redb", "memory"];
}

/// Environment variable names.
pub mod env_vars {
    pub const MQTT_HOST: &str = "UNIBRIDGE_MQTT_HOST";
    pub const MQTT_PORT: &str = "UNIBRIDGE_MQTT_PORT";
    pub const MQTT_USERNAME: &str = "UNIBRIDGE_MQTT_USERNAME";
    pub const MQTT_PASSWORD: &str = "UNIBRIDGE_MQTT_PASSWORD";
    pub const DATA_DIR: &str = "UNIBRIDGE_DATA_DIR";
    pub const TOPIC_ROOT: &str = "UNIBRIDGE_TOPIC_ROOT";
    pub const LOG_JSON: &str = "UNIBRIDGE_LOG_JSON";
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub clean_session: bool,
    pub request_capacity: usize,
    pub incoming_capacity: usize,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: defaults::MQTT_HOST.to_string(),
            port: defaults::MQTT_PORT,
            client_id: defaults::MQTT_CLIENT_ID.to_string(),
            username: None,
            password: None,
            keep_alive_secs: defaults::MQTT_KEEP_ALIVE_SECS,
            clean_session: true,
            request_capacity: defaults::MQTT_REQUEST_CAPACITY,
            incoming_capacity: defaults::MQTT_INCOMING_CAPACITY,
        }
    }
}

/// Topic layout settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicSettings {
    /// Optional prefix placed before `by-id/` and `by-group/`.
    pub root: Option<String>,
}

/// Dynamic endpoint allocation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub first_dynamic_endpoint: u16,
    pub capacity: u16,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            first_dynamic_endpoint: defaults::FIRST_DYNAMIC_ENDPOINT,
            capacity: defaults::ENDPOINT_CAPACITY,
        }
    }
}

/// Fabric group id allocation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupSettings {
    pub min_group_id: u16,
    pub max_group_id: u16,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            min_group_id: defaults::GROUP_ID_MIN,
            max_group_id: defaults::GROUP_ID_MAX,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Backend kind: `redb` or `memory`.
    pub backend: String,
    pub path: PathBuf,
    pub cache_capacity: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: defaults::STORAGE_BACKEND.to_string(),
            path: PathBuf::from(defaults::STORAGE_PATH),
            cache_capacity: defaults::STORAGE_CACHE_CAPACITY,
        }
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub mqtt: MqttSettings,
    pub topics: TopicSettings,
    pub endpoints: EndpointSettings,
    pub groups: GroupSettings,
    pub storage: StorageSettings,
}

impl BridgeConfig {
    /// Load configuration from all sources.
    ///
    /// An explicit path must exist. Without one, `config.toml` in the working
    /// directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(defaults::CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)?
                } else {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| config_err!("Cannot read {}: {}", path.display(), e))?;
        tracing::info!(path = %path.display(), "Loaded configuration file");
        Self::from_toml_str(&content)
    }

    /// Parse TOML text. Missing sections fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(env_vars::MQTT_HOST) {
            self.mqtt.host = host;
        }
        if let Some(port) = lookup(env_vars::MQTT_PORT) {
            match port.parse() {
                Ok(port) => self.mqtt.port = port,
                Err(_) => {
                    tracing::warn!(value = %port, "Ignoring invalid {}", env_vars::MQTT_PORT)
                }
            }
        }
        if let Some(username) = lookup(env_vars::MQTT_USERNAME) {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = lookup(env_vars::MQTT_PASSWORD) {
            self.mqtt.password = Some(password);
        }
        if let Some(dir) = lookup(env_vars::DATA_DIR) {
            self.storage.path = Path::new(&dir).join(defaults::STORAGE_FILE_NAME);
        }
        if let Some(root) = lookup(env_vars::TOPIC_ROOT) {
            let root = root.trim_matches('/').to_string();
            self.topics.root = if root.is_empty() { None } else { Some(root) };
        }
    }

    /// Reject settings the bridge cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.mqtt.host.trim().is_empty() {
            return Err(config_err!("mqtt.host must not be empty"));
        }
        if self.mqtt.port == 0 {
            return Err(config_err!("mqtt.port must not be zero"));
        }
        if self.endpoints.capacity == 0 {
            return Err(config_err!("endpoints.capacity must not be zero"));
        }
        let last = u32::from(self.endpoints.first_dynamic_endpoint)
            + u32::from(self.endpoints.capacity)
            - 1;
        if last > u32::from(u16::MAX) {
            return Err(config_err!(
                "endpoint range {}..={} overflows the endpoint id space",
                self.endpoints.first_dynamic_endpoint,
                last
            ));
        }
        if self.groups.min_group_id == 0 || self.groups.min_group_id > self.groups.max_group_id {
            return Err(config_err!(
                "invalid group range {}..={}",
                self.groups.min_group_id,
                self.groups.max_group_id
            ));
        }
        if !defaults::KNOWN_BACKENDS.contains(&self.storage.backend.as_str()) {
            return Err(config_err!(
                "unknown storage backend '{}'",
                self.storage.backend
            ));
        }
        Ok(())
    }
}
