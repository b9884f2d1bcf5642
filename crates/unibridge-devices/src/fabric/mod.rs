//! Fabric-side data model and the contract the fabric stack implements.
//!
//! The engine never encodes fabric wire frames. It hands typed values to a
//! [`FabricStack`] implementation that owns the attribute store, endpoint
//! registration and subscription reporting.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod memory;

pub use memory::InMemoryFabric;

/// Fabric endpoint number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointId(pub u16);

/// Fabric cluster identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

/// Fabric attribute identifier, scoped to a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeId(pub u32);

/// Fabric command identifier, scoped to a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandId(pub u32);

/// Tenant index of the fabric that issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FabricIndex(pub u8);

/// Group identifier, used for both fabric and device-network groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u16);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

impl fmt::Display for FabricIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interaction status codes returned to the fabric stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Success = 0x00,
    Failure = 0x01,
    UnsupportedEndpoint = 0x7F,
    UnsupportedCommand = 0x81,
    InvalidCommand = 0x85,
    UnsupportedAttribute = 0x86,
    ConstraintError = 0x87,
    UnsupportedWrite = 0x88,
    /// Also reported as INSUFFICIENT_SPACE by group commands.
    ResourceExhausted = 0x89,
    DuplicateExists = 0x8A,
    NotFound = 0x8B,
    InvalidDataType = 0x8D,
    UnsupportedCluster = 0xC3,
}

impl Status {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let status = match code {
            0x00 => Status::Success,
            0x01 => Status::Failure,
            0x7F => Status::UnsupportedEndpoint,
            0x81 => Status::UnsupportedCommand,
            0x85 => Status::InvalidCommand,
            0x86 => Status::UnsupportedAttribute,
            0x87 => Status::ConstraintError,
            0x88 => Status::UnsupportedWrite,
            0x89 => Status::ResourceExhausted,
            0x8A => Status::DuplicateExists,
            0x8B => Status::NotFound,
            0x8D => Status::InvalidDataType,
            0xC3 => Status::UnsupportedCluster,
            _ => return None,
        };
        Some(status)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(0x{:02X})", self, self.code())
    }
}

/// A typed fabric attribute or command field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FabricValue {
    Null,
    Bool(bool),
    Uint(u64),
    Int(i64),
    Str(String),
    List(Vec<FabricValue>),
}

impl FabricValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FabricValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view, accepting either signedness when the value fits.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FabricValue::Uint(v) => Some(*v),
            FabricValue::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FabricValue::Int(v) => Some(*v),
            FabricValue::Uint(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FabricValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FabricValue]> {
        match self {
            FabricValue::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FabricValue::Null)
    }

    /// JSON rendering used for events and logs.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FabricValue::Null => serde_json::Value::Null,
            FabricValue::Bool(v) => serde_json::Value::Bool(*v),
            FabricValue::Uint(v) => serde_json::Value::from(*v),
            FabricValue::Int(v) => serde_json::Value::from(*v),
            FabricValue::Str(v) => serde_json::Value::String(v.clone()),
            FabricValue::List(items) => {
                serde_json::Value::Array(items.iter().map(FabricValue::to_json).collect())
            }
        }
    }
}

impl From<bool> for FabricValue {
    fn from(v: bool) -> Self {
        FabricValue::Bool(v)
    }
}

macro_rules! fabric_value_from {
    ($variant:ident, $target:ty, $($t:ty),*) => {
        $(
            impl From<$t> for FabricValue {
                fn from(v: $t) -> Self {
                    FabricValue::$variant(<$target>::from(v))
                }
            }
        )*
    };
}

fabric_value_from!(Uint, u64, u8, u16, u32, u64);
fabric_value_from!(Int, i64, i8, i16, i32, i64);

impl From<&str> for FabricValue {
    fn from(v: &str) -> Self {
        FabricValue::Str(v.to_string())
    }
}

impl From<String> for FabricValue {
    fn from(v: String) -> Self {
        FabricValue::Str(v)
    }
}

/// Typed command payload: field name to value.
pub type CommandFields = BTreeMap<String, FabricValue>;

/// Concrete attribute path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributePath {
    pub endpoint: EndpointId,
    pub cluster: ClusterId,
    pub attribute: AttributeId,
}

impl AttributePath {
    pub fn new(endpoint: EndpointId, cluster: ClusterId, attribute: AttributeId) -> Self {
        Self {
            endpoint,
            cluster,
            attribute,
        }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.endpoint, self.cluster, self.attribute)
    }
}

/// Concrete command path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandPath {
    pub endpoint: EndpointId,
    pub cluster: ClusterId,
    pub command: CommandId,
}

impl CommandPath {
    pub fn new(endpoint: EndpointId, cluster: ClusterId, command: CommandId) -> Self {
        Self {
            endpoint,
            cluster,
            command,
        }
    }
}

/// Request context handed in by the fabric stack on invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvokeContext {
    pub fabric_index: FabricIndex,
}

impl InvokeContext {
    pub fn new(fabric_index: u8) -> Self {
        Self {
            fabric_index: FabricIndex(fabric_index),
        }
    }
}

/// What a dynamic endpoint looks like to fabric controllers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub device_types: Vec<u32>,
    pub clusters: Vec<ClusterId>,
}

impl EndpointDescriptor {
    pub fn has_cluster(&self, cluster: ClusterId) -> bool {
        self.clusters.binary_search(&cluster).is_ok()
    }
}

/// The fabric protocol stack as seen by the engine.
///
/// Implementations must not call back into the engine from these methods.
pub trait FabricStack: Send + Sync {
    /// Register (or re-register) a dynamic endpoint with the given id.
    fn register_dynamic_endpoint(
        &self,
        endpoint: EndpointId,
        descriptor: &EndpointDescriptor,
    ) -> Result<()>;

    /// Remove a dynamic endpoint. Unknown ids are ignored.
    fn unregister_dynamic_endpoint(&self, endpoint: EndpointId);

    /// Push a value into the attribute store.
    fn store_attribute(&self, path: &AttributePath, value: &FabricValue);

    /// Forget a stored value.
    fn clear_attribute(&self, path: &AttributePath);

    /// Whether a controller holds an active subscription covering the path.
    fn is_subscribed(&self, path: &AttributePath) -> bool;

    /// Emit a change report for the path.
    fn notify_attribute_change(&self, path: &AttributePath);

    /// Deliver a device-originated command response.
    fn command_response(&self, path: &CommandPath, fields: &CommandFields);
}
