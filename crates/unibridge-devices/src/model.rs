//! Device-network model assembled from discovery messages.

use crate::fabric::EndpointId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Node status as published on `by-id/<node>/State`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkStatus {
    OnlineFunctional,
    OnlineInterviewing,
    OnlineNonFunctional,
    Unavailable,
}

impl NetworkStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Online functional" => Some(Self::OnlineFunctional),
            "Online interviewing" => Some(Self::OnlineInterviewing),
            "Online non-functional" => Some(Self::OnlineNonFunctional),
            "Unavailable" => Some(Self::Unavailable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnlineFunctional => "Online functional",
            Self::OnlineInterviewing => "Online interviewing",
            Self::OnlineNonFunctional => "Online non-functional",
            Self::Unavailable => "Unavailable",
        }
    }

    /// Only fully interviewed nodes are exposed.
    pub fn is_exposable(&self) -> bool {
        matches!(self, Self::OnlineFunctional)
    }

    pub fn is_reachable(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

impl fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cluster instance on a device endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCluster {
    pub name: String,
    /// Attributes the device has reported at least once.
    pub attributes: BTreeSet<String>,
    pub commands: BTreeSet<String>,
}

impl DeviceCluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
        self
    }
}

/// An endpoint of a device-network node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEndpoint {
    pub index: u8,
    pub clusters: BTreeMap<String, DeviceCluster>,
}

impl DeviceEndpoint {
    pub fn new(index: u8) -> Self {
        Self {
            index,
            clusters: BTreeMap::new(),
        }
    }

    pub fn with_cluster(mut self, cluster: DeviceCluster) -> Self {
        self.clusters.insert(cluster.name.clone(), cluster);
        self
    }

    pub fn cluster(&self, name: &str) -> Option<&DeviceCluster> {
        self.clusters.get(name)
    }
}

/// A device-network node and everything discovered about it so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNode {
    pub id: String,
    pub status: Option<NetworkStatus>,
    pub endpoints: BTreeMap<u8, DeviceEndpoint>,
}

impl DeviceNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: None,
            endpoints: BTreeMap::new(),
        }
    }

    pub fn with_status(mut self, status: NetworkStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_endpoint(mut self, endpoint: DeviceEndpoint) -> Self {
        self.endpoints.insert(endpoint.index, endpoint);
        self
    }

    pub fn endpoint(&self, index: u8) -> Option<&DeviceEndpoint> {
        self.endpoints.get(&index)
    }

    pub fn endpoint_mut(&mut self, index: u8) -> &mut DeviceEndpoint {
        self.endpoints
            .entry(index)
            .or_insert_with(|| DeviceEndpoint::new(index))
    }

    pub fn is_reachable(&self) -> bool {
        self.status.map(|s| s.is_reachable()).unwrap_or(false)
    }
}

/// Lifecycle of a device endpoint as seen by the node state monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointState {
    /// Never seen.
    Unknown,
    /// Known, but not (or not yet) exposable.
    Discovering,
    /// Backed by a dynamic fabric endpoint.
    Exposed(EndpointId),
    /// Owning node was removed.
    Removed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_status_parse() {
        for status in [
            NetworkStatus::OnlineFunctional,
            NetworkStatus::OnlineInterviewing,
            NetworkStatus::OnlineNonFunctional,
            NetworkStatus::Unavailable,
        ] {
            assert_eq!(NetworkStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(NetworkStatus::parse("Offline"), None);
        assert!(!NetworkStatus::Unavailable.is_reachable());
        assert!(!NetworkStatus::OnlineInterviewing.is_exposable());
    }

    #[test]
    fn test_node_builder() {
        let mut node = DeviceNode::new("zw-0001").with_endpoint(
            DeviceEndpoint::new(1)
                .with_cluster(DeviceCluster::new("OnOff").with_commands(["On", "Off"])),
        );
        assert_eq!(node.endpoint(1).unwrap().cluster("OnOff").unwrap().commands.len(), 2);

        node.endpoint_mut(2);
        assert_eq!(node.endpoints.len(), 2);
        assert!(!node.is_reachable());
    }
}
