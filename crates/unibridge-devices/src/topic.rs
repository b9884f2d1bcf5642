//! Device-network topic layout.
//!
//! ```text
//! [root/]by-id/<node>/State
//! [root/]by-id/<node>/ep<N>/<Cluster>/SupportedCommands
//! [root/]by-id/<node>/ep<N>/<Cluster>/Attributes/<Attr>/Reported
//! [root/]by-id/<node>/ep<N>/<Cluster>/Commands/<Cmd>
//! [root/]by-id/<node>/ep<N>/<Cluster>/Commands/<Cmd>Response
//! [root/]by-group/<group>/<Cluster>/Commands/<Cmd>
//! ```

const BY_ID: &str = "by-id";
const BY_GROUP: &str = "by-group";
const RESPONSE_SUFFIX: &str = "Response";

/// Topics the router understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    NodeState {
        node_id: String,
    },
    SupportedCommands {
        node_id: String,
        endpoint: u8,
        cluster: String,
    },
    AttributeReported {
        node_id: String,
        endpoint: u8,
        cluster: String,
        attribute: String,
    },
    /// `command` is the request name, without the `Response` suffix.
    CommandResponse {
        node_id: String,
        endpoint: u8,
        cluster: String,
        command: String,
    },
}

/// Builds and parses topics under an optional root prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicScheme {
    root: Option<String>,
}

impl TopicScheme {
    pub fn new(root: Option<String>) -> Self {
        let root = root
            .map(|r| r.trim_matches('/').to_string())
            .filter(|r| !r.is_empty());
        Self { root }
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    fn prefixed(&self, rest: String) -> String {
        match &self.root {
            Some(root) => format!("{}/{}", root, rest),
            None => rest,
        }
    }

    fn endpoint_base(&self, node_id: &str, endpoint: u8, cluster: &str) -> String {
        self.prefixed(format!("{}/{}/ep{}/{}", BY_ID, node_id, endpoint, cluster))
    }

    pub fn node_state(&self, node_id: &str) -> String {
        self.prefixed(format!("{}/{}/State", BY_ID, node_id))
    }

    pub fn supported_commands(&self, node_id: &str, endpoint: u8, cluster: &str) -> String {
        format!("{}/SupportedCommands", self.endpoint_base(node_id, endpoint, cluster))
    }

    pub fn attribute_reported(
        &self,
        node_id: &str,
        endpoint: u8,
        cluster: &str,
        attribute: &str,
    ) -> String {
        format!(
            "{}/Attributes/{}/Reported",
            self.endpoint_base(node_id, endpoint, cluster),
            attribute
        )
    }

    /// Report filter matching the attribute on every endpoint of the node.
    pub fn attribute_reported_any_endpoint(
        &self,
        node_id: &str,
        cluster: &str,
        attribute: &str,
    ) -> String {
        self.prefixed(format!(
            "{}/{}/+/{}/Attributes/{}/Reported",
            BY_ID, node_id, cluster, attribute
        ))
    }

    pub fn write_attributes(&self, node_id: &str, endpoint: u8, cluster: &str) -> String {
        self.command(node_id, endpoint, cluster, "WriteAttributes")
    }

    pub fn command(&self, node_id: &str, endpoint: u8, cluster: &str, command: &str) -> String {
        format!(
            "{}/Commands/{}",
            self.endpoint_base(node_id, endpoint, cluster),
            command
        )
    }

    pub fn command_response(
        &self,
        node_id: &str,
        endpoint: u8,
        cluster: &str,
        command: &str,
    ) -> String {
        format!(
            "{}{}",
            self.command(node_id, endpoint, cluster, command),
            RESPONSE_SUFFIX
        )
    }

    pub fn group_command(&self, group: u16, cluster: &str, command: &str) -> String {
        self.prefixed(format!(
            "{}/{}/{}/Commands/{}",
            BY_GROUP, group, cluster, command
        ))
    }

    /// Filters the bridge subscribes to at start-up.
    pub fn discovery_filters(&self) -> Vec<String> {
        vec![
            self.prefixed(format!("{}/+/State", BY_ID)),
            self.prefixed(format!("{}/+/+/+/SupportedCommands", BY_ID)),
        ]
    }

    /// Classify an incoming topic. Anything outside the layout yields `None`.
    pub fn parse(&self, topic: &str) -> Option<Topic> {
        let rest = match &self.root {
            Some(root) => topic.strip_prefix(root.as_str())?.strip_prefix('/')?,
            None => topic,
        };
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.first() != Some(&BY_ID) || parts.len() < 3 || parts[1].is_empty() {
            return None;
        }
        let node_id = parts[1].to_string();

        if parts.len() == 3 {
            return (parts[2] == "State").then_some(Topic::NodeState { node_id });
        }

        let endpoint = parse_endpoint(parts[2])?;
        let cluster = parts.get(3).filter(|c| !c.is_empty())?.to_string();

        match &parts[4..] {
            ["SupportedCommands"] => Some(Topic::SupportedCommands {
                node_id,
                endpoint,
                cluster,
            }),
            ["Attributes", attribute, "Reported"] if !attribute.is_empty() => {
                Some(Topic::AttributeReported {
                    node_id,
                    endpoint,
                    cluster,
                    attribute: attribute.to_string(),
                })
            }
            ["Commands", name] => {
                let command = name.strip_suffix(RESPONSE_SUFFIX)?;
                if command.is_empty() {
                    return None;
                }
                Some(Topic::CommandResponse {
                    node_id,
                    endpoint,
                    cluster,
                    command: command.to_string(),
                })
            }
            _ => None,
        }
    }
}

fn parse_endpoint(segment: &str) -> Option<u8> {
    segment.strip_prefix("ep")?.parse().ok()
}
