//! Command translation.
//!
//! Fabric commands become fire-and-forget publishes on
//! `.../<Cluster>/Commands/<Cmd>`. Responses published by the device on
//! `.../Commands/<Cmd>Response` are decoded and handed to the fabric stack
//! without correlation to the original invoke.

use crate::capability::tables::{ClusterSpec, FieldSpec};
use crate::capability::value::{from_device, to_device};
use crate::error::{BridgeError, Result};
use crate::fabric::{ClusterId, CommandFields, CommandId, CommandPath, EndpointId, GroupId, InvokeContext, Status};
use crate::groups::GroupStore;
use crate::translators::{ClusterBinding, EndpointBinding, ReportOutcome, SubscriptionSet, TranslatorContext};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of an invoke: optional response fields, or a failure status.
pub type InvokeResult = std::result::Result<Option<CommandFields>, Status>;

/// Command capability of one fabric cluster.
pub trait CommandTranslator: ClusterBinding {
    fn invoke(&self, ctx: &InvokeContext, path: &CommandPath, fields: &CommandFields) -> InvokeResult;

    /// Invoke on every device of a fabric group.
    fn invoke_group(
        &self,
        _ctx: &InvokeContext,
        _group: GroupId,
        _command: CommandId,
        _fields: &CommandFields,
    ) -> Status {
        Status::UnsupportedCommand
    }

    /// Device response for `command` (request name).
    fn on_device_response(
        &self,
        _node_id: &str,
        _device_endpoint: u8,
        _command: &str,
        _payload: &[u8],
    ) -> ReportOutcome {
        ReportOutcome::Ignored
    }
}

/// Validate typed fields and render the device JSON body.
///
/// Missing required fields and type mismatches yield `InvalidCommand`;
/// out-of-range values yield `ConstraintError`. Unknown fields are dropped.
pub fn encode_fields(specs: &[FieldSpec], fields: &CommandFields) -> std::result::Result<Value, Status> {
    let mut body = Map::new();
    for spec in specs {
        match fields.get(spec.name) {
            Some(value) => {
                let encoded = to_device(value, &spec.data_type, false).map_err(|e| e.command_status())?;
                body.insert(spec.name.to_string(), encoded);
            }
            None if spec.optional => {}
            None => return Err(Status::InvalidCommand),
        }
    }
    Ok(Value::Object(body))
}

/// Decode a device response body into typed fields.
pub fn decode_fields(specs: &[FieldSpec], body: &Value) -> std::result::Result<CommandFields, String> {
    let object = body
        .as_object()
        .ok_or_else(|| format!("expected an object, got {}", body))?;
    let mut fields = CommandFields::new();
    for spec in specs {
        match object.get(spec.name) {
            Some(raw) => {
                let value = from_device(raw, &spec.data_type, false)
                    .map_err(|e| format!("field {}: {}", spec.name, e))?;
                fields.insert(spec.name.to_string(), value);
            }
            None if spec.optional => {}
            None => return Err(format!("missing field {}", spec.name)),
        }
    }
    Ok(fields)
}

#[derive(Debug)]
struct CommandBound {
    node_id: String,
    device_endpoint: u8,
    supported: BTreeSet<String>,
    filters: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct CommandState {
    bound: HashMap<EndpointId, CommandBound>,
    subscriptions: SubscriptionSet,
}

/// Command translator driven by a cluster table entry.
pub struct TableCommandTranslator {
    spec: &'static ClusterSpec,
    ctx: TranslatorContext,
    groups: Arc<GroupStore>,
    state: Mutex<CommandState>,
}

impl TableCommandTranslator {
    pub fn new(spec: &'static ClusterSpec, ctx: TranslatorContext, groups: Arc<GroupStore>) -> Self {
        Self {
            spec,
            ctx,
            groups,
            state: Mutex::new(CommandState::default()),
        }
    }

    fn response_filters(&self, binding: &EndpointBinding) -> BTreeSet<String> {
        self.spec
            .commands
            .iter()
            .filter(|cmd| cmd.response.is_some() && binding.cluster.commands.contains(cmd.name))
            .map(|cmd| {
                self.ctx.topics.command_response(
                    &binding.node_id,
                    binding.device_endpoint,
                    self.spec.device_name,
                    cmd.name,
                )
            })
            .collect()
    }
}

impl ClusterBinding for TableCommandTranslator {
    fn cluster_id(&self) -> ClusterId {
        self.spec.id
    }

    fn attach(&self, binding: &EndpointBinding) -> Result<()> {
        if binding.cluster.name != self.spec.device_name {
            return Err(BridgeError::Unsupported(format!(
                "cluster {} bound to the {} command translator",
                binding.cluster.name, self.spec.name
            )));
        }

        let wanted = self.response_filters(binding);
        let mut state = self.state.lock();
        let held = state
            .bound
            .get(&binding.fabric_endpoint)
            .map(|bound| bound.filters.clone())
            .unwrap_or_default();

        for filter in wanted.difference(&held) {
            if state.subscriptions.acquire(filter) {
                if let Err(e) = self.ctx.transport.subscribe(filter) {
                    state.subscriptions.release(filter);
                    return Err(e);
                }
            }
        }
        for filter in held.difference(&wanted) {
            if state.subscriptions.release(filter) {
                let _ = self.ctx.transport.unsubscribe(filter);
            }
        }

        state.bound.insert(
            binding.fabric_endpoint,
            CommandBound {
                node_id: binding.node_id.clone(),
                device_endpoint: binding.device_endpoint,
                supported: binding.cluster.commands.clone(),
                filters: wanted,
            },
        );
        Ok(())
    }

    fn detach(&self, endpoint: EndpointId) {
        let mut state = self.state.lock();
        if let Some(bound) = state.bound.remove(&endpoint) {
            for filter in &bound.filters {
                if state.subscriptions.release(filter) {
                    if let Err(e) = self.ctx.transport.unsubscribe(filter) {
                        warn!("Failed to unsubscribe {}: {}", filter, e);
                    }
                }
            }
        }
    }
}

impl CommandTranslator for TableCommandTranslator {
    fn invoke(&self, _ctx: &InvokeContext, path: &CommandPath, fields: &CommandFields) -> InvokeResult {
        if path.cluster != self.spec.id {
            return Err(Status::UnsupportedCluster);
        }
        if !self.ctx.map.contains(path.endpoint) {
            return Err(Status::UnsupportedEndpoint);
        }
        let (node_id, device_endpoint, supported) = {
            let state = self.state.lock();
            let bound = state.bound.get(&path.endpoint).ok_or(Status::UnsupportedCluster)?;
            let command = self.spec.command(path.command).ok_or(Status::UnsupportedCommand)?;
            (
                bound.node_id.clone(),
                bound.device_endpoint,
                bound.supported.contains(command.name),
            )
        };
        let command = self.spec.command(path.command).ok_or(Status::UnsupportedCommand)?;
        if !supported {
            debug!(
                node_id = %node_id,
                command = command.name,
                "Command not in the device's supported set"
            );
            return Err(Status::UnsupportedCommand);
        }

        let body = encode_fields(command.fields, fields)?;
        let topic = self
            .ctx
            .topics
            .command(&node_id, device_endpoint, self.spec.device_name, command.name);
        self.ctx
            .publish_json(&topic, &body)
            .map(|()| None)
            .map_err(|_| Status::Failure)
    }

    fn invoke_group(
        &self,
        ctx: &InvokeContext,
        group: GroupId,
        command: CommandId,
        fields: &CommandFields,
    ) -> Status {
        let command = match self.spec.command(command) {
            Some(command) => command,
            None => return Status::UnsupportedCommand,
        };
        let device_group = match self.groups.get_device_group(ctx.fabric_index, group) {
            Ok(device_group) => device_group,
            Err(e) => return e.status(),
        };
        let body = match encode_fields(command.fields, fields) {
            Ok(body) => body,
            Err(status) => return status,
        };
        let topic = self
            .ctx
            .topics
            .group_command(device_group.0, self.spec.device_name, command.name);
        match self.ctx.publish_json(&topic, &body) {
            Ok(()) => Status::Success,
            Err(_) => Status::Failure,
        }
    }

    fn on_device_response(
        &self,
        node_id: &str,
        device_endpoint: u8,
        command: &str,
        payload: &[u8],
    ) -> ReportOutcome {
        let response = match self.spec.command_by_name(command).and_then(|cmd| cmd.response) {
            Some(response) => response,
            None => return ReportOutcome::Ignored,
        };
        let endpoint = match self.ctx.map.lookup(node_id, device_endpoint) {
            Some(endpoint) if self.state.lock().bound.contains_key(&endpoint) => endpoint,
            _ => {
                self.ctx.stats.report_unmapped();
                return ReportOutcome::Ignored;
            }
        };

        let decoded = serde_json::from_slice::<Value>(payload)
            .map_err(|e| e.to_string())
            .and_then(|body| decode_fields(response.fields, &body));
        match decoded {
            Ok(fields) => {
                let path = CommandPath::new(endpoint, self.spec.id, response.id);
                self.ctx.fabric.command_response(&path, &fields);
                ReportOutcome::Applied
            }
            Err(reason) => {
                self.ctx.stats.report_malformed();
                warn!(
                    node_id = %node_id,
                    endpoint = device_endpoint,
                    response = response.name,
                    "Dropping malformed command response: {}",
                    reason
                );
                ReportOutcome::Rejected
            }
        }
    }
}
