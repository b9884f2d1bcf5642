//! Groups cluster command translator.

use super::store::GroupStore;
use crate::capability::tables::ids;
use crate::commands::{CommandTranslator, InvokeResult};
use crate::error::{BridgeError, Result};
use crate::fabric::{ClusterId, CommandFields, CommandPath, EndpointId, FabricIndex, FabricValue, GroupId, InvokeContext, Status};
use crate::translators::{ClusterBinding, EndpointBinding, TranslatorContext};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use unibridge_core::event::{now, BridgeEvent};

pub const MAX_GROUP_NAME_LEN: usize = 16;

const DEVICE_CLUSTER: &str = "Groups";

const ADD_GROUP: u32 = 0x00;
const VIEW_GROUP: u32 = 0x01;
const GET_GROUP_MEMBERSHIP: u32 = 0x02;
const REMOVE_GROUP: u32 = 0x03;
const REMOVE_ALL_GROUPS: u32 = 0x04;
const ADD_GROUP_IF_IDENTIFYING: u32 = 0x05;

/// Capacity reported when more than this many ids remain.
const MAX_REPORTED_CAPACITY: usize = 0xFE;

#[derive(Debug)]
struct GroupBound {
    node_id: String,
    device_endpoint: u8,
}

/// Translates Groups cluster commands and keeps the [`GroupStore`] in step.
///
/// The GroupID carried by AddGroup names the device-network group; the
/// response returns the fabric group id allocated for it. Every other
/// command addresses groups by fabric group id.
pub struct GroupTranslator {
    ctx: TranslatorContext,
    store: Arc<GroupStore>,
    bound: Mutex<HashMap<EndpointId, GroupBound>>,
}

fn status_field(status: Status) -> FabricValue {
    FabricValue::Uint(u64::from(status.code()))
}

fn response(status: Status, group: GroupId) -> CommandFields {
    let mut fields = CommandFields::new();
    fields.insert("Status".to_string(), status_field(status));
    fields.insert("GroupID".to_string(), FabricValue::from(group.0));
    fields
}

fn group_field(fields: &CommandFields) -> std::result::Result<GroupId, Status> {
    let raw = fields
        .get("GroupID")
        .and_then(FabricValue::as_u64)
        .ok_or(Status::InvalidCommand)?;
    match u16::try_from(raw) {
        Ok(0) | Err(_) => Err(Status::ConstraintError),
        Ok(id) => Ok(GroupId(id)),
    }
}

fn name_field(fields: &CommandFields) -> std::result::Result<String, Status> {
    match fields.get("GroupName") {
        None => Ok(String::new()),
        Some(FabricValue::Str(name)) if name.chars().count() > MAX_GROUP_NAME_LEN => {
            Err(Status::ConstraintError)
        }
        Some(FabricValue::Str(name)) => Ok(name.clone()),
        Some(_) => Err(Status::InvalidCommand),
    }
}

impl GroupTranslator {
    pub fn new(ctx: TranslatorContext, store: Arc<GroupStore>) -> Self {
        Self {
            ctx,
            store,
            bound: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<GroupStore> {
        &self.store
    }

    fn publish(&self, target: &GroupBound, command: &str, body: serde_json::Value) -> std::result::Result<(), Status> {
        let topic = self
            .ctx
            .topics
            .command(&target.node_id, target.device_endpoint, DEVICE_CLUSTER, command);
        self.ctx.publish_json(&topic, &body).map_err(|_| Status::Failure)
    }

    fn add_group(&self, fabric_index: FabricIndex, target: &GroupBound, fields: &CommandFields) -> std::result::Result<CommandFields, Status> {
        let device_group = group_field(fields)?;
        let name = name_field(fields)?;

        if let Err(e) = self.store.check_can_add(fabric_index, device_group) {
            debug!(device_group = device_group.0, "AddGroup refused: {}", e);
            return Ok(response(e.status(), device_group));
        }

        self.publish(
            target,
            "AddGroup",
            json!({ "GroupId": device_group.0, "GroupName": name }),
        )?;

        match self.store.add_mapping(fabric_index, device_group, &name) {
            Ok(fabric_group) => {
                info!(
                    fabric_index = fabric_index.0,
                    fabric_group = fabric_group.0,
                    device_group = device_group.0,
                    "Group mapped"
                );
                self.ctx.emit(BridgeEvent::GroupMapped {
                    fabric_index: fabric_index.0,
                    fabric_group: fabric_group.0,
                    device_group: device_group.0,
                    timestamp: now(),
                });
                Ok(response(Status::Success, fabric_group))
            }
            Err(e) => Ok(response(e.status(), device_group)),
        }
    }

    fn view_group(&self, fabric_index: FabricIndex, fields: &CommandFields) -> std::result::Result<CommandFields, Status> {
        let fabric_group = group_field(fields)?;
        let mut fields = match self.store.mapping(fabric_index, fabric_group) {
            Some(mapping) => {
                let mut fields = response(Status::Success, fabric_group);
                fields.insert("GroupName".to_string(), FabricValue::Str(mapping.name));
                fields
            }
            None => response(Status::NotFound, fabric_group),
        };
        fields.entry("GroupName".to_string()).or_insert_with(|| FabricValue::Str(String::new()));
        Ok(fields)
    }

    fn group_membership(&self, fabric_index: FabricIndex, fields: &CommandFields) -> std::result::Result<CommandFields, Status> {
        let requested: Vec<u64> = match fields.get("GroupList") {
            None => Vec::new(),
            Some(FabricValue::List(items)) => items
                .iter()
                .map(|item| item.as_u64().ok_or(Status::InvalidCommand))
                .collect::<std::result::Result<_, _>>()?,
            Some(_) => return Err(Status::InvalidCommand),
        };

        let groups: Vec<FabricValue> = self
            .store
            .mappings(fabric_index)
            .into_iter()
            .map(|m| u64::from(m.fabric_group.0))
            .filter(|id| requested.is_empty() || requested.contains(id))
            .map(FabricValue::Uint)
            .collect();

        let capacity = self.store.remaining(fabric_index).min(MAX_REPORTED_CAPACITY);
        let mut out = CommandFields::new();
        out.insert("Capacity".to_string(), FabricValue::Uint(capacity as u64));
        out.insert("GroupList".to_string(), FabricValue::List(groups));
        Ok(out)
    }

    fn remove_group(&self, fabric_index: FabricIndex, target: &GroupBound, fields: &CommandFields) -> std::result::Result<CommandFields, Status> {
        let fabric_group = group_field(fields)?;
        let device_group = match self.store.get_device_group(fabric_index, fabric_group) {
            Ok(group) => group,
            Err(_) => return Ok(response(Status::NotFound, fabric_group)),
        };

        // The device stays in the group while another fabric maps it.
        if !self.store.mapped_elsewhere(fabric_index, device_group) {
            self.publish(target, "RemoveGroup", json!({ "GroupId": device_group.0 }))?;
        }
        match self.store.remove_mapping(fabric_index, device_group) {
            Ok(_) => {
                self.ctx.emit(BridgeEvent::GroupUnmapped {
                    fabric_index: fabric_index.0,
                    fabric_group: fabric_group.0,
                    device_group: device_group.0,
                    timestamp: now(),
                });
                Ok(response(Status::Success, fabric_group))
            }
            Err(e) => Ok(response(e.status(), fabric_group)),
        }
    }

    fn remove_all(&self, fabric_index: FabricIndex, target: &GroupBound) -> std::result::Result<(), Status> {
        for mapping in self.store.mappings(fabric_index) {
            if self.store.mapped_elsewhere(fabric_index, mapping.device_group) {
                debug!(device_group = mapping.device_group.0, "Device group shared with another fabric, kept");
                continue;
            }
            self.publish(target, "RemoveGroup", json!({ "GroupId": mapping.device_group.0 }))?;
        }
        let removed = self.store.remove_all(fabric_index).map_err(|e| e.status())?;
        for mapping in &removed {
            self.ctx.emit(BridgeEvent::GroupUnmapped {
                fabric_index: fabric_index.0,
                fabric_group: mapping.fabric_group.0,
                device_group: mapping.device_group.0,
                timestamp: now(),
            });
        }
        info!(fabric_index = fabric_index.0, removed = removed.len(), "All groups removed");
        Ok(())
    }
}

impl ClusterBinding for GroupTranslator {
    fn cluster_id(&self) -> ClusterId {
        ids::GROUPS
    }

    fn attach(&self, binding: &EndpointBinding) -> Result<()> {
        if binding.cluster.name != DEVICE_CLUSTER {
            return Err(BridgeError::Unsupported(format!(
                "cluster {} bound to the group translator",
                binding.cluster.name
            )));
        }
        self.bound.lock().insert(
            binding.fabric_endpoint,
            GroupBound {
                node_id: binding.node_id.clone(),
                device_endpoint: binding.device_endpoint,
            },
        );
        Ok(())
    }

    fn detach(&self, endpoint: EndpointId) {
        self.bound.lock().remove(&endpoint);
    }
}

impl CommandTranslator for GroupTranslator {
    fn invoke(&self, ctx: &InvokeContext, path: &CommandPath, fields: &CommandFields) -> InvokeResult {
        if path.cluster != ids::GROUPS {
            return Err(Status::UnsupportedCluster);
        }
        if !self.ctx.map.contains(path.endpoint) {
            return Err(Status::UnsupportedEndpoint);
        }
        let target = {
            let bound = self.bound.lock();
            let entry = bound.get(&path.endpoint).ok_or(Status::UnsupportedCluster)?;
            GroupBound {
                node_id: entry.node_id.clone(),
                device_endpoint: entry.device_endpoint,
            }
        };
        let fabric_index = ctx.fabric_index;

        match path.command.0 {
            ADD_GROUP => self.add_group(fabric_index, &target, fields).map(Some),
            ADD_GROUP_IF_IDENTIFYING => {
                let outcome = self.add_group(fabric_index, &target, fields)?;
                match outcome.get("Status").and_then(FabricValue::as_u64) {
                    Some(0) | None => Ok(None),
                    Some(code) => Err(Status::from_code(code as u8).unwrap_or(Status::Failure)),
                }
            }
            VIEW_GROUP => self.view_group(fabric_index, fields).map(Some),
            GET_GROUP_MEMBERSHIP => self.group_membership(fabric_index, fields).map(Some),
            REMOVE_GROUP => self.remove_group(fabric_index, &target, fields).map(Some),
            REMOVE_ALL_GROUPS => self.remove_all(fabric_index, &target).map(|()| None),
            _ => Err(Status::UnsupportedCommand),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::{CommandId, InMemoryFabric};
    use crate::model::DeviceCluster;
    use crate::node_state::EndpointMap;
    use crate::stats::BridgeStats;
    use crate::topic::TopicScheme;
    use crate::transport::InMemoryTransport;
    use unibridge_core::config::GroupSettings;
    use unibridge_storage::MemoryBackend;

    struct Fixture {
        transport: Arc<InMemoryTransport>,
        translator: GroupTranslator,
        endpoint: EndpointId,
    }

    fn fixture(settings: GroupSettings) -> Fixture {
        let map = Arc::new(EndpointMap::new(2, 16));
        let transport = Arc::new(InMemoryTransport::new());
        let ctx = TranslatorContext {
            map: map.clone(),
            transport: transport.clone(),
            fabric: Arc::new(InMemoryFabric::new()),
            topics: TopicScheme::default(),
            stats: Arc::new(BridgeStats::new()),
            events: None,
        };
        let store = Arc::new(GroupStore::open(Arc::new(MemoryBackend::new()), &settings).unwrap());
        let translator = GroupTranslator::new(ctx, store);
        let endpoint = map.allocate("zb-1", 1).unwrap();
        translator
            .attach(&EndpointBinding::new(endpoint, "zb-1", 1, DeviceCluster::new("Groups")))
            .unwrap();
        Fixture {
            transport,
            translator,
            endpoint,
        }
    }

    fn add_group(f: &Fixture, fabric: u8, group: u16, name: &str) -> InvokeResult {
        let mut fields = CommandFields::new();
        fields.insert("GroupID".into(), FabricValue::from(group));
        fields.insert("GroupName".into(), FabricValue::from(name));
        f.translator.invoke(
            &InvokeContext::new(fabric),
            &CommandPath::new(f.endpoint, ids::GROUPS, CommandId(ADD_GROUP)),
            &fields,
        )
    }

    fn status_of(result: &InvokeResult) -> u64 {
        result
            .as_ref()
            .ok()
            .and_then(|fields| fields.as_ref())
            .and_then(|fields| fields.get("Status"))
            .and_then(FabricValue::as_u64)
            .unwrap()
    }

    #[test]
    fn test_add_group_then_duplicate() {
        let f = fixture(GroupSettings::default());

        let first = add_group(&f, 1, 1, "g1");
        assert_eq!(status_of(&first), 0);
        assert_eq!(
            f.transport.last_json("by-id/zb-1/ep1/Groups/Commands/AddGroup"),
            Some(json!({"GroupId": 1, "GroupName": "g1"}))
        );
        let fabric_group = first.unwrap().unwrap()["GroupID"].as_u64().unwrap();
        assert_eq!(
            f.translator
                .store()
                .get_device_group(FabricIndex(1), GroupId(fabric_group as u16))
                .unwrap(),
            GroupId(1)
        );

        let published = f.transport.published().len();
        let second = add_group(&f, 1, 1, "g1");
        assert_eq!(status_of(&second), u64::from(Status::DuplicateExists.code()));
        assert_eq!(f.transport.published().len(), published);
    }

    #[test]
    fn test_add_group_constraints() {
        let f = fixture(GroupSettings {
            min_group_id: 1,
            max_group_id: 1,
        });
        assert_eq!(add_group(&f, 1, 1, "a-very-long-group-name"), Err(Status::ConstraintError));
        assert_eq!(add_group(&f, 1, 0, "zero"), Err(Status::ConstraintError));

        assert_eq!(status_of(&add_group(&f, 1, 1, "one")), 0);
        assert_eq!(
            status_of(&add_group(&f, 1, 2, "two")),
            u64::from(Status::ResourceExhausted.code())
        );

        f.transport.set_rejecting(true);
        assert_eq!(add_group(&f, 2, 5, "x"), Err(Status::Failure));
        assert!(f.translator.store().mappings(FabricIndex(2)).is_empty());
    }

    #[test]
    fn test_view_membership_remove() {
        let f = fixture(GroupSettings::default());
        add_group(&f, 1, 7, "hall").unwrap();
        add_group(&f, 1, 8, "").unwrap();
        let ctx = InvokeContext::new(1);
        let path = |cmd| CommandPath::new(f.endpoint, ids::GROUPS, CommandId(cmd));
        let group = |id: u16| {
            let mut fields = CommandFields::new();
            fields.insert("GroupID".into(), FabricValue::from(id));
            fields
        };

        let view = f.translator.invoke(&ctx, &path(VIEW_GROUP), &group(1)).unwrap().unwrap();
        assert_eq!(view["GroupName"], FabricValue::from("hall"));
        let missing = f.translator.invoke(&ctx, &path(VIEW_GROUP), &group(9)).unwrap().unwrap();
        assert_eq!(missing["Status"], status_field(Status::NotFound));

        let membership = f
            .translator
            .invoke(&ctx, &path(GET_GROUP_MEMBERSHIP), &CommandFields::new())
            .unwrap()
            .unwrap();
        assert_eq!(
            membership["GroupList"],
            FabricValue::List(vec![FabricValue::Uint(1), FabricValue::Uint(2)])
        );

        let removed = f.translator.invoke(&ctx, &path(REMOVE_GROUP), &group(1)).unwrap().unwrap();
        assert_eq!(removed["Status"], status_field(Status::Success));
        assert_eq!(
            f.transport.last_json("by-id/zb-1/ep1/Groups/Commands/RemoveGroup"),
            Some(json!({"GroupId": 7}))
        );
        assert_eq!(f.translator.store().get_fabric_group(FabricIndex(1), GroupId(7)), None);
    }

    #[test]
    fn test_remove_all_groups() {
        let f = fixture(GroupSettings::default());
        let path = CommandPath::new(f.endpoint, ids::GROUPS, CommandId(REMOVE_ALL_GROUPS));

        assert_eq!(
            f.translator.invoke(&InvokeContext::new(3), &path, &CommandFields::new()),
            Ok(None)
        );

        add_group(&f, 1, 1, "").unwrap();
        add_group(&f, 2, 1, "").unwrap();
        assert_eq!(
            f.translator.invoke(&InvokeContext::new(1), &path, &CommandFields::new()),
            Ok(None)
        );
        assert!(f.translator.store().mappings(FabricIndex(1)).is_empty());
        assert_eq!(f.translator.store().mappings(FabricIndex(2)).len(), 1);
        assert!(f
            .transport
            .last_json("by-id/zb-1/ep1/Groups/Commands/RemoveAllGroups")
            .is_none());
    }

    #[test]
    fn test_shared_device_group_survives_other_fabric_removal() {
        let f = fixture(GroupSettings::default());
        let remove_topic = "by-id/zb-1/ep1/Groups/Commands/RemoveGroup";
        let remove_all = CommandPath::new(f.endpoint, ids::GROUPS, CommandId(REMOVE_ALL_GROUPS));

        add_group(&f, 1, 7, "hall").unwrap();
        add_group(&f, 1, 8, "porch").unwrap();
        add_group(&f, 2, 7, "hall").unwrap();

        assert_eq!(
            f.translator.invoke(&InvokeContext::new(1), &remove_all, &CommandFields::new()),
            Ok(None)
        );
        let removals: Vec<_> = f
            .transport
            .published()
            .into_iter()
            .filter(|(topic, _)| topic == remove_topic)
            .collect();
        assert_eq!(removals.len(), 1);
        assert_eq!(f.transport.last_json(remove_topic), Some(json!({"GroupId": 8})));
        assert_eq!(
            f.translator.store().get_fabric_group(FabricIndex(2), GroupId(7)),
            Some(GroupId(1))
        );

        // Last fabric mapping the group takes the device out of it.
        let mut fields = CommandFields::new();
        fields.insert("GroupID".into(), FabricValue::from(1u16));
        let path = CommandPath::new(f.endpoint, ids::GROUPS, CommandId(REMOVE_GROUP));
        let removed = f.translator.invoke(&InvokeContext::new(2), &path, &fields).unwrap().unwrap();
        assert_eq!(removed["Status"], status_field(Status::Success));
        assert_eq!(f.transport.last_json(remove_topic), Some(json!({"GroupId": 7})));
    }

    #[test]
    fn test_remove_group_keeps_device_group_mapped_elsewhere() {
        let f = fixture(GroupSettings::default());
        add_group(&f, 1, 7, "hall").unwrap();
        add_group(&f, 2, 7, "hall").unwrap();
        let published = f.transport.published().len();

        let mut fields = CommandFields::new();
        fields.insert("GroupID".into(), FabricValue::from(1u16));
        let path = CommandPath::new(f.endpoint, ids::GROUPS, CommandId(REMOVE_GROUP));
        let removed = f.translator.invoke(&InvokeContext::new(1), &path, &fields).unwrap().unwrap();
        assert_eq!(removed["Status"], status_field(Status::Success));
        assert_eq!(f.transport.published().len(), published);
        assert_eq!(f.translator.store().get_fabric_group(FabricIndex(1), GroupId(7)), None);
        assert!(f.translator.store().get_fabric_group(FabricIndex(2), GroupId(7)).is_some());
    }

    #[test]
    fn test_unbound_and_unknown() {
        let f = fixture(GroupSettings::default());
        let ctx = InvokeContext::new(1);
        let unknown = CommandPath::new(f.endpoint, ids::GROUPS, CommandId(0x40));
        assert_eq!(
            f.translator.invoke(&ctx, &unknown, &CommandFields::new()),
            Err(Status::UnsupportedCommand)
        );
        f.translator.detach(f.endpoint);
        let view = CommandPath::new(f.endpoint, ids::GROUPS, CommandId(VIEW_GROUP));
        assert_eq!(
            f.translator.invoke(&ctx, &view, &CommandFields::new()),
            Err(Status::UnsupportedCluster)
        );
    }
}
