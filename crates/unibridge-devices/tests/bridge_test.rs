//! End-to-end tests of the bridge over the in-memory transport and fabric.

use std::sync::Arc;
use std::thread;

use serde_json::json;
use tokio::sync::mpsc;
use unibridge_core::config::BridgeConfig;
use unibridge_core::event::BridgeEvent;
use unibridge_core::storage::StorageBackend;
use unibridge_devices::{
    AttributeId, AttributePath, Bridge, BridgeError, ClusterId, CommandFields, CommandId, CommandPath,
    EndpointId, EndpointState, FabricIndex, FabricValue, GroupId, InMemoryFabric, InMemoryTransport,
    IncomingMessage, InvokeContext, Status,
};
use unibridge_storage::{MemoryBackend, RedbBackend};

const ON_OFF: ClusterId = ClusterId(0x0006);
const GROUPS: ClusterId = ClusterId(0x0004);
const DOOR_LOCK: ClusterId = ClusterId(0x0101);
const LEVEL_CONTROL: ClusterId = ClusterId(0x0008);
const TEMPERATURE: ClusterId = ClusterId(0x0402);
const MEASURED_VALUE: AttributeId = AttributeId(0x0000);

struct Harness {
    bridge: Arc<Bridge>,
    transport: Arc<InMemoryTransport>,
    fabric: Arc<InMemoryFabric>,
}

impl Harness {
    fn new() -> Self {
        Self::with(BridgeConfig::default(), Arc::new(MemoryBackend::new()))
    }

    fn with(config: BridgeConfig, storage: Arc<dyn StorageBackend>) -> Self {
        let transport = Arc::new(InMemoryTransport::new());
        let fabric = Arc::new(InMemoryFabric::new());
        let bridge = Arc::new(Bridge::new(config, transport.clone(), fabric.clone(), storage).unwrap());
        bridge.start().unwrap();
        Self {
            bridge,
            transport,
            fabric,
        }
    }

    fn send(&self, topic: &str, payload: &str) {
        deliver(&self.bridge, topic, payload);
    }

    fn online(&self, node: &str) {
        self.send(
            &format!("by-id/{}/State", node),
            r#"{"NetworkStatus":"Online functional"}"#,
        );
    }

    fn declare(&self, node: &str, ep: u8, cluster: &str, commands: &[&str]) {
        self.send(
            &format!("by-id/{}/ep{}/{}/SupportedCommands", node, ep, cluster),
            &json!({ "value": commands }).to_string(),
        );
    }

    fn report(&self, node: &str, ep: u8, cluster: &str, attribute: &str, payload: &str) {
        self.send(
            &format!(
                "by-id/{}/ep{}/{}/Attributes/{}/Reported",
                node, ep, cluster, attribute
            ),
            payload,
        );
    }

    fn endpoint(&self, node: &str, ep: u8) -> EndpointId {
        self.bridge.monitor().lookup(node, ep).unwrap()
    }

    /// A light with OnOff and Groups on ep1.
    fn light(&self, node: &str) -> EndpointId {
        self.online(node);
        self.declare(node, 1, "OnOff", &["On", "Off"]);
        self.declare(node, 1, "Groups", &["AddGroup", "RemoveGroup", "RemoveAllGroups"]);
        self.endpoint(node, 1)
    }

    fn add_group(&self, endpoint: EndpointId, group: u16, name: &str) -> CommandFields {
        let mut fields = CommandFields::new();
        fields.insert("GroupID".into(), FabricValue::from(group));
        fields.insert("GroupName".into(), FabricValue::from(name));
        self.bridge
            .invoke(
                &InvokeContext::new(1),
                &CommandPath::new(endpoint, GROUPS, CommandId(0x00)),
                &fields,
            )
            .unwrap()
            .unwrap()
    }
}

fn deliver(bridge: &Bridge, topic: &str, payload: &str) {
    bridge.handle_message(&IncomingMessage::new(topic, payload.as_bytes()));
}

#[test]
fn test_start_subscribes_discovery_topics() {
    let h = Harness::new();
    assert!(h.transport.is_subscribed("by-id/+/State"));
    assert!(h.transport.is_subscribed("by-id/+/+/+/SupportedCommands"));

    let mut config = BridgeConfig::default();
    config.topics.root = Some("ucl".into());
    let h = Harness::with(config, Arc::new(MemoryBackend::new()));
    assert!(h.transport.is_subscribed("ucl/by-id/+/State"));
}

#[test]
fn test_temperature_report_reaches_fabric() {
    let h = Harness::new();
    h.online("temp-1");
    h.declare("temp-1", 1, "TemperatureMeasurement", &[]);
    let ep = h.endpoint("temp-1", 1);
    assert_eq!(ep, EndpointId(2));
    assert!(h
        .transport
        .is_subscribed("by-id/temp-1/ep1/TemperatureMeasurement/Attributes/MeasuredValue/Reported"));

    let path = AttributePath::new(ep, TEMPERATURE, MEASURED_VALUE);
    assert_eq!(h.bridge.read(&path), Err(Status::NotFound));

    h.report("temp-1", 1, "TemperatureMeasurement", "MeasuredValue", r#"{"value":55}"#);
    assert_eq!(h.bridge.read(&path), Ok(FabricValue::Int(55)));
    assert_eq!(h.fabric.attribute(&path), Some(FabricValue::Int(55)));

    // Malformed input leaves the cache alone.
    h.report("temp-1", 1, "TemperatureMeasurement", "MeasuredValue", r#"{"value":"hot"}"#);
    h.report("temp-1", 1, "TemperatureMeasurement", "MeasuredValue", "{not json");
    assert_eq!(h.bridge.read(&path), Ok(FabricValue::Int(55)));

    let stats = h.bridge.stats();
    assert_eq!(stats.reports_applied, 1);
    assert_eq!(stats.reports_malformed, 2);
    assert_eq!(stats.endpoints_exposed, 1);

    // Empty payload clears the value.
    h.report("temp-1", 1, "TemperatureMeasurement", "MeasuredValue", "");
    assert_eq!(h.bridge.read(&path), Err(Status::NotFound));
}

#[test]
fn test_read_status_mapping() {
    let h = Harness::new();
    h.online("temp-1");
    h.declare("temp-1", 1, "TemperatureMeasurement", &[]);
    let ep = h.endpoint("temp-1", 1);

    assert_eq!(
        h.bridge.read(&AttributePath::new(ep, ClusterId(0x9999), MEASURED_VALUE)),
        Err(Status::UnsupportedCluster)
    );
    assert_eq!(
        h.bridge.read(&AttributePath::new(EndpointId(40), TEMPERATURE, MEASURED_VALUE)),
        Err(Status::UnsupportedEndpoint)
    );
    assert_eq!(
        h.bridge.read(&AttributePath::new(ep, ON_OFF, AttributeId(0))),
        Err(Status::UnsupportedAttribute)
    );
    assert_eq!(
        h.bridge.read(&AttributePath::new(ep, TEMPERATURE, AttributeId(0x4242))),
        Err(Status::UnsupportedAttribute)
    );
    assert!(h
        .bridge
        .read(&AttributePath::new(ep, TEMPERATURE, AttributeId(0xFFFD)))
        .is_ok());
}

#[test]
fn test_reports_for_unknown_input_are_dropped() {
    let h = Harness::new();
    h.report("ghost", 1, "TemperatureMeasurement", "MeasuredValue", r#"{"value":1}"#);
    h.report("ghost", 1, "ConfigurationParameters", "Foo", r#"{"value":1}"#);
    h.send("by-id/ghost/ep1/OnOff/Unknown/Topic", "{}");
    h.send("some/other/topic", "{}");
    h.send("by-id/ghost/State", r#"{"NetworkStatus":"Dancing"}"#);

    let stats = h.bridge.stats();
    assert_eq!(stats.reports_applied, 0);
    assert_eq!(stats.reports_unmapped, 2);
    assert!(h.fabric.endpoints().is_empty());
}

#[test]
fn test_rediscovery_is_idempotent() {
    let h = Harness::new();
    for _ in 0..3 {
        h.online("temp-1");
        h.declare("temp-1", 1, "TemperatureMeasurement", &[]);
    }
    assert_eq!(h.fabric.endpoints(), vec![EndpointId(2)]);
    assert_eq!(h.fabric.registration_count(), 1);
    assert_eq!(h.bridge.stats().endpoints_exposed, 1);
}

#[test]
fn test_node_removal_tears_down_endpoints() {
    let h = Harness::new();
    h.online("temp-1");
    h.declare("temp-1", 1, "TemperatureMeasurement", &[]);
    h.declare("temp-1", 2, "OccupancySensing", &[]);
    let ep = h.endpoint("temp-1", 1);

    h.send("by-id/temp-1/State", "");
    assert!(matches!(
        h.bridge.monitor().lookup("temp-1", 1),
        Err(BridgeError::NotFound(_))
    ));
    assert_eq!(
        h.bridge.monitor().endpoint_state("temp-1", 2),
        EndpointState::Removed
    );
    assert_eq!(
        h.bridge.read(&AttributePath::new(ep, TEMPERATURE, MEASURED_VALUE)),
        Err(Status::UnsupportedEndpoint)
    );
    assert!(h.fabric.endpoints().is_empty());
    assert_eq!(h.bridge.stats().endpoints_removed, 2);

    // Freed ids are reused lowest first.
    h.online("temp-2");
    h.declare("temp-2", 1, "TemperatureMeasurement", &[]);
    assert_eq!(h.endpoint("temp-2", 1), EndpointId(2));
}

#[test]
fn test_withdrawn_cluster_clears_fabric_store() {
    let h = Harness::new();
    h.online("zw-1");
    h.declare("zw-1", 1, "OnOff", &["On", "Off"]);
    h.declare("zw-1", 1, "Level", &["MoveToLevel"]);
    let ep = h.endpoint("zw-1", 1);
    let current = AttributePath::new(ep, LEVEL_CONTROL, AttributeId(0x0000));

    h.report("zw-1", 1, "Level", "CurrentLevel", r#"{"value":42}"#);
    assert_eq!(h.fabric.attribute(&current), Some(FabricValue::Uint(42)));

    h.send("by-id/zw-1/ep1/Level/SupportedCommands", "");
    assert_eq!(h.endpoint("zw-1", 1), ep);
    assert!(!h.fabric.descriptor(ep).unwrap().clusters.contains(&LEVEL_CONTROL));
    assert_eq!(h.fabric.attribute(&current), None);
    assert_eq!(h.bridge.read(&current), Err(Status::UnsupportedAttribute));
}

#[test]
fn test_concurrent_reports_churn_and_fabric_access() {
    const ROUNDS: i64 = 200;
    let h = Harness::new();
    let sensors = ["temp-0", "temp-1", "temp-2", "temp-3"];
    for node in sensors {
        h.online(node);
        h.declare(node, 1, "TemperatureMeasurement", &[]);
    }
    h.online("dim-1");
    h.declare("dim-1", 1, "OnOff", &["On", "Off"]);
    h.declare("dim-1", 1, "Level", &["MoveToLevel"]);
    let dimmer = h.endpoint("dim-1", 1);

    let mut workers = Vec::new();
    for node in sensors {
        let bridge = h.bridge.clone();
        workers.push(thread::spawn(move || {
            let topic = format!(
                "by-id/{}/ep1/TemperatureMeasurement/Attributes/MeasuredValue/Reported",
                node
            );
            for n in 0..ROUNDS {
                deliver(&bridge, &topic, &json!({ "value": n }).to_string());
            }
        }));
    }

    let bridge = h.bridge.clone();
    workers.push(thread::spawn(move || {
        for _ in 0..50 {
            deliver(&bridge, "by-id/churn-1/State", r#"{"NetworkStatus":"Online functional"}"#);
            deliver(&bridge, "by-id/churn-1/ep1/OnOff/SupportedCommands", r#"{"value":["On"]}"#);
            deliver(&bridge, "by-id/churn-1/ep1/OnOff/Attributes/OnOff/Reported", r#"{"value":true}"#);
            deliver(&bridge, "by-id/churn-1/State", "");
        }
    }));

    let bridge = h.bridge.clone();
    workers.push(thread::spawn(move || {
        for n in 0..ROUNDS {
            let on_level = AttributePath::new(dimmer, LEVEL_CONTROL, AttributeId(0x0011));
            assert_eq!(bridge.write(&on_level, &FabricValue::Uint(n as u64)), Status::Success);
        }
    }));

    let bridge = h.bridge.clone();
    workers.push(thread::spawn(move || {
        for _ in 0..ROUNDS {
            for id in 2..=8 {
                for path in [
                    AttributePath::new(EndpointId(id), TEMPERATURE, MEASURED_VALUE),
                    AttributePath::new(EndpointId(id), ON_OFF, AttributeId(0x0000)),
                ] {
                    let result = bridge.read(&path);
                    assert!(
                        matches!(
                            result,
                            Ok(FabricValue::Int(_))
                                | Ok(FabricValue::Bool(_))
                                | Err(Status::NotFound)
                                | Err(Status::UnsupportedEndpoint)
                                | Err(Status::UnsupportedAttribute)
                        ),
                        "unexpected read of {:?}: {:?}",
                        path,
                        result
                    );
                }
            }
        }
    }));

    for worker in workers {
        worker.join().unwrap();
    }

    for node in sensors {
        let path = AttributePath::new(h.endpoint(node, 1), TEMPERATURE, MEASURED_VALUE);
        assert_eq!(h.bridge.read(&path), Ok(FabricValue::Int(ROUNDS - 1)));
        assert_eq!(h.fabric.attribute(&path), Some(FabricValue::Int(ROUNDS - 1)));
    }
    assert!(h.bridge.monitor().lookup("churn-1", 1).is_err());
    assert_eq!(h.fabric.endpoints().len(), sensors.len() + 1);
    assert_eq!(
        h.transport.last_json("by-id/dim-1/ep1/Level/Commands/WriteAttributes"),
        Some(json!({ "OnLevel": ROUNDS - 1 }))
    );
}

#[test]
fn test_allocation_exhaustion() {
    let mut config = BridgeConfig::default();
    config.endpoints.capacity = 1;
    let h = Harness::with(config, Arc::new(MemoryBackend::new()));

    h.online("a");
    h.declare("a", 1, "OnOff", &["On"]);
    h.online("b");
    h.declare("b", 1, "OnOff", &["On"]);

    assert!(h.bridge.monitor().lookup("a", 1).is_ok());
    assert!(h.bridge.monitor().lookup("b", 1).is_err());
    assert_eq!(h.fabric.endpoints().len(), 1);
}

#[test]
fn test_registration_failure_rolls_back() {
    let h = Harness::new();
    h.fabric.fail_registrations(true);
    h.online("temp-1");
    h.declare("temp-1", 1, "TemperatureMeasurement", &[]);
    assert!(h.bridge.monitor().lookup("temp-1", 1).is_err());

    h.fabric.fail_registrations(false);
    h.declare("temp-1", 1, "TemperatureMeasurement", &[]);
    assert_eq!(h.endpoint("temp-1", 1), EndpointId(2));
}

#[test]
fn test_command_invoke_publishes() {
    let h = Harness::new();
    let ep = h.light("zb-1");
    let ctx = InvokeContext::new(1);

    let result = h.bridge.invoke(
        &ctx,
        &CommandPath::new(ep, ON_OFF, CommandId(0x01)),
        &CommandFields::new(),
    );
    assert_eq!(result, Ok(None));
    assert_eq!(
        h.transport.last_json("by-id/zb-1/ep1/OnOff/Commands/On"),
        Some(json!({}))
    );

    // Toggle exists in the table but the device did not declare it.
    assert_eq!(
        h.bridge.invoke(
            &ctx,
            &CommandPath::new(ep, ON_OFF, CommandId(0x02)),
            &CommandFields::new()
        ),
        Err(Status::UnsupportedCommand)
    );

    h.transport.set_rejecting(true);
    assert_eq!(
        h.bridge.invoke(
            &ctx,
            &CommandPath::new(ep, ON_OFF, CommandId(0x01)),
            &CommandFields::new()
        ),
        Err(Status::Failure)
    );
}

#[test]
fn test_add_group_then_duplicate() {
    let h = Harness::new();
    let ep = h.light("zb-1");

    let response = h.add_group(ep, 7, "kitchen");
    assert_eq!(response["Status"], FabricValue::Uint(0));
    assert_eq!(response["GroupID"], FabricValue::from(1u16));
    assert_eq!(
        h.transport.last_json("by-id/zb-1/ep1/Groups/Commands/AddGroup"),
        Some(json!({ "GroupId": 7, "GroupName": "kitchen" }))
    );
    assert_eq!(
        h.bridge
            .group_store()
            .get_device_group(FabricIndex(1), GroupId(1))
            .unwrap(),
        GroupId(7)
    );

    let published = h.transport.published().len();
    let response = h.add_group(ep, 7, "kitchen");
    assert_eq!(
        response["Status"],
        FabricValue::Uint(u64::from(Status::DuplicateExists.code()))
    );
    assert_eq!(h.transport.published().len(), published);
}

#[test]
fn test_group_invoke_and_remove_all() {
    let h = Harness::new();
    let ep = h.light("zb-1");
    h.add_group(ep, 7, "kitchen");
    let ctx = InvokeContext::new(1);

    let status = h.bridge.invoke_group(
        &ctx,
        GroupId(1),
        ON_OFF,
        CommandId(0x01),
        &CommandFields::new(),
    );
    assert_eq!(status, Status::Success);
    assert!(h.transport.last_json("by-group/7/OnOff/Commands/On").is_some());

    // Another fabric does not see the mapping.
    assert_eq!(
        h.bridge.invoke_group(
            &InvokeContext::new(2),
            GroupId(1),
            ON_OFF,
            CommandId(0x01),
            &CommandFields::new()
        ),
        Status::NotFound
    );

    let result = h.bridge.invoke(
        &ctx,
        &CommandPath::new(ep, GROUPS, CommandId(0x04)),
        &CommandFields::new(),
    );
    assert_eq!(result, Ok(None));
    assert_eq!(
        h.transport.last_json("by-id/zb-1/ep1/Groups/Commands/RemoveGroup"),
        Some(json!({ "GroupId": 7 }))
    );
    assert_eq!(
        h.bridge.invoke_group(
            &ctx,
            GroupId(1),
            ON_OFF,
            CommandId(0x01),
            &CommandFields::new()
        ),
        Status::NotFound
    );
}

#[test]
fn test_group_mappings_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.redb");

    {
        let storage = Arc::new(RedbBackend::open(&path).unwrap());
        let h = Harness::with(BridgeConfig::default(), storage);
        let ep = h.light("zb-1");
        h.add_group(ep, 7, "kitchen");
        h.add_group(ep, 9, "hall");
    }

    let storage = Arc::new(RedbBackend::open(&path).unwrap());
    let h = Harness::with(BridgeConfig::default(), storage);
    let store = h.bridge.group_store();
    assert_eq!(
        store.get_device_group(FabricIndex(1), GroupId(1)).unwrap(),
        GroupId(7)
    );
    assert_eq!(
        store.get_device_group(FabricIndex(1), GroupId(2)).unwrap(),
        GroupId(9)
    );

    // The counter continues past restored ids.
    let ep = h.light("zb-1");
    let response = h.add_group(ep, 11, "porch");
    assert_eq!(response["GroupID"], FabricValue::from(3u16));
}

#[test]
fn test_command_response_delivered() {
    let h = Harness::new();
    h.online("lock-1");
    h.declare("lock-1", 1, "DoorLock", &["LockDoor", "GetUser"]);
    let ep = h.endpoint("lock-1", 1);
    assert!(h
        .transport
        .is_subscribed("by-id/lock-1/ep1/DoorLock/Commands/GetUserResponse"));

    h.send(
        "by-id/lock-1/ep1/DoorLock/Commands/GetUserResponse",
        r#"{"UserIndex":1,"UserName":"anna"}"#,
    );
    let responses = h.fabric.command_responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].0, CommandPath::new(ep, DOOR_LOCK, CommandId(0x1C)));
    assert_eq!(responses[0].1["UserName"], FabricValue::from("anna"));
}

#[test]
fn test_events_published() {
    let h = Harness::new();
    let mut rx = h.bridge.events().subscribe();
    h.online("temp-1");
    h.declare("temp-1", 1, "TemperatureMeasurement", &[]);
    h.report("temp-1", 1, "TemperatureMeasurement", "MeasuredValue", r#"{"value":21}"#);

    let mut names = Vec::new();
    while let Some((event, _)) = rx.try_recv() {
        names.push(event.type_name());
        if let BridgeEvent::EndpointExposed { fabric_endpoint, .. } = event {
            assert_eq!(fabric_endpoint, 2);
        }
    }
    assert!(names.contains(&"NodeDiscovered"));
    assert!(names.contains(&"EndpointExposed"));
    assert!(names.contains(&"AttributeUpdated"));
}

#[tokio::test]
async fn test_run_consumes_channel_in_order() {
    let h = Harness::new();
    let (tx, rx) = mpsc::channel(16);

    let messages = [
        ("by-id/temp-1/State", r#"{"NetworkStatus":"Online functional"}"#),
        (
            "by-id/temp-1/ep1/TemperatureMeasurement/SupportedCommands",
            r#"{"value":[]}"#,
        ),
        (
            "by-id/temp-1/ep1/TemperatureMeasurement/Attributes/MeasuredValue/Reported",
            r#"{"value":18}"#,
        ),
        (
            "by-id/temp-1/ep1/TemperatureMeasurement/Attributes/MeasuredValue/Reported",
            r#"{"value":19}"#,
        ),
    ];
    for (topic, payload) in messages {
        tx.send(IncomingMessage::new(topic, payload.as_bytes()))
            .await
            .unwrap();
    }
    drop(tx);

    h.bridge.run(rx).await;

    let ep = h.endpoint("temp-1", 1);
    assert_eq!(
        h.bridge.read(&AttributePath::new(ep, TEMPERATURE, MEASURED_VALUE)),
        Ok(FabricValue::Int(19))
    );
}
