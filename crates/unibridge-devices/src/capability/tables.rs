//! Static cluster tables.
//!
//! Each entry maps a device-network cluster (by name) onto a fabric cluster,
//! listing the attributes and commands the bridge translates.

use super::value::{
    bitmap16, bitmap32, bitmap8, enum8, string, DataType, BOOL, S16, S8, U16, U32, U8,
};
use crate::fabric::{AttributeId, ClusterId, CommandId};

/// Fabric cluster identifiers.
pub mod ids {
    use crate::fabric::ClusterId;

    pub const IDENTIFY: ClusterId = ClusterId(0x0003);
    pub const GROUPS: ClusterId = ClusterId(0x0004);
    pub const ON_OFF: ClusterId = ClusterId(0x0006);
    pub const LEVEL_CONTROL: ClusterId = ClusterId(0x0008);
    pub const DESCRIPTOR: ClusterId = ClusterId(0x001D);
    pub const BRIDGED_DEVICE_BASIC_INFORMATION: ClusterId = ClusterId(0x0039);
    pub const DOOR_LOCK: ClusterId = ClusterId(0x0101);
    pub const THERMOSTAT: ClusterId = ClusterId(0x0201);
    pub const COLOR_CONTROL: ClusterId = ClusterId(0x0300);
    pub const ILLUMINANCE_MEASUREMENT: ClusterId = ClusterId(0x0400);
    pub const TEMPERATURE_MEASUREMENT: ClusterId = ClusterId(0x0402);
    pub const PRESSURE_MEASUREMENT: ClusterId = ClusterId(0x0403);
    pub const FLOW_MEASUREMENT: ClusterId = ClusterId(0x0404);
    pub const RELATIVE_HUMIDITY_MEASUREMENT: ClusterId = ClusterId(0x0405);
    pub const OCCUPANCY_SENSING: ClusterId = ClusterId(0x0406);
}

/// Global attributes present on every cluster.
pub const CLUSTER_REVISION: AttributeId = AttributeId(0xFFFD);
pub const FEATURE_MAP: AttributeId = AttributeId(0xFFFC);

/// Bridged Device Basic Information attributes the bridge maintains itself.
pub const REACHABLE: AttributeId = AttributeId(0x0011);
pub const UNIQUE_ID: AttributeId = AttributeId(0x0012);

/// One translated attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub id: AttributeId,
    /// Fabric attribute name.
    pub name: &'static str,
    /// Name on the device network; `None` for bridge-maintained attributes.
    pub device_name: Option<&'static str>,
    pub data_type: DataType,
    pub nullable: bool,
    pub writable: bool,
}

const fn attr(id: u32, name: &'static str, data_type: DataType) -> AttributeSpec {
    AttributeSpec {
        id: AttributeId(id),
        name,
        device_name: Some(name),
        data_type,
        nullable: false,
        writable: false,
    }
}

impl AttributeSpec {
    const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    const fn writable(self) -> Self {
        Self {
            writable: true,
            ..self
        }
    }

    const fn device(self, device_name: &'static str) -> Self {
        Self {
            device_name: Some(device_name),
            ..self
        }
    }

    const fn bridge_maintained(self) -> Self {
        Self {
            device_name: None,
            ..self
        }
    }
}

/// One typed command (or response) field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub data_type: DataType,
    pub optional: bool,
}

const fn field(name: &'static str, data_type: DataType) -> FieldSpec {
    FieldSpec {
        name,
        data_type,
        optional: false,
    }
}

impl FieldSpec {
    const fn optional(self) -> Self {
        Self {
            optional: true,
            ..self
        }
    }
}

/// Response command a device may send back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSpec {
    pub id: CommandId,
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

/// One translated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub id: CommandId,
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
    pub response: Option<&'static ResponseSpec>,
}

const fn command(id: u32, name: &'static str, fields: &'static [FieldSpec]) -> CommandSpec {
    CommandSpec {
        id: CommandId(id),
        name,
        fields,
        response: None,
    }
}

/// A translated cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterSpec {
    pub id: ClusterId,
    /// Fabric cluster name.
    pub name: &'static str,
    /// Cluster name on the device network.
    pub device_name: &'static str,
    pub revision: u16,
    pub feature_map: u32,
    /// Exposed alongside application clusters, never on its own.
    pub auxiliary: bool,
    pub attributes: &'static [AttributeSpec],
    pub commands: &'static [CommandSpec],
}

impl ClusterSpec {
    pub fn attribute(&self, id: AttributeId) -> Option<&'static AttributeSpec> {
        self.attributes.iter().find(|a| a.id == id)
    }

    pub fn attribute_by_device_name(&self, name: &str) -> Option<&'static AttributeSpec> {
        self.attributes
            .iter()
            .find(|a| a.device_name == Some(name))
    }

    pub fn command(&self, id: CommandId) -> Option<&'static CommandSpec> {
        self.commands.iter().find(|c| c.id == id)
    }

    pub fn command_by_name(&self, name: &str) -> Option<&'static CommandSpec> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn has_responses(&self) -> bool {
        self.commands.iter().any(|c| c.response.is_some())
    }
}

const OPTIONS: &[(&str, u32)] = &[("ExecuteIfOff", 0x01), ("CoupleColorTempToLevel", 0x02)];
const OPTION_FIELDS_MASK: FieldSpec = field("OptionsMask", bitmap8(OPTIONS)).optional();
const OPTION_FIELDS_OVERRIDE: FieldSpec = field("OptionsOverride", bitmap8(OPTIONS)).optional();

// ---------------------------------------------------------------------------
// Identify

static IDENTIFY_ATTRIBUTES: [AttributeSpec; 2] = [
    attr(0x0000, "IdentifyTime", U16).writable(),
    attr(
        0x0001,
        "IdentifyType",
        enum8(&[
            ("None", 0),
            ("LightOutput", 1),
            ("VisibleIndicator", 2),
            ("AudibleBeep", 3),
            ("Display", 4),
            ("Actuator", 5),
        ]),
    ),
];

static IDENTIFY_COMMANDS: [CommandSpec; 1] =
    [command(0x00, "Identify", &[field("IdentifyTime", U16)])];

// ---------------------------------------------------------------------------
// Groups

static GROUPS_ATTRIBUTES: [AttributeSpec; 1] =
    [attr(0x0000, "NameSupport", bitmap8(&[("GroupNames", 0x80)]))];

static GROUPS_COMMANDS: [CommandSpec; 6] = [
    command(
        0x00,
        "AddGroup",
        &[field("GroupID", U16), field("GroupName", string(16)).optional()],
    ),
    command(0x01, "ViewGroup", &[field("GroupID", U16)]),
    command(0x02, "GetGroupMembership", &[]),
    command(0x03, "RemoveGroup", &[field("GroupID", U16)]),
    command(0x04, "RemoveAllGroups", &[]),
    command(
        0x05,
        "AddGroupIfIdentifying",
        &[field("GroupID", U16), field("GroupName", string(16)).optional()],
    ),
];

// ---------------------------------------------------------------------------
// On/Off

static ON_OFF_ATTRIBUTES: [AttributeSpec; 5] = [
    attr(0x0000, "OnOff", BOOL),
    attr(0x4000, "GlobalSceneControl", BOOL),
    attr(0x4001, "OnTime", U16).writable(),
    attr(0x4002, "OffWaitTime", U16).writable(),
    attr(
        0x4003,
        "StartUpOnOff",
        enum8(&[("SetOnOffTo0", 0), ("SetOnOffTo1", 1), ("TogglePreviousOnOff", 2)]),
    )
    .nullable()
    .writable(),
];

static ON_OFF_COMMANDS: [CommandSpec; 6] = [
    command(0x00, "Off", &[]),
    command(0x01, "On", &[]),
    command(0x02, "Toggle", &[]),
    command(
        0x40,
        "OffWithEffect",
        &[
            field(
                "EffectIdentifier",
                enum8(&[("DelayedAllOff", 0), ("DyingLight", 1)]),
            ),
            field("EffectVariant", U8),
        ],
    ),
    command(0x41, "OnWithRecallGlobalScene", &[]),
    command(
        0x42,
        "OnWithTimedOff",
        &[
            field("OnOffControl", bitmap8(&[("AcceptOnlyWhenOn", 0x01)])),
            field("OnTime", U16),
            field("OffWaitTime", U16),
        ],
    ),
];

// ---------------------------------------------------------------------------
// Level control

const MOVE_MODE: DataType = enum8(&[("Up", 0), ("Down", 1)]);

static LEVEL_ATTRIBUTES: [AttributeSpec; 7] = [
    attr(0x0000, "CurrentLevel", U8).nullable(),
    attr(0x0001, "RemainingTime", U16),
    attr(0x0002, "MinLevel", U8),
    attr(0x0003, "MaxLevel", U8),
    attr(0x000F, "Options", bitmap8(OPTIONS)).writable(),
    attr(0x0010, "OnOffTransitionTime", U16).writable(),
    attr(0x0011, "OnLevel", U8).nullable().writable(),
];

static LEVEL_COMMANDS: [CommandSpec; 8] = [
    command(
        0x00,
        "MoveToLevel",
        &[
            field("Level", U8),
            field("TransitionTime", U16),
            OPTION_FIELDS_MASK,
            OPTION_FIELDS_OVERRIDE,
        ],
    ),
    command(
        0x01,
        "Move",
        &[
            field("MoveMode", MOVE_MODE),
            field("Rate", U8),
            OPTION_FIELDS_MASK,
            OPTION_FIELDS_OVERRIDE,
        ],
    ),
    command(
        0x02,
        "Step",
        &[
            field("StepMode", MOVE_MODE),
            field("StepSize", U8),
            field("TransitionTime", U16),
            OPTION_FIELDS_MASK,
            OPTION_FIELDS_OVERRIDE,
        ],
    ),
    command(0x03, "Stop", &[OPTION_FIELDS_MASK, OPTION_FIELDS_OVERRIDE]),
    command(
        0x04,
        "MoveToLevelWithOnOff",
        &[
            field("Level", U8),
            field("TransitionTime", U16),
            OPTION_FIELDS_MASK,
            OPTION_FIELDS_OVERRIDE,
        ],
    ),
    command(
        0x05,
        "MoveWithOnOff",
        &[
            field("MoveMode", MOVE_MODE),
            field("Rate", U8),
            OPTION_FIELDS_MASK,
            OPTION_FIELDS_OVERRIDE,
        ],
    ),
    command(
        0x06,
        "StepWithOnOff",
        &[
            field("StepMode", MOVE_MODE),
            field("StepSize", U8),
            field("TransitionTime", U16),
            OPTION_FIELDS_MASK,
            OPTION_FIELDS_OVERRIDE,
        ],
    ),
    command(
        0x07,
        "StopWithOnOff",
        &[OPTION_FIELDS_MASK, OPTION_FIELDS_OVERRIDE],
    ),
];

// ---------------------------------------------------------------------------
// Bridged Device Basic Information, fed by the device-network Basic cluster

static BASIC_ATTRIBUTES: [AttributeSpec; 14] = [
    attr(0x0001, "VendorName", string(32)).device("ManufacturerName"),
    attr(0x0003, "ProductName", string(32)).device("ModelIdentifier"),
    attr(0x0005, "NodeLabel", string(32))
        .device("LocationDescription")
        .writable(),
    attr(0x0007, "HardwareVersion", U16).device("HWVersion"),
    attr(0x0008, "HardwareVersionString", string(64)).bridge_maintained(),
    attr(0x0009, "SoftwareVersion", U32).device("ApplicationVersion"),
    attr(0x000A, "SoftwareVersionString", string(64)).device("SWBuildID"),
    attr(0x000B, "ManufacturingDate", string(16)).device("DateCode"),
    attr(0x000C, "PartNumber", string(32)).device("ProductCode"),
    attr(0x000D, "ProductURL", string(256)),
    attr(0x000E, "ProductLabel", string(64)),
    attr(0x000F, "SerialNumber", string(32)),
    attr(0x0011, "Reachable", BOOL).bridge_maintained(),
    attr(0x0012, "UniqueID", string(32)).bridge_maintained(),
];

// ---------------------------------------------------------------------------
// Door lock

const USER_STATUS: DataType = enum8(&[("Available", 0), ("OccupiedEnabled", 1), ("OccupiedDisabled", 3)]);
const USER_TYPE: DataType = enum8(&[
    ("UnrestrictedUser", 0),
    ("YearDayScheduleUser", 1),
    ("WeekDayScheduleUser", 2),
    ("ProgrammingUser", 3),
    ("NonAccessUser", 4),
]);

static DOOR_LOCK_ATTRIBUTES: [AttributeSpec; 6] = [
    attr(
        0x0000,
        "LockState",
        enum8(&[("NotFullyLocked", 0), ("Locked", 1), ("Unlocked", 2)]),
    )
    .nullable(),
    attr(
        0x0001,
        "LockType",
        enum8(&[
            ("DeadBolt", 0),
            ("Magnetic", 1),
            ("Other", 2),
            ("Mortise", 3),
            ("Rim", 4),
            ("LatchBolt", 5),
        ]),
    ),
    attr(0x0002, "ActuatorEnabled", BOOL),
    attr(
        0x0003,
        "DoorState",
        enum8(&[
            ("DoorOpen", 0),
            ("DoorClosed", 1),
            ("DoorJammed", 2),
            ("DoorForcedOpen", 3),
            ("DoorUnspecifiedError", 4),
            ("DoorAjar", 5),
        ]),
    )
    .nullable(),
    attr(0x0023, "AutoRelockTime", U32).writable(),
    attr(
        0x0025,
        "OperatingMode",
        enum8(&[
            ("Normal", 0),
            ("Vacation", 1),
            ("Privacy", 2),
            ("NoRemoteLockUnlock", 3),
            ("Passage", 4),
        ]),
    )
    .writable(),
];

static GET_USER_RESPONSE: ResponseSpec = ResponseSpec {
    id: CommandId(0x1C),
    name: "GetUserResponse",
    fields: &[
        field("UserIndex", U16),
        field("UserName", string(10)).optional(),
        field("UserUniqueID", U32).optional(),
        field("UserStatus", USER_STATUS).optional(),
        field("UserType", USER_TYPE).optional(),
        field("NextUserIndex", U16).optional(),
    ],
};

static DOOR_LOCK_COMMANDS: [CommandSpec; 4] = [
    command(0x00, "LockDoor", &[field("PINCode", string(8)).optional()]),
    command(0x01, "UnlockDoor", &[field("PINCode", string(8)).optional()]),
    command(
        0x03,
        "UnlockWithTimeout",
        &[field("Timeout", U16), field("PINCode", string(8)).optional()],
    ),
    CommandSpec {
        id: CommandId(0x1B),
        name: "GetUser",
        fields: &[field("UserIndex", U16)],
        response: Some(&GET_USER_RESPONSE),
    },
];

// ---------------------------------------------------------------------------
// Thermostat

static THERMOSTAT_ATTRIBUTES: [AttributeSpec; 8] = [
    attr(0x0000, "LocalTemperature", S16).nullable(),
    attr(0x0011, "OccupiedCoolingSetpoint", S16).writable(),
    attr(0x0012, "OccupiedHeatingSetpoint", S16).writable(),
    attr(0x0015, "MinHeatSetpointLimit", S16),
    attr(0x0016, "MaxHeatSetpointLimit", S16),
    attr(
        0x001B,
        "ControlSequenceOfOperation",
        enum8(&[
            ("CoolingOnly", 0),
            ("CoolingWithReheat", 1),
            ("HeatingOnly", 2),
            ("HeatingWithReheat", 3),
            ("CoolingAndHeating", 4),
            ("CoolingAndHeatingWithReheat", 5),
        ]),
    )
    .writable(),
    attr(
        0x001C,
        "SystemMode",
        enum8(&[
            ("Off", 0),
            ("Auto", 1),
            ("Cool", 3),
            ("Heat", 4),
            ("EmergencyHeating", 5),
            ("Precooling", 6),
            ("FanOnly", 7),
        ]),
    )
    .writable(),
    attr(
        0x001E,
        "ThermostatRunningMode",
        enum8(&[("Off", 0), ("Cool", 3), ("Heat", 4)]),
    ),
];

static THERMOSTAT_COMMANDS: [CommandSpec; 1] = [command(
    0x00,
    "SetpointRaiseOrLower",
    &[
        field("Mode", enum8(&[("Heat", 0), ("Cool", 1), ("Both", 2)])),
        field("Amount", S8),
    ],
)];

// ---------------------------------------------------------------------------
// Color control

static COLOR_ATTRIBUTES: [AttributeSpec; 12] = [
    attr(0x0000, "CurrentHue", U8),
    attr(0x0001, "CurrentSaturation", U8),
    attr(0x0002, "RemainingTime", U16),
    attr(0x0003, "CurrentX", U16),
    attr(0x0004, "CurrentY", U16),
    attr(0x0007, "ColorTemperatureMireds", U16),
    attr(
        0x0008,
        "ColorMode",
        enum8(&[
            ("CurrentHueAndCurrentSaturation", 0),
            ("CurrentXAndCurrentY", 1),
            ("ColorTemperatureMireds", 2),
        ]),
    ),
    attr(0x000F, "Options", bitmap8(&[("ExecuteIfOff", 0x01)])).writable(),
    attr(0x4001, "EnhancedColorMode", U8),
    attr(
        0x400A,
        "ColorCapabilities",
        bitmap16(&[
            ("HueSaturationSupported", 0x01),
            ("EnhancedHueSupported", 0x02),
            ("ColorLoopSupported", 0x04),
            ("XYAttributesSupported", 0x08),
            ("ColorTemperatureSupported", 0x10),
        ]),
    ),
    attr(0x400B, "ColorTempPhysicalMinMireds", U16),
    attr(0x400C, "ColorTempPhysicalMaxMireds", U16),
];

const COLOR_OPTION_MASK: FieldSpec =
    field("OptionsMask", bitmap8(&[("ExecuteIfOff", 0x01)])).optional();
const COLOR_OPTION_OVERRIDE: FieldSpec =
    field("OptionsOverride", bitmap8(&[("ExecuteIfOff", 0x01)])).optional();

static COLOR_COMMANDS: [CommandSpec; 6] = [
    command(
        0x00,
        "MoveToHue",
        &[
            field("Hue", U8),
            field(
                "Direction",
                enum8(&[("ShortestDistance", 0), ("LongestDistance", 1), ("Up", 2), ("Down", 3)]),
            ),
            field("TransitionTime", U16),
            COLOR_OPTION_MASK,
            COLOR_OPTION_OVERRIDE,
        ],
    ),
    command(
        0x03,
        "MoveToSaturation",
        &[
            field("Saturation", U8),
            field("TransitionTime", U16),
            COLOR_OPTION_MASK,
            COLOR_OPTION_OVERRIDE,
        ],
    ),
    command(
        0x06,
        "MoveToHueAndSaturation",
        &[
            field("Hue", U8),
            field("Saturation", U8),
            field("TransitionTime", U16),
            COLOR_OPTION_MASK,
            COLOR_OPTION_OVERRIDE,
        ],
    ),
    command(
        0x07,
        "MoveToColor",
        &[
            field("ColorX", U16),
            field("ColorY", U16),
            field("TransitionTime", U16),
            COLOR_OPTION_MASK,
            COLOR_OPTION_OVERRIDE,
        ],
    ),
    command(
        0x0A,
        "MoveToColorTemperature",
        &[
            field("ColorTemperatureMireds", U16),
            field("TransitionTime", U16),
            COLOR_OPTION_MASK,
            COLOR_OPTION_OVERRIDE,
        ],
    ),
    command(
        0x47,
        "StopMoveStep",
        &[COLOR_OPTION_MASK, COLOR_OPTION_OVERRIDE],
    ),
];

// ---------------------------------------------------------------------------
// Measurement and sensing

static ILLUMINANCE_ATTRIBUTES: [AttributeSpec; 5] = [
    attr(0x0000, "MeasuredValue", U16).nullable(),
    attr(0x0001, "MinMeasuredValue", U16).nullable(),
    attr(0x0002, "MaxMeasuredValue", U16).nullable(),
    attr(0x0003, "Tolerance", U16),
    attr(
        0x0004,
        "LightSensorType",
        enum8(&[("Photodiode", 0), ("CMOS", 1)]),
    )
    .nullable(),
];

static TEMPERATURE_ATTRIBUTES: [AttributeSpec; 4] = [
    attr(0x0000, "MeasuredValue", S16).nullable(),
    attr(0x0001, "MinMeasuredValue", S16).nullable(),
    attr(0x0002, "MaxMeasuredValue", S16).nullable(),
    attr(0x0003, "Tolerance", U16),
];

static PRESSURE_ATTRIBUTES: [AttributeSpec; 9] = [
    attr(0x0000, "MeasuredValue", S16).nullable(),
    attr(0x0001, "MinMeasuredValue", S16).nullable(),
    attr(0x0002, "MaxMeasuredValue", S16).nullable(),
    attr(0x0003, "Tolerance", U16),
    attr(0x0010, "ScaledValue", S16).nullable(),
    attr(0x0011, "MinScaledValue", S16).nullable(),
    attr(0x0012, "MaxScaledValue", S16).nullable(),
    attr(0x0013, "ScaledTolerance", U16),
    attr(0x0014, "Scale", S8),
];

static FLOW_ATTRIBUTES: [AttributeSpec; 4] = [
    attr(0x0000, "MeasuredValue", U16).nullable(),
    attr(0x0001, "MinMeasuredValue", U16).nullable(),
    attr(0x0002, "MaxMeasuredValue", U16).nullable(),
    attr(0x0003, "Tolerance", U16),
];

static HUMIDITY_ATTRIBUTES: [AttributeSpec; 4] = [
    attr(0x0000, "MeasuredValue", U16).nullable(),
    attr(0x0001, "MinMeasuredValue", U16).nullable(),
    attr(0x0002, "MaxMeasuredValue", U16).nullable(),
    attr(0x0003, "Tolerance", U16),
];

static OCCUPANCY_ATTRIBUTES: [AttributeSpec; 3] = [
    attr(0x0000, "Occupancy", bitmap8(&[("Occupied", 0x01)])),
    attr(
        0x0001,
        "OccupancySensorType",
        enum8(&[
            ("PIR", 0),
            ("Ultrasonic", 1),
            ("PIRAndUltrasonic", 2),
            ("PhysicalContact", 3),
        ]),
    ),
    attr(
        0x0002,
        "OccupancySensorTypeBitmap",
        bitmap8(&[("PIR", 0x01), ("Ultrasonic", 0x02), ("PhysicalContact", 0x04)]),
    ),
];

// ---------------------------------------------------------------------------

const fn cluster(
    id: ClusterId,
    name: &'static str,
    device_name: &'static str,
    revision: u16,
    attributes: &'static [AttributeSpec],
    commands: &'static [CommandSpec],
) -> ClusterSpec {
    ClusterSpec {
        id,
        name,
        device_name,
        revision,
        feature_map: 0,
        auxiliary: false,
        attributes,
        commands,
    }
}

impl ClusterSpec {
    const fn features(self, feature_map: u32) -> Self {
        Self {
            feature_map,
            ..self
        }
    }

    const fn auxiliary(self) -> Self {
        Self {
            auxiliary: true,
            ..self
        }
    }
}

static CLUSTERS: [ClusterSpec; 14] = [
    cluster(ids::IDENTIFY, "Identify", "Identify", 4, &IDENTIFY_ATTRIBUTES, &IDENTIFY_COMMANDS)
        .auxiliary(),
    cluster(ids::GROUPS, "Groups", "Groups", 4, &GROUPS_ATTRIBUTES, &GROUPS_COMMANDS)
        .features(0x01)
        .auxiliary(),
    cluster(ids::ON_OFF, "OnOff", "OnOff", 5, &ON_OFF_ATTRIBUTES, &ON_OFF_COMMANDS).features(0x01),
    cluster(ids::LEVEL_CONTROL, "LevelControl", "Level", 5, &LEVEL_ATTRIBUTES, &LEVEL_COMMANDS)
        .features(0x03),
    cluster(
        ids::BRIDGED_DEVICE_BASIC_INFORMATION,
        "BridgedDeviceBasicInformation",
        "Basic",
        2,
        &BASIC_ATTRIBUTES,
        &[],
    )
    .auxiliary(),
    cluster(ids::DOOR_LOCK, "DoorLock", "DoorLock", 7, &DOOR_LOCK_ATTRIBUTES, &DOOR_LOCK_COMMANDS)
        .features(0x0101),
    cluster(
        ids::THERMOSTAT,
        "Thermostat",
        "Thermostat",
        6,
        &THERMOSTAT_ATTRIBUTES,
        &THERMOSTAT_COMMANDS,
    )
    .features(0x03),
    cluster(
        ids::COLOR_CONTROL,
        "ColorControl",
        "ColorControl",
        6,
        &COLOR_ATTRIBUTES,
        &COLOR_COMMANDS,
    )
    .features(0x19),
    cluster(
        ids::ILLUMINANCE_MEASUREMENT,
        "IlluminanceMeasurement",
        "IlluminanceMeasurement",
        3,
        &ILLUMINANCE_ATTRIBUTES,
        &[],
    ),
    cluster(
        ids::TEMPERATURE_MEASUREMENT,
        "TemperatureMeasurement",
        "TemperatureMeasurement",
        4,
        &TEMPERATURE_ATTRIBUTES,
        &[],
    ),
    cluster(
        ids::PRESSURE_MEASUREMENT,
        "PressureMeasurement",
        "PressureMeasurement",
        3,
        &PRESSURE_ATTRIBUTES,
        &[],
    )
    .features(0x01),
    cluster(
        ids::FLOW_MEASUREMENT,
        "FlowMeasurement",
        "FlowMeasurement",
        3,
        &FLOW_ATTRIBUTES,
        &[],
    ),
    cluster(
        ids::RELATIVE_HUMIDITY_MEASUREMENT,
        "RelativeHumidityMeasurement",
        "RelativityHumidity",
        3,
        &HUMIDITY_ATTRIBUTES,
        &[],
    ),
    cluster(
        ids::OCCUPANCY_SENSING,
        "OccupancySensing",
        "OccupancySensing",
        4,
        &OCCUPANCY_ATTRIBUTES,
        &[],
    ),
];

/// Every translated cluster.
pub fn clusters() -> &'static [ClusterSpec] {
    &CLUSTERS
}

pub fn cluster_by_id(id: ClusterId) -> Option<&'static ClusterSpec> {
    CLUSTERS.iter().find(|c| c.id == id)
}

pub fn cluster_by_device_name(name: &str) -> Option<&'static ClusterSpec> {
    CLUSTERS.iter().find(|c| c.device_name == name)
}

/// Data type of the global attributes, for callers that encode them.
pub const fn global_data_type(id: AttributeId) -> Option<DataType> {
    match id.0 {
        0xFFFD => Some(U16),
        0xFFFC => Some(bitmap32(&[])),
        _ => None,
    }
}
