//! Typed components for Atlas Command entities, tasks and objects.
//!
//! # Design
//! Every type here is an immutable, validated-at-construction value object.
//! Types with invariants are `#[non_exhaustive]` and constructed through a
//! builder or a fallible `new`; fields stay public for direct reads. The
//! serialization contract is the [`Component`] trait: each type lists its
//! own fields through its `Serialize` impl (derived for fixed field sets,
//! manual for the four open types that merge `custom_` extension fields),
//! and omit-unset mode prunes unset fields from the resulting JSON tree.
//!
//! Responses are never converted back into these types; the client reads
//! server payloads as plain JSON.

use std::collections::BTreeMap;

use chrono::DateTime;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::ComponentError;

/// Reserved key prefix for caller-defined extension fields on the open
/// types (`EntityComponents`, `TaskComponents`, `TaskParametersComponent`,
/// `ObjectMetadata`).
pub const CUSTOM_PREFIX: &str = "custom_";

fn check_finite(field: &'static str, value: Option<f64>) -> Result<(), ComponentError> {
    match value {
        Some(v) if !v.is_finite() => Err(ComponentError::NonFinite { field, value: v }),
        _ => Ok(()),
    }
}

/// RFC 3339 check. chrono accepts a trailing "Z" as an alias for the
/// "+00:00" offset, so both spellings pass.
fn check_timestamp(field: &'static str, value: Option<&str>) -> Result<(), ComponentError> {
    if let Some(raw) = value {
        if DateTime::parse_from_rfc3339(raw).is_err() {
            return Err(ComponentError::InvalidTimestamp {
                field,
                value: raw.to_string(),
            });
        }
    }
    Ok(())
}

fn check_custom_key(kind: &'static str, key: &str) -> Result<(), ComponentError> {
    if key.starts_with(CUSTOM_PREFIX) {
        Ok(())
    } else {
        Err(ComponentError::UnknownKey {
            kind,
            key: key.to_string(),
        })
    }
}

/// Drop null-valued keys from every mapping, recursively. List items are
/// kept as-is: a null inside a list is a value, not an unset field.
fn prune_unset(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, prune_unset(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(prune_unset).collect()),
        other => other,
    }
}

/// Serialization contract shared by every component type.
pub trait Component: Serialize {
    /// Serialize to a JSON value. With `omit_unset`, unset fields are
    /// dropped recursively while meaningful falsy values (zero, empty
    /// string, empty list) are kept.
    fn to_value(&self, omit_unset: bool) -> serde_json::Result<Value> {
        let value = serde_json::to_value(self)?;
        Ok(if omit_unset { prune_unset(value) } else { value })
    }
}

/// Marker for the two component-set types accepted by
/// [`components_to_value`]. Raw JSON mappings do not implement it, so an
/// untyped server payload cannot be passed where a typed set is required.
pub trait ComponentSet: Component {}

/// Serialize an optional component set for transmission, omitting unset
/// fields. `None` stays absent.
pub fn components_to_value<C: ComponentSet>(
    components: Option<&C>,
) -> serde_json::Result<Option<Value>> {
    components.map(|c| c.to_value(true)).transpose()
}

/// Serialize optional object metadata for transmission, omitting unset
/// fields. `None` stays absent.
pub fn object_metadata_to_value(
    metadata: Option<&ObjectMetadata>,
) -> serde_json::Result<Option<Value>> {
    metadata.map(|m| m.to_value(true)).transpose()
}

/// Role of a media object attached to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaRole {
    CameraFeed,
    Thumbnail,
    HeatmapData,
}

/// Military tactical classification values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Friendly,
    Hostile,
    Neutral,
    Unknown,
    Civilian,
}

/// Network link states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Connected,
    Disconnected,
    Degraded,
    Unknown,
}

// Entity components ----------------------------------------------------------

/// Position and motion data for an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[non_exhaustive]
pub struct TelemetryComponent {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_m: Option<f64>,
    pub speed_m_s: Option<f64>,
    pub heading_deg: Option<f64>,
}

impl TelemetryComponent {
    pub fn builder() -> TelemetryComponentBuilder {
        TelemetryComponentBuilder::default()
    }
}

impl Component for TelemetryComponent {}

#[derive(Debug, Clone, Default)]
pub struct TelemetryComponentBuilder {
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude_m: Option<f64>,
    speed_m_s: Option<f64>,
    heading_deg: Option<f64>,
}

impl TelemetryComponentBuilder {
    pub fn latitude(mut self, latitude: f64) -> Self {
        self.latitude = Some(latitude);
        self
    }

    pub fn longitude(mut self, longitude: f64) -> Self {
        self.longitude = Some(longitude);
        self
    }

    pub fn altitude_m(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m);
        self
    }

    pub fn speed_m_s(mut self, speed_m_s: f64) -> Self {
        self.speed_m_s = Some(speed_m_s);
        self
    }

    pub fn heading_deg(mut self, heading_deg: f64) -> Self {
        self.heading_deg = Some(heading_deg);
        self
    }

    pub fn build(self) -> Result<TelemetryComponent, ComponentError> {
        check_finite("latitude", self.latitude)?;
        check_finite("longitude", self.longitude)?;
        check_finite("altitude_m", self.altitude_m)?;
        check_finite("speed_m_s", self.speed_m_s)?;
        check_finite("heading_deg", self.heading_deg)?;
        if let Some(latitude) = self.latitude {
            if !(-90.0..=90.0).contains(&latitude) {
                return Err(ComponentError::OutOfRange {
                    field: "latitude",
                    requirement: "must be between -90 and 90",
                });
            }
        }
        if let Some(longitude) = self.longitude {
            if !(-180.0..=180.0).contains(&longitude) {
                return Err(ComponentError::OutOfRange {
                    field: "longitude",
                    requirement: "must be between -180 and 180",
                });
            }
        }
        if let Some(speed) = self.speed_m_s {
            if speed < 0.0 {
                return Err(ComponentError::OutOfRange {
                    field: "speed_m_s",
                    requirement: "must be non-negative",
                });
            }
        }
        if let Some(heading) = self.heading_deg {
            if !(0.0..360.0).contains(&heading) {
                return Err(ComponentError::OutOfRange {
                    field: "heading_deg",
                    requirement: "must be between 0 (inclusive) and 360 (exclusive)",
                });
            }
        }
        Ok(TelemetryComponent {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude_m: self.altitude_m,
            speed_m_s: self.speed_m_s,
            heading_deg: self.heading_deg,
        })
    }
}

/// GeoJSON geometry. The variant fixes the coordinate nesting depth, so a
/// depth mismatch cannot be represented.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum GeometryComponent {
    Point(Vec<f64>),
    LineString(Vec<Vec<f64>>),
    Polygon(Vec<Vec<Vec<f64>>>),
}

impl Component for GeometryComponent {}

/// Task identifiers an entity supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct TaskCatalogComponent {
    pub supported_tasks: Vec<String>,
}

impl Component for TaskCatalogComponent {}

/// A reference to a media object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRef {
    pub object_id: String,
    pub role: MediaRole,
}

impl MediaRef {
    pub fn new(object_id: impl Into<String>, role: MediaRole) -> Self {
        Self {
            object_id: object_id.into(),
            role,
        }
    }
}

impl Component for MediaRef {}

/// Military tactical classification of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct MilViewComponent {
    pub classification: Classification,
    pub last_seen: Option<String>,
}

impl MilViewComponent {
    pub fn new(
        classification: Classification,
        last_seen: Option<&str>,
    ) -> Result<Self, ComponentError> {
        check_timestamp("last_seen", last_seen)?;
        Ok(Self {
            classification,
            last_seen: last_seen.map(str::to_string),
        })
    }
}

impl Component for MilViewComponent {}

/// Health and vital statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[non_exhaustive]
pub struct HealthComponent {
    pub battery_percent: Option<u8>,
}

impl HealthComponent {
    pub fn new(battery_percent: Option<u8>) -> Result<Self, ComponentError> {
        if let Some(percent) = battery_percent {
            if percent > 100 {
                return Err(ComponentError::OutOfRange {
                    field: "battery_percent",
                    requirement: "must be between 0 and 100",
                });
            }
        }
        Ok(Self { battery_percent })
    }
}

impl Component for HealthComponent {}

/// A sensor reference with field-of-view and orientation metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct SensorRef {
    pub sensor_id: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub vertical_fov: Option<f64>,
    pub horizontal_fov: Option<f64>,
    pub vertical_orientation: Option<f64>,
    pub horizontal_orientation: Option<f64>,
}

impl SensorRef {
    pub fn builder(sensor_id: impl Into<String>, sensor_type: impl Into<String>) -> SensorRefBuilder {
        SensorRefBuilder {
            sensor_id: sensor_id.into(),
            sensor_type: sensor_type.into(),
            vertical_fov: None,
            horizontal_fov: None,
            vertical_orientation: None,
            horizontal_orientation: None,
        }
    }
}

impl Component for SensorRef {}

#[derive(Debug, Clone)]
pub struct SensorRefBuilder {
    sensor_id: String,
    sensor_type: String,
    vertical_fov: Option<f64>,
    horizontal_fov: Option<f64>,
    vertical_orientation: Option<f64>,
    horizontal_orientation: Option<f64>,
}

impl SensorRefBuilder {
    pub fn vertical_fov(mut self, degrees: f64) -> Self {
        self.vertical_fov = Some(degrees);
        self
    }

    pub fn horizontal_fov(mut self, degrees: f64) -> Self {
        self.horizontal_fov = Some(degrees);
        self
    }

    pub fn vertical_orientation(mut self, degrees: f64) -> Self {
        self.vertical_orientation = Some(degrees);
        self
    }

    pub fn horizontal_orientation(mut self, degrees: f64) -> Self {
        self.horizontal_orientation = Some(degrees);
        self
    }

    pub fn build(self) -> Result<SensorRef, ComponentError> {
        check_finite("vertical_fov", self.vertical_fov)?;
        check_finite("horizontal_fov", self.horizontal_fov)?;
        check_finite("vertical_orientation", self.vertical_orientation)?;
        check_finite("horizontal_orientation", self.horizontal_orientation)?;
        Ok(SensorRef {
            sensor_id: self.sensor_id,
            sensor_type: self.sensor_type,
            vertical_fov: self.vertical_fov,
            horizontal_fov: self.horizontal_fov,
            vertical_orientation: self.vertical_orientation,
            horizontal_orientation: self.horizontal_orientation,
        })
    }
}

/// Network link status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommunicationsComponent {
    pub link_state: LinkState,
}

impl Component for CommunicationsComponent {}

/// Current and queued work items for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct TaskQueueComponent {
    pub current_task_id: Option<String>,
    pub queued_task_ids: Vec<String>,
}

impl Component for TaskQueueComponent {}

/// Operational status of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct StatusComponent {
    pub value: String,
    pub last_update: Option<String>,
}

impl StatusComponent {
    pub fn new(value: impl Into<String>, last_update: Option<&str>) -> Result<Self, ComponentError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ComponentError::Empty {
                field: "StatusComponent.value",
            });
        }
        check_timestamp("last_update", last_update)?;
        Ok(Self {
            value,
            last_update: last_update.map(str::to_string),
        })
    }
}

impl Component for StatusComponent {}

/// Liveness heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct HeartbeatComponent {
    pub last_seen: String,
}

impl HeartbeatComponent {
    pub fn new(last_seen: impl Into<String>) -> Result<Self, ComponentError> {
        let last_seen = last_seen.into();
        if last_seen.is_empty() {
            return Err(ComponentError::Empty {
                field: "HeartbeatComponent.last_seen",
            });
        }
        check_timestamp("last_seen", Some(&last_seen))?;
        Ok(Self { last_seen })
    }
}

impl Component for HeartbeatComponent {}

/// All supported entity components, plus `custom_` extension fields.
#[derive(Debug, Clone, PartialEq, Default)]
#[non_exhaustive]
pub struct EntityComponents {
    pub telemetry: Option<TelemetryComponent>,
    pub geometry: Option<GeometryComponent>,
    pub task_catalog: Option<TaskCatalogComponent>,
    pub media_refs: Option<Vec<MediaRef>>,
    pub mil_view: Option<MilViewComponent>,
    pub health: Option<HealthComponent>,
    pub sensor_refs: Option<Vec<SensorRef>>,
    pub communications: Option<CommunicationsComponent>,
    pub task_queue: Option<TaskQueueComponent>,
    pub status: Option<StatusComponent>,
    pub heartbeat: Option<HeartbeatComponent>,
    pub custom: BTreeMap<String, Value>,
}

impl EntityComponents {
    pub fn builder() -> EntityComponentsBuilder {
        EntityComponentsBuilder::default()
    }
}

impl Serialize for EntityComponents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("telemetry", &self.telemetry)?;
        map.serialize_entry("geometry", &self.geometry)?;
        map.serialize_entry("task_catalog", &self.task_catalog)?;
        map.serialize_entry("media_refs", &self.media_refs)?;
        map.serialize_entry("mil_view", &self.mil_view)?;
        map.serialize_entry("health", &self.health)?;
        map.serialize_entry("sensor_refs", &self.sensor_refs)?;
        map.serialize_entry("communications", &self.communications)?;
        map.serialize_entry("task_queue", &self.task_queue)?;
        map.serialize_entry("status", &self.status)?;
        map.serialize_entry("heartbeat", &self.heartbeat)?;
        for (key, value) in &self.custom {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Component for EntityComponents {}
impl ComponentSet for EntityComponents {}

#[derive(Debug, Clone, Default)]
pub struct EntityComponentsBuilder {
    components: EntityComponents,
    custom: Vec<(String, Value)>,
}

impl EntityComponentsBuilder {
    pub fn telemetry(mut self, telemetry: TelemetryComponent) -> Self {
        self.components.telemetry = Some(telemetry);
        self
    }

    pub fn geometry(mut self, geometry: GeometryComponent) -> Self {
        self.components.geometry = Some(geometry);
        self
    }

    pub fn task_catalog(mut self, task_catalog: TaskCatalogComponent) -> Self {
        self.components.task_catalog = Some(task_catalog);
        self
    }

    pub fn media_refs(mut self, media_refs: Vec<MediaRef>) -> Self {
        self.components.media_refs = Some(media_refs);
        self
    }

    pub fn mil_view(mut self, mil_view: MilViewComponent) -> Self {
        self.components.mil_view = Some(mil_view);
        self
    }

    pub fn health(mut self, health: HealthComponent) -> Self {
        self.components.health = Some(health);
        self
    }

    pub fn sensor_refs(mut self, sensor_refs: Vec<SensorRef>) -> Self {
        self.components.sensor_refs = Some(sensor_refs);
        self
    }

    pub fn communications(mut self, communications: CommunicationsComponent) -> Self {
        self.components.communications = Some(communications);
        self
    }

    pub fn task_queue(mut self, task_queue: TaskQueueComponent) -> Self {
        self.components.task_queue = Some(task_queue);
        self
    }

    pub fn status(mut self, status: StatusComponent) -> Self {
        self.components.status = Some(status);
        self
    }

    pub fn heartbeat(mut self, heartbeat: HeartbeatComponent) -> Self {
        self.components.heartbeat = Some(heartbeat);
        self
    }

    /// Stage an extension entry. The key must carry the `custom_` prefix;
    /// anything else fails `build()` with an unknown-component error.
    pub fn custom(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom.push((key.into(), value));
        self
    }

    pub fn build(mut self) -> Result<EntityComponents, ComponentError> {
        for (key, value) in self.custom {
            check_custom_key("component", &key)?;
            self.components.custom.insert(key, value);
        }
        Ok(self.components)
    }
}

// Task components -------------------------------------------------------------

/// Identifies the work type of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct CommandComponent {
    #[serde(rename = "type")]
    pub command_type: String,
}

impl CommandComponent {
    pub fn new(command_type: impl Into<String>) -> Result<Self, ComponentError> {
        let command_type = command_type.into();
        if command_type.is_empty() {
            return Err(ComponentError::Empty {
                field: "CommandComponent.type",
            });
        }
        Ok(Self { command_type })
    }
}

impl Component for CommandComponent {}

/// Parameters for task execution, plus `custom_` extension fields.
#[derive(Debug, Clone, PartialEq, Default)]
#[non_exhaustive]
pub struct TaskParametersComponent {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_m: Option<f64>,
    pub custom: BTreeMap<String, Value>,
}

impl TaskParametersComponent {
    pub fn builder() -> TaskParametersComponentBuilder {
        TaskParametersComponentBuilder::default()
    }
}

impl Serialize for TaskParametersComponent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("latitude", &self.latitude)?;
        map.serialize_entry("longitude", &self.longitude)?;
        map.serialize_entry("altitude_m", &self.altitude_m)?;
        for (key, value) in &self.custom {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Component for TaskParametersComponent {}

#[derive(Debug, Clone, Default)]
pub struct TaskParametersComponentBuilder {
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude_m: Option<f64>,
    custom: Vec<(String, Value)>,
}

impl TaskParametersComponentBuilder {
    pub fn latitude(mut self, latitude: f64) -> Self {
        self.latitude = Some(latitude);
        self
    }

    pub fn longitude(mut self, longitude: f64) -> Self {
        self.longitude = Some(longitude);
        self
    }

    pub fn altitude_m(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m);
        self
    }

    pub fn custom(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom.push((key.into(), value));
        self
    }

    pub fn build(self) -> Result<TaskParametersComponent, ComponentError> {
        check_finite("latitude", self.latitude)?;
        check_finite("longitude", self.longitude)?;
        check_finite("altitude_m", self.altitude_m)?;
        let mut custom = BTreeMap::new();
        for (key, value) in self.custom {
            check_custom_key("task parameter", &key)?;
            custom.insert(key, value);
        }
        Ok(TaskParametersComponent {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude_m: self.altitude_m,
            custom,
        })
    }
}

/// Runtime progress of task execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[non_exhaustive]
pub struct TaskProgressComponent {
    pub percent: Option<u8>,
    pub updated_at: Option<String>,
    pub status_detail: Option<String>,
}

impl TaskProgressComponent {
    pub fn builder() -> TaskProgressComponentBuilder {
        TaskProgressComponentBuilder::default()
    }
}

impl Component for TaskProgressComponent {}

#[derive(Debug, Clone, Default)]
pub struct TaskProgressComponentBuilder {
    percent: Option<u8>,
    updated_at: Option<String>,
    status_detail: Option<String>,
}

impl TaskProgressComponentBuilder {
    pub fn percent(mut self, percent: u8) -> Self {
        self.percent = Some(percent);
        self
    }

    pub fn updated_at(mut self, updated_at: impl Into<String>) -> Self {
        self.updated_at = Some(updated_at.into());
        self
    }

    pub fn status_detail(mut self, status_detail: impl Into<String>) -> Self {
        self.status_detail = Some(status_detail.into());
        self
    }

    pub fn build(self) -> Result<TaskProgressComponent, ComponentError> {
        if let Some(percent) = self.percent {
            if percent > 100 {
                return Err(ComponentError::OutOfRange {
                    field: "percent",
                    requirement: "must be between 0 and 100",
                });
            }
        }
        check_timestamp("updated_at", self.updated_at.as_deref())?;
        Ok(TaskProgressComponent {
            percent: self.percent,
            updated_at: self.updated_at,
            status_detail: self.status_detail,
        })
    }
}

/// All supported task components, plus `custom_` extension fields.
#[derive(Debug, Clone, PartialEq, Default)]
#[non_exhaustive]
pub struct TaskComponents {
    pub command: Option<CommandComponent>,
    pub parameters: Option<TaskParametersComponent>,
    pub progress: Option<TaskProgressComponent>,
    pub custom: BTreeMap<String, Value>,
}

impl TaskComponents {
    pub fn builder() -> TaskComponentsBuilder {
        TaskComponentsBuilder::default()
    }
}

impl Serialize for TaskComponents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("command", &self.command)?;
        map.serialize_entry("parameters", &self.parameters)?;
        map.serialize_entry("progress", &self.progress)?;
        for (key, value) in &self.custom {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Component for TaskComponents {}
impl ComponentSet for TaskComponents {}

#[derive(Debug, Clone, Default)]
pub struct TaskComponentsBuilder {
    components: TaskComponents,
    custom: Vec<(String, Value)>,
}

impl TaskComponentsBuilder {
    pub fn command(mut self, command: CommandComponent) -> Self {
        self.components.command = Some(command);
        self
    }

    pub fn parameters(mut self, parameters: TaskParametersComponent) -> Self {
        self.components.parameters = Some(parameters);
        self
    }

    pub fn progress(mut self, progress: TaskProgressComponent) -> Self {
        self.components.progress = Some(progress);
        self
    }

    pub fn custom(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom.push((key.into(), value));
        self
    }

    pub fn build(mut self) -> Result<TaskComponents, ComponentError> {
        for (key, value) in self.custom {
            check_custom_key("task component", &key)?;
            self.components.custom.insert(key, value);
        }
        Ok(self.components)
    }
}

// Object metadata --------------------------------------------------------------

/// A reference from an object to an entity and/or task. Both ids are
/// optional; the server decides what a reference with neither means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ObjectReference {
    pub entity_id: Option<String>,
    pub task_id: Option<String>,
}

impl ObjectReference {
    pub fn entity(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: Some(entity_id.into()),
            task_id: None,
        }
    }

    pub fn task(task_id: impl Into<String>) -> Self {
        Self {
            entity_id: None,
            task_id: Some(task_id.into()),
        }
    }
}

impl Component for ObjectReference {}

/// Metadata for a stored object, plus `custom_` extension fields.
#[derive(Debug, Clone, PartialEq, Default)]
#[non_exhaustive]
pub struct ObjectMetadata {
    pub bucket: Option<String>,
    pub size_bytes: Option<u64>,
    pub usage_hints: Option<Vec<String>>,
    pub referenced_by: Option<Vec<ObjectReference>>,
    pub checksum: Option<String>,
    pub expiry_time: Option<String>,
    pub custom: BTreeMap<String, Value>,
}

impl ObjectMetadata {
    pub fn builder() -> ObjectMetadataBuilder {
        ObjectMetadataBuilder::default()
    }
}

impl Serialize for ObjectMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("bucket", &self.bucket)?;
        map.serialize_entry("size_bytes", &self.size_bytes)?;
        map.serialize_entry("usage_hints", &self.usage_hints)?;
        map.serialize_entry("referenced_by", &self.referenced_by)?;
        map.serialize_entry("checksum", &self.checksum)?;
        map.serialize_entry("expiry_time", &self.expiry_time)?;
        for (key, value) in &self.custom {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Component for ObjectMetadata {}

#[derive(Debug, Clone, Default)]
pub struct ObjectMetadataBuilder {
    metadata: ObjectMetadata,
    custom: Vec<(String, Value)>,
}

impl ObjectMetadataBuilder {
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.metadata.bucket = Some(bucket.into());
        self
    }

    pub fn size_bytes(mut self, size_bytes: u64) -> Self {
        self.metadata.size_bytes = Some(size_bytes);
        self
    }

    pub fn usage_hints(mut self, usage_hints: Vec<String>) -> Self {
        self.metadata.usage_hints = Some(usage_hints);
        self
    }

    pub fn referenced_by(mut self, referenced_by: Vec<ObjectReference>) -> Self {
        self.metadata.referenced_by = Some(referenced_by);
        self
    }

    pub fn checksum(mut self, checksum: impl Into<String>) -> Self {
        self.metadata.checksum = Some(checksum.into());
        self
    }

    pub fn expiry_time(mut self, expiry_time: impl Into<String>) -> Self {
        self.metadata.expiry_time = Some(expiry_time.into());
        self
    }

    pub fn custom(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom.push((key.into(), value));
        self
    }

    pub fn build(mut self) -> Result<ObjectMetadata, ComponentError> {
        for (key, value) in self.custom {
            check_custom_key("object metadata field", &key)?;
            self.metadata.custom.insert(key, value);
        }
        Ok(self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn telemetry_accepts_valid_values() {
        let telemetry = TelemetryComponent::builder()
            .latitude(40.7128)
            .longitude(-74.0060)
            .altitude_m(120.0)
            .speed_m_s(8.2)
            .heading_deg(165.0)
            .build()
            .unwrap();
        assert_eq!(telemetry.latitude, Some(40.7128));
        assert_eq!(telemetry.heading_deg, Some(165.0));
        assert_eq!(telemetry.altitude_m, Some(120.0));
    }

    #[test]
    fn latitude_out_of_range_fails() {
        let err = TelemetryComponent::builder()
            .latitude(91.0)
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "latitude must be between -90 and 90");
    }

    #[test]
    fn latitude_boundaries_are_inclusive() {
        assert!(TelemetryComponent::builder().latitude(90.0).build().is_ok());
        assert!(TelemetryComponent::builder().latitude(-90.0).build().is_ok());
    }

    #[test]
    fn longitude_out_of_range_fails() {
        let err = TelemetryComponent::builder()
            .longitude(-180.5)
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "longitude must be between -180 and 180");
    }

    #[test]
    fn negative_speed_fails() {
        let err = TelemetryComponent::builder()
            .speed_m_s(-1.0)
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "speed_m_s must be non-negative");
    }

    #[test]
    fn heading_upper_boundary_is_exclusive() {
        assert!(TelemetryComponent::builder().heading_deg(0.0).build().is_ok());
        assert!(TelemetryComponent::builder()
            .heading_deg(359.99)
            .build()
            .is_ok());
        let err = TelemetryComponent::builder()
            .heading_deg(360.0)
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "heading_deg must be between 0 (inclusive) and 360 (exclusive)"
        );
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let err = TelemetryComponent::builder()
            .latitude(f64::NAN)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ComponentError::NonFinite {
                field: "latitude",
                ..
            }
        ));
        let err = SensorRef::builder("cam-1", "optical")
            .vertical_fov(f64::INFINITY)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ComponentError::NonFinite {
                field: "vertical_fov",
                ..
            }
        ));
    }

    #[test]
    fn battery_percent_range_is_enforced() {
        assert!(HealthComponent::new(Some(0)).is_ok());
        assert!(HealthComponent::new(Some(100)).is_ok());
        let err = HealthComponent::new(Some(101)).unwrap_err();
        assert_eq!(err.to_string(), "battery_percent must be between 0 and 100");
    }

    #[test]
    fn progress_percent_range_is_enforced() {
        assert!(TaskProgressComponent::builder().percent(100).build().is_ok());
        let err = TaskProgressComponent::builder()
            .percent(101)
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "percent must be between 0 and 100");
    }

    #[test]
    fn progress_timestamp_is_validated() {
        let err = TaskProgressComponent::builder()
            .percent(10)
            .updated_at("soon")
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "updated_at must be a valid RFC 3339 timestamp, got 'soon'"
        );
    }

    #[test]
    fn z_suffix_and_explicit_offset_are_both_accepted() {
        assert!(MilViewComponent::new(Classification::Friendly, Some("2025-11-23T10:05:00Z")).is_ok());
        assert!(MilViewComponent::new(
            Classification::Friendly,
            Some("2025-11-23T10:05:00+00:00")
        )
        .is_ok());
        assert!(MilViewComponent::new(Classification::Friendly, Some("2025-13-99T10:05:00Z")).is_err());
        assert!(MilViewComponent::new(Classification::Friendly, None).is_ok());
    }

    #[test]
    fn status_value_must_be_non_empty() {
        let err = StatusComponent::new("", None).unwrap_err();
        assert_eq!(err.to_string(), "StatusComponent.value must be a non-empty string");
    }

    #[test]
    fn status_timestamp_is_validated() {
        let err = StatusComponent::new("operational", Some("not-a-date")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "last_update must be a valid RFC 3339 timestamp, got 'not-a-date'"
        );
        let status = StatusComponent::new("operational", Some("2025-11-23T10:05:00Z")).unwrap();
        assert_eq!(status.last_update.as_deref(), Some("2025-11-23T10:05:00Z"));
    }

    #[test]
    fn heartbeat_requires_non_empty_valid_timestamp() {
        let err = HeartbeatComponent::new("").unwrap_err();
        assert_eq!(
            err.to_string(),
            "HeartbeatComponent.last_seen must be a non-empty string"
        );
        assert!(HeartbeatComponent::new("yesterday").is_err());
        assert!(HeartbeatComponent::new("2025-11-23T10:05:00Z").is_ok());
    }

    #[test]
    fn command_type_must_be_non_empty() {
        let err = CommandComponent::new("").unwrap_err();
        assert_eq!(err.to_string(), "CommandComponent.type must be a non-empty string");
        let command = CommandComponent::new("move_to").unwrap();
        assert_eq!(command.command_type, "move_to");
    }

    #[test]
    fn command_serializes_under_the_type_key() {
        let command = CommandComponent::new("move_to").unwrap();
        assert_eq!(command.to_value(true).unwrap(), json!({"type": "move_to"}));
    }

    #[test]
    fn geometry_serializes_as_tagged_geojson() {
        let point = GeometryComponent::Point(vec![-74.0060, 40.7128]);
        assert_eq!(
            point.to_value(true).unwrap(),
            json!({"type": "Point", "coordinates": [-74.0060, 40.7128]})
        );
        let polygon = GeometryComponent::Polygon(vec![vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
        ]]);
        let value = polygon.to_value(true).unwrap();
        assert_eq!(value["type"], "Polygon");
        assert_eq!(value["coordinates"][0][2], json!([1.0, 1.0]));
    }

    #[test]
    fn enum_wire_names_are_snake_case() {
        let media = MediaRef::new("obj-1", MediaRole::HeatmapData);
        assert_eq!(
            media.to_value(true).unwrap(),
            json!({"object_id": "obj-1", "role": "heatmap_data"})
        );
        let comms = CommunicationsComponent {
            link_state: LinkState::Degraded,
        };
        assert_eq!(comms.to_value(true).unwrap(), json!({"link_state": "degraded"}));
        let mil = MilViewComponent::new(Classification::Hostile, None).unwrap();
        assert_eq!(mil.to_value(true).unwrap(), json!({"classification": "hostile"}));
    }

    #[test]
    fn sensor_ref_serializes_type_key_and_keeps_unset_out() {
        let sensor = SensorRef::builder("cam-1", "optical")
            .horizontal_fov(90.0)
            .build()
            .unwrap();
        assert_eq!(
            sensor.to_value(true).unwrap(),
            json!({"sensor_id": "cam-1", "type": "optical", "horizontal_fov": 90.0})
        );
    }

    #[test]
    fn omit_unset_keeps_meaningful_falsy_values() {
        let catalog = TaskCatalogComponent {
            supported_tasks: Vec::new(),
        };
        assert_eq!(catalog.to_value(true).unwrap(), json!({"supported_tasks": []}));

        let queue = TaskQueueComponent {
            current_task_id: None,
            queued_task_ids: Vec::new(),
        };
        assert_eq!(queue.to_value(true).unwrap(), json!({"queued_task_ids": []}));

        let health = HealthComponent::new(Some(0)).unwrap();
        assert_eq!(health.to_value(true).unwrap(), json!({"battery_percent": 0}));
    }

    #[test]
    fn full_serialization_keeps_unset_fields_as_null() {
        let telemetry = TelemetryComponent::builder().latitude(1.0).build().unwrap();
        let value = telemetry.to_value(false).unwrap();
        assert_eq!(value["latitude"], 1.0);
        assert!(value["longitude"].is_null());
        assert!(value.as_object().unwrap().contains_key("heading_deg"));
    }

    #[test]
    fn omit_unset_never_emits_null_keys() {
        let components = EntityComponents::builder()
            .telemetry(TelemetryComponent::builder().latitude(40.7128).build().unwrap())
            .task_queue(TaskQueueComponent::default())
            .build()
            .unwrap();
        let value = components.to_value(true).unwrap();
        assert_eq!(value["telemetry"], json!({"latitude": 40.7128}));
        assert_eq!(value["task_queue"], json!({"queued_task_ids": []}));
        assert!(value.get("geometry").is_none());
        assert!(value["telemetry"].get("altitude_m").is_none());
        fn assert_no_nulls(value: &Value) {
            match value {
                Value::Object(map) => {
                    for nested in map.values() {
                        assert!(!nested.is_null());
                        assert_no_nulls(nested);
                    }
                }
                Value::Array(items) => items.iter().for_each(assert_no_nulls),
                _ => {}
            }
        }
        assert_no_nulls(&value);
    }

    #[test]
    fn custom_entity_component_roundtrips() {
        let components = EntityComponents::builder()
            .custom("custom_weather", json!({"condition": "cloudy", "wind_kts": 12}))
            .build()
            .unwrap();
        let value = components.to_value(true).unwrap();
        assert_eq!(
            value["custom_weather"],
            json!({"condition": "cloudy", "wind_kts": 12})
        );
    }

    #[test]
    fn unknown_entity_component_key_fails() {
        let err = EntityComponents::builder()
            .custom("weather", json!({}))
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown component 'weather': custom fields must be prefixed with 'custom_'"
        );
    }

    #[test]
    fn unknown_task_keys_fail_per_family() {
        let err = TaskComponents::builder()
            .custom("priority", json!(1))
            .build()
            .unwrap_err();
        assert!(err.to_string().starts_with("unknown task component 'priority'"));

        let err = TaskParametersComponent::builder()
            .custom("depth_m", json!(3))
            .build()
            .unwrap_err();
        assert!(err.to_string().starts_with("unknown task parameter 'depth_m'"));

        let err = ObjectMetadata::builder()
            .custom("retention", json!("30d"))
            .build()
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("unknown object metadata field 'retention'"));
    }

    #[test]
    fn task_components_serialize_nested_and_custom() {
        let components = TaskComponents::builder()
            .command(CommandComponent::new("survey").unwrap())
            .parameters(
                TaskParametersComponent::builder()
                    .latitude(12.5)
                    .custom("custom_pattern", json!("grid"))
                    .build()
                    .unwrap(),
            )
            .progress(TaskProgressComponent::builder().percent(25).build().unwrap())
            .custom("custom_attempt", json!(2))
            .build()
            .unwrap();
        let value = components.to_value(true).unwrap();
        assert_eq!(value["command"], json!({"type": "survey"}));
        assert_eq!(
            value["parameters"],
            json!({"latitude": 12.5, "custom_pattern": "grid"})
        );
        assert_eq!(value["progress"], json!({"percent": 25}));
        assert_eq!(value["custom_attempt"], json!(2));
    }

    #[test]
    fn object_metadata_serializes_references_and_custom() {
        let metadata = ObjectMetadata::builder()
            .bucket("captures")
            .size_bytes(2048)
            .usage_hints(vec!["thumbnail".to_string()])
            .referenced_by(vec![ObjectReference::entity("asset-1")])
            .custom("custom_origin", json!("unit-test"))
            .build()
            .unwrap();
        let value = metadata.to_value(true).unwrap();
        assert_eq!(value["bucket"], "captures");
        assert_eq!(value["size_bytes"], 2048);
        assert_eq!(value["usage_hints"], json!(["thumbnail"]));
        assert_eq!(value["referenced_by"], json!([{"entity_id": "asset-1"}]));
        assert_eq!(value["custom_origin"], "unit-test");
        assert!(value.get("checksum").is_none());
    }

    #[test]
    fn expiry_time_is_not_format_checked() {
        let metadata = ObjectMetadata::builder().expiry_time("whenever").build();
        assert!(metadata.is_ok());
    }

    #[test]
    fn media_refs_recurse_through_lists() {
        let components = EntityComponents::builder()
            .media_refs(vec![
                MediaRef::new("obj-1", MediaRole::CameraFeed),
                MediaRef::new("obj-2", MediaRole::Thumbnail),
            ])
            .build()
            .unwrap();
        let value = components.to_value(true).unwrap();
        assert_eq!(
            value["media_refs"],
            json!([
                {"object_id": "obj-1", "role": "camera_feed"},
                {"object_id": "obj-2", "role": "thumbnail"}
            ])
        );
    }

    #[test]
    fn components_to_value_handles_none_and_typed_sets() {
        assert_eq!(components_to_value::<EntityComponents>(None).unwrap(), None);

        let components = EntityComponents::builder()
            .health(HealthComponent::new(Some(76)).unwrap())
            .build()
            .unwrap();
        let value = components_to_value(Some(&components)).unwrap().unwrap();
        assert_eq!(value, json!({"health": {"battery_percent": 76}}));

        let task_components = TaskComponents::builder()
            .command(CommandComponent::new("hold").unwrap())
            .build()
            .unwrap();
        let value = components_to_value(Some(&task_components)).unwrap().unwrap();
        assert_eq!(value, json!({"command": {"type": "hold"}}));
    }

    #[test]
    fn object_metadata_to_value_handles_none_and_typed() {
        assert_eq!(object_metadata_to_value(None).unwrap(), None);
        let metadata = ObjectMetadata::builder().bucket("b").build().unwrap();
        assert_eq!(
            object_metadata_to_value(Some(&metadata)).unwrap(),
            Some(json!({"bucket": "b"}))
        );
    }
}
