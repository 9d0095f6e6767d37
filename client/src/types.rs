//! Request parameter types for the command client.
//!
//! # Design
//! These are plain data carriers: the client assembles the actual wire
//! payloads, so the structs stay free of validation and hold exactly what
//! the corresponding endpoint accepts. Defaults mirror the server-side
//! paging conventions (entities page at 100, tasks at 25, per-owner object
//! listings at 50).

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::components::{EntityComponents, ObjectReference, TaskComponents};

/// Pagination for entity and orphaned-object listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

/// Pagination for per-entity and per-task object listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelatedObjectsPage {
    pub limit: u32,
    pub offset: u32,
}

impl Default for RelatedObjectsPage {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Filters for task listings. An empty `status` is treated as no filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListQuery {
    pub status: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for TaskListQuery {
    fn default() -> Self {
        Self {
            status: None,
            limit: 25,
            offset: 0,
        }
    }
}

/// Filters for object listings. Empty filter strings are treated as unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectListQuery {
    pub content_type: Option<String>,
    pub object_type: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for ObjectListQuery {
    fn default() -> Self {
        Self {
            content_type: None,
            object_type: None,
            limit: 100,
            offset: 0,
        }
    }
}

/// Body for entity creation. The components key is always transmitted,
/// null when no components are supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateEntity {
    pub entity_id: String,
    pub entity_type: String,
    pub alias: String,
    pub subtype: String,
    pub components: Option<EntityComponents>,
}

/// Partial entity update. At least one field must be set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateEntity {
    pub components: Option<EntityComponents>,
    pub subtype: Option<String>,
}

/// Raw telemetry patch. Unset fields are left out of the body; values are
/// passed through without client-side validation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct UpdateTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_m_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_deg: Option<f64>,
}

/// Combined body and query arguments for an entity check-in.
///
/// The telemetry fields and `status` travel in the body; `status_filter`,
/// `limit`, `since` and `fields` travel as query parameters controlling the
/// pending-task listing the server returns.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckinOptions {
    pub status: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_m: Option<f64>,
    pub speed_m_s: Option<f64>,
    pub heading_deg: Option<f64>,
    pub status_filter: String,
    pub limit: u32,
    pub since: Option<String>,
    pub fields: Option<String>,
}

impl Default for CheckinOptions {
    fn default() -> Self {
        Self {
            status: None,
            latitude: None,
            longitude: None,
            altitude_m: None,
            speed_m_s: None,
            heading_deg: None,
            status_filter: "pending,acknowledged".to_string(),
            limit: 10,
            since: None,
            fields: None,
        }
    }
}

/// Body for task creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTask {
    pub task_id: String,
    pub status: String,
    pub entity_id: Option<String>,
    pub components: Option<TaskComponents>,
    pub extra: Option<Map<String, Value>>,
}

impl CreateTask {
    /// New task in the initial "pending" status.
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: "pending".to_string(),
            entity_id: None,
            components: None,
            extra: None,
        }
    }
}

/// Partial task update; only set fields are transmitted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateTask {
    pub status: Option<String>,
    pub entity_id: Option<String>,
    pub components: Option<TaskComponents>,
    pub extra: Option<Map<String, Value>>,
}

/// Arguments for the multipart object-creation workflow (the binary
/// payload is passed to the client method separately).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateObject {
    pub object_id: String,
    pub content_type: String,
    pub file_name: Option<String>,
    pub usage_hint: Option<String>,
    pub object_type: Option<String>,
    pub referenced_by: Vec<ObjectReference>,
}

impl CreateObject {
    pub fn new(object_id: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            content_type: content_type.into(),
            file_name: None,
            usage_hint: None,
            object_type: None,
            referenced_by: Vec::new(),
        }
    }
}

/// Body for registering object metadata without uploading content.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateObjectMetadata {
    pub object_id: String,
    pub path: Option<String>,
    pub bucket: Option<String>,
    pub size_bytes: Option<u64>,
    pub content_type: Option<String>,
    pub object_type: Option<String>,
    pub usage_hints: Option<Vec<String>>,
    pub referenced_by: Option<Vec<ObjectReference>>,
    pub extra: Option<Map<String, Value>>,
}

impl CreateObjectMetadata {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            path: None,
            bucket: None,
            size_bytes: None,
            content_type: None,
            object_type: None,
            usage_hints: None,
            referenced_by: None,
            extra: None,
        }
    }
}

/// Partial object update. At least one field must be set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateObject {
    pub usage_hints: Option<Vec<String>>,
    pub referenced_by: Option<Vec<ObjectReference>>,
}

/// Per-type limits for the full-dataset query; unset limits are left to
/// the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FullDatasetQuery {
    pub entity_limit: Option<u32>,
    pub task_limit: Option<u32>,
    pub object_limit: Option<u32>,
}

/// Raw object content with the response metadata headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDownload {
    pub content: Bytes,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// Object content decoded as text (lossy UTF-8), with metadata headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectView {
    pub content: String,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}
