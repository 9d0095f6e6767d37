//! Async client SDK for the Atlas Command REST API.
//!
//! # Overview
//! Atlas Command manages three resource families: entities (physical or
//! virtual assets), tasks (units of work assigned to entities) and objects
//! (binary blobs with metadata and reference tracking). This crate provides
//! typed, validated component models for their structured data and an async
//! client with one method per endpoint, including the multi-step
//! upload-then-reference object creation workflow.
//!
//! # Design
//! - Components are immutable value objects, validated at construction via
//!   builders or fallible constructors; invalid data never reaches the wire.
//! - Request serialization omits unset fields but preserves meaningful falsy
//!   values (zero, empty string, empty list).
//! - `AtlasCommandClient` talks through the [`http::Transport`] seam; the
//!   default transport wraps reqwest, tests substitute a capturing one.
//! - Responses are returned as plain `serde_json::Value`; the server owns
//!   its schemas, the client does not re-type them.
//! - Errors separate construction-time validation (`ComponentError`) from
//!   operation failures (`Error`, including HTTP status and transport
//!   classes); the client never retries and never suppresses.

pub mod client;
pub mod components;
pub mod error;
pub mod http;
pub mod types;

pub use client::{AtlasCommandClient, ClientBuilder};
pub use components::{
    Classification, CommandComponent, CommunicationsComponent, Component, ComponentSet,
    EntityComponents, GeometryComponent, HealthComponent, HeartbeatComponent, LinkState, MediaRef,
    MediaRole, MilViewComponent, ObjectMetadata, ObjectReference, SensorRef, StatusComponent,
    TaskCatalogComponent, TaskComponents, TaskParametersComponent, TaskProgressComponent,
    TaskQueueComponent, TelemetryComponent, components_to_value, object_metadata_to_value,
};
pub use error::{ComponentError, Error, Result, TransportError};
pub use http::{ApiRequest, ApiResponse, HttpTransport, Method, MultipartForm, RequestBody, Transport};
pub use types::{
    CheckinOptions, CreateEntity, CreateObject, CreateObjectMetadata, CreateTask, FullDatasetQuery,
    ObjectDownload, ObjectListQuery, ObjectView, Page, RelatedObjectsPage, TaskListQuery,
    UpdateEntity, UpdateObject, UpdateTask, UpdateTelemetry,
};
