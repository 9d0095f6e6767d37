//! Async command client for the Atlas Command REST API.
//!
//! # Design
//! `AtlasCommandClient` owns one transport for its lifetime and exposes one
//! async method per endpoint. Methods assemble the request body explicitly
//! (conditional keys stay conditional, always-present keys are always
//! present), hand it to the [`Transport`] seam, and return the parsed
//! response as plain `serde_json::Value`; response payloads are never
//! re-typed. Validation lives in the component builders; the client only
//! enforces argument combinations the endpoints require.
//!
//! `close()` releases the transport; every operation afterwards fails with
//! [`Error::Closed`]. Dropping the client releases the transport on any
//! exit path.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::components::{components_to_value, Component, ObjectReference};
use crate::error::{Error, Result};
use crate::http::{ApiRequest, ApiResponse, HttpTransport, Method, MultipartForm, RequestBody, Transport};
use crate::types::{
    CheckinOptions, CreateEntity, CreateObject, CreateObjectMetadata, CreateTask, FullDatasetQuery,
    ObjectDownload, ObjectListQuery, ObjectView, Page, RelatedObjectsPage, TaskListQuery,
    UpdateEntity, UpdateObject, UpdateTask, UpdateTelemetry,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Async client for the Atlas Command REST API.
///
/// Construct with [`AtlasCommandClient::builder`]; every operation issues
/// one HTTP request (except [`create_object`](Self::create_object), which
/// runs the upload-then-reference workflow). The client holds the
/// connection until [`close`](Self::close) or drop.
pub struct AtlasCommandClient {
    transport: Option<Arc<dyn Transport>>,
    token: Option<String>,
}

/// Configuration surface for [`AtlasCommandClient`].
pub struct ClientBuilder {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Bearer token attached to every request.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Per-request timeout for the default transport (10 s if unset).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the default reqwest transport, e.g. with a capturing test
    /// transport. The base URL and timeout are ignored when set.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<AtlasCommandClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.base_url, self.timeout)?),
        };
        Ok(AtlasCommandClient {
            transport: Some(transport),
            token: self.token,
        })
    }
}

impl AtlasCommandClient {
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder {
            base_url: base_url.into(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            transport: None,
        }
    }

    /// Client with default transport, timeout and no token.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::builder(base_url).build()
    }

    /// Release the transport. Every subsequent operation fails with
    /// [`Error::Closed`]. Idempotent.
    pub fn close(&mut self) {
        self.transport = None;
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    fn transport(&self) -> Result<&Arc<dyn Transport>> {
        self.transport.as_ref().ok_or(Error::Closed)
    }

    fn json_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(
            "Content-Type".to_string(),
            "application/json".to_string(),
        )];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        headers
    }

    // Multipart bodies carry their own content type with the form boundary.
    fn multipart_headers(&self) -> Vec<(String, String)> {
        match &self.token {
            Some(token) => vec![("Authorization".to_string(), format!("Bearer {token}"))],
            None => Vec::new(),
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        headers: Vec<(String, String)>,
        body: RequestBody,
    ) -> Result<ApiResponse> {
        let transport = self.transport()?;
        debug!(method = method.as_str(), path, "atlas request");
        let response = transport
            .send(ApiRequest {
                method,
                path: path.to_string(),
                query,
                headers,
                body,
            })
            .await?;
        debug!(status = response.status, path, "atlas response");
        if !response.is_success() {
            return Err(Error::Status {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        Ok(response)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: RequestBody,
    ) -> Result<Value> {
        let response = self.send(method, path, query, self.json_headers(), body).await?;
        if response.body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&response.body).map_err(Error::Deserialize)
    }

    async fn multipart_request(&self, path: &str, form: MultipartForm) -> Result<Value> {
        let response = self
            .send(
                Method::Post,
                path,
                Vec::new(),
                self.multipart_headers(),
                RequestBody::Multipart(form),
            )
            .await?;
        if response.body.is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_slice(&response.body).map_err(Error::Deserialize)
    }

    // Service -----------------------------------------------------------------

    pub async fn get_root(&self) -> Result<Value> {
        self.request(Method::Get, "/", Vec::new(), RequestBody::Empty).await
    }

    pub async fn get_health(&self) -> Result<Value> {
        self.request(Method::Get, "/health", Vec::new(), RequestBody::Empty).await
    }

    pub async fn get_readiness(&self) -> Result<Value> {
        self.request(Method::Get, "/readiness", Vec::new(), RequestBody::Empty)
            .await
    }

    // Entities ------------------------------------------------------------------

    pub async fn list_entities(&self, page: Page) -> Result<Value> {
        let query = vec![
            ("limit".to_string(), page.limit.to_string()),
            ("offset".to_string(), page.offset.to_string()),
        ];
        self.request(Method::Get, "/entities", query, RequestBody::Empty).await
    }

    pub async fn get_entity(&self, entity_id: &str) -> Result<Value> {
        self.request(
            Method::Get,
            &format!("/entities/{entity_id}"),
            Vec::new(),
            RequestBody::Empty,
        )
        .await
    }

    pub async fn get_entity_by_alias(&self, alias: &str) -> Result<Value> {
        self.request(
            Method::Get,
            &format!("/entities/alias/{alias}"),
            Vec::new(),
            RequestBody::Empty,
        )
        .await
    }

    /// Register a new entity. The `components` key is always transmitted,
    /// null when the entity starts without components.
    pub async fn create_entity(&self, entity: CreateEntity) -> Result<Value> {
        let components =
            components_to_value(entity.components.as_ref()).map_err(Error::Serialize)?;
        let payload = json!({
            "entity_id": entity.entity_id,
            "entity_type": entity.entity_type,
            "alias": entity.alias,
            "subtype": entity.subtype,
            "components": components,
        });
        self.request(Method::Post, "/entities", Vec::new(), RequestBody::Json(payload))
            .await
    }

    /// Partially update an entity. Fails locally, without a request, when
    /// neither components nor subtype is supplied.
    pub async fn update_entity(&self, entity_id: &str, update: UpdateEntity) -> Result<Value> {
        if update.components.is_none() && update.subtype.is_none() {
            return Err(Error::InvalidRequest(
                "update_entity requires at least one of: components, subtype".to_string(),
            ));
        }
        let mut payload = Map::new();
        if let Some(components) =
            components_to_value(update.components.as_ref()).map_err(Error::Serialize)?
        {
            payload.insert("components".to_string(), components);
        }
        if let Some(subtype) = update.subtype {
            payload.insert("subtype".to_string(), Value::String(subtype));
        }
        self.request(
            Method::Patch,
            &format!("/entities/{entity_id}"),
            Vec::new(),
            RequestBody::Json(Value::Object(payload)),
        )
        .await
    }

    pub async fn delete_entity(&self, entity_id: &str) -> Result<()> {
        self.request(
            Method::Delete,
            &format!("/entities/{entity_id}"),
            Vec::new(),
            RequestBody::Empty,
        )
        .await?;
        Ok(())
    }

    /// Report an entity's current state and collect its pending work in one
    /// round trip. Telemetry values and `status` travel in the body
    /// unvalidated; the filter options travel as query parameters.
    pub async fn checkin_entity(&self, entity_id: &str, options: CheckinOptions) -> Result<Value> {
        let mut payload = Map::new();
        if let Some(latitude) = options.latitude {
            payload.insert("latitude".to_string(), json!(latitude));
        }
        if let Some(longitude) = options.longitude {
            payload.insert("longitude".to_string(), json!(longitude));
        }
        if let Some(altitude_m) = options.altitude_m {
            payload.insert("altitude_m".to_string(), json!(altitude_m));
        }
        if let Some(speed_m_s) = options.speed_m_s {
            payload.insert("speed_m_s".to_string(), json!(speed_m_s));
        }
        if let Some(heading_deg) = options.heading_deg {
            payload.insert("heading_deg".to_string(), json!(heading_deg));
        }
        if let Some(status) = options.status {
            payload.insert("status".to_string(), Value::String(status));
        }
        let mut query = vec![
            ("status_filter".to_string(), options.status_filter),
            ("limit".to_string(), options.limit.to_string()),
        ];
        if let Some(since) = options.since {
            query.push(("since".to_string(), since));
        }
        if let Some(fields) = options.fields {
            query.push(("fields".to_string(), fields));
        }
        self.request(
            Method::Post,
            &format!("/entities/{entity_id}/checkin"),
            query,
            RequestBody::Json(Value::Object(payload)),
        )
        .await
    }

    /// Patch telemetry fields directly, bypassing component validation.
    pub async fn update_entity_telemetry(
        &self,
        entity_id: &str,
        update: UpdateTelemetry,
    ) -> Result<Value> {
        let payload = serde_json::to_value(update).map_err(Error::Serialize)?;
        self.request(
            Method::Patch,
            &format!("/entities/{entity_id}/telemetry"),
            Vec::new(),
            RequestBody::Json(payload),
        )
        .await
    }

    // Tasks ----------------------------------------------------------------------

    pub async fn list_tasks(&self, query: TaskListQuery) -> Result<Value> {
        let mut params = vec![
            ("limit".to_string(), query.limit.to_string()),
            ("offset".to_string(), query.offset.to_string()),
        ];
        if let Some(status) = query.status.filter(|s| !s.is_empty()) {
            params.push(("status".to_string(), status));
        }
        self.request(Method::Get, "/tasks", params, RequestBody::Empty).await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Value> {
        self.request(
            Method::Get,
            &format!("/tasks/{task_id}"),
            Vec::new(),
            RequestBody::Empty,
        )
        .await
    }

    pub async fn create_task(&self, task: CreateTask) -> Result<Value> {
        let mut payload = Map::new();
        payload.insert("task_id".to_string(), Value::String(task.task_id));
        payload.insert("status".to_string(), Value::String(task.status));
        if let Some(entity_id) = task.entity_id {
            payload.insert("entity_id".to_string(), Value::String(entity_id));
        }
        if let Some(components) =
            components_to_value(task.components.as_ref()).map_err(Error::Serialize)?
        {
            payload.insert("components".to_string(), components);
        }
        if let Some(extra) = task.extra {
            payload.insert("extra".to_string(), Value::Object(extra));
        }
        self.request(Method::Post, "/tasks", Vec::new(), RequestBody::Json(Value::Object(payload)))
            .await
    }

    pub async fn update_task(&self, task_id: &str, update: UpdateTask) -> Result<Value> {
        let mut payload = Map::new();
        if let Some(status) = update.status {
            payload.insert("status".to_string(), Value::String(status));
        }
        if let Some(entity_id) = update.entity_id {
            payload.insert("entity_id".to_string(), Value::String(entity_id));
        }
        if let Some(components) =
            components_to_value(update.components.as_ref()).map_err(Error::Serialize)?
        {
            payload.insert("components".to_string(), components);
        }
        if let Some(extra) = update.extra {
            payload.insert("extra".to_string(), Value::Object(extra));
        }
        self.request(
            Method::Patch,
            &format!("/tasks/{task_id}"),
            Vec::new(),
            RequestBody::Json(Value::Object(payload)),
        )
        .await
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<()> {
        self.request(
            Method::Delete,
            &format!("/tasks/{task_id}"),
            Vec::new(),
            RequestBody::Empty,
        )
        .await?;
        Ok(())
    }

    pub async fn get_tasks_by_entity(
        &self,
        entity_id: &str,
        query: TaskListQuery,
    ) -> Result<Value> {
        let mut params = vec![
            ("limit".to_string(), query.limit.to_string()),
            ("offset".to_string(), query.offset.to_string()),
        ];
        if let Some(status) = query.status.filter(|s| !s.is_empty()) {
            params.push(("status".to_string(), status));
        }
        self.request(
            Method::Get,
            &format!("/entities/{entity_id}/tasks"),
            params,
            RequestBody::Empty,
        )
        .await
    }

    pub async fn acknowledge_task(&self, task_id: &str) -> Result<Value> {
        self.request(
            Method::Post,
            &format!("/tasks/{task_id}/acknowledge"),
            Vec::new(),
            RequestBody::Json(json!({})),
        )
        .await
    }

    /// Alias for [`acknowledge_task`](Self::acknowledge_task).
    pub async fn start_task(&self, task_id: &str) -> Result<Value> {
        self.acknowledge_task(task_id).await
    }

    pub async fn complete_task(
        &self,
        task_id: &str,
        result: Option<Map<String, Value>>,
    ) -> Result<Value> {
        let mut payload = Map::new();
        if let Some(result) = result {
            payload.insert("result".to_string(), Value::Object(result));
        }
        self.request(
            Method::Post,
            &format!("/tasks/{task_id}/complete"),
            Vec::new(),
            RequestBody::Json(Value::Object(payload)),
        )
        .await
    }

    /// Move a task to `status`. With `validate` the server enforces its
    /// transition rules; without it the status is forced.
    pub async fn transition_task_status(
        &self,
        task_id: &str,
        status: &str,
        validate: bool,
        extra: Option<Map<String, Value>>,
    ) -> Result<Value> {
        let mut payload = Map::new();
        payload.insert("status".to_string(), Value::String(status.to_string()));
        payload.insert("validate".to_string(), Value::Bool(validate));
        if let Some(extra) = extra {
            payload.insert("extra".to_string(), Value::Object(extra));
        }
        self.request(
            Method::Post,
            &format!("/tasks/{task_id}/status"),
            Vec::new(),
            RequestBody::Json(Value::Object(payload)),
        )
        .await
    }

    /// Mark a task failed. Both error keys are always transmitted so the
    /// server can clear stale details.
    pub async fn fail_task(
        &self,
        task_id: &str,
        error_message: Option<&str>,
        error_details: Option<Map<String, Value>>,
    ) -> Result<Value> {
        let payload = json!({
            "error_message": error_message,
            "error_details": error_details,
        });
        self.request(
            Method::Post,
            &format!("/tasks/{task_id}/fail"),
            Vec::new(),
            RequestBody::Json(payload),
        )
        .await
    }

    // Objects --------------------------------------------------------------------

    pub async fn download_object(&self, object_id: &str) -> Result<ObjectDownload> {
        let response = self
            .send(
                Method::Get,
                &format!("/objects/{object_id}/download"),
                Vec::new(),
                self.json_headers(),
                RequestBody::Empty,
            )
            .await?;
        Ok(ObjectDownload {
            content_type: response.header("content-type").map(str::to_string),
            content_length: parse_content_length(response.header("content-length")),
            content: response.body,
        })
    }

    pub async fn view_object(&self, object_id: &str) -> Result<ObjectView> {
        let response = self
            .send(
                Method::Get,
                &format!("/objects/{object_id}/view"),
                Vec::new(),
                self.json_headers(),
                RequestBody::Empty,
            )
            .await?;
        Ok(ObjectView {
            content_type: response.header("content-type").map(str::to_string),
            content_length: parse_content_length(response.header("content-length")),
            content: String::from_utf8_lossy(&response.body).into_owned(),
        })
    }

    pub async fn list_objects(&self, query: ObjectListQuery) -> Result<Value> {
        let mut params = vec![
            ("limit".to_string(), query.limit.to_string()),
            ("offset".to_string(), query.offset.to_string()),
        ];
        if let Some(content_type) = query.content_type.filter(|s| !s.is_empty()) {
            params.push(("content_type".to_string(), content_type));
        }
        if let Some(object_type) = query.object_type.filter(|s| !s.is_empty()) {
            params.push(("type".to_string(), object_type));
        }
        self.request(Method::Get, "/objects", params, RequestBody::Empty).await
    }

    pub async fn get_object(&self, object_id: &str) -> Result<Value> {
        self.request(
            Method::Get,
            &format!("/objects/{object_id}"),
            Vec::new(),
            RequestBody::Empty,
        )
        .await
    }

    /// Upload object content and attach references in one workflow.
    ///
    /// Steps: multipart upload of `content` (field `file`, filename from
    /// `object.file_name` or "upload.bin"), then one add-reference call per
    /// `referenced_by` entry against the object id the server stored. When
    /// references were requested but the upload response lacks an
    /// `object_id`, the workflow stops with
    /// [`Error::MissingUploadObjectId`] before any reference call. A
    /// failing reference call aborts the remainder; already-attached
    /// references are not rolled back. Returns the stored object record
    /// from the upload step.
    pub async fn create_object(&self, content: Vec<u8>, object: CreateObject) -> Result<Value> {
        if object.content_type.is_empty() {
            return Err(Error::InvalidRequest(
                "create_object requires 'content_type'".to_string(),
            ));
        }
        let mut fields = vec![("object_id".to_string(), object.object_id)];
        if let Some(usage_hint) = object.usage_hint.filter(|s| !s.is_empty()) {
            fields.push(("usage_hint".to_string(), usage_hint));
        }
        if let Some(object_type) = object.object_type.filter(|s| !s.is_empty()) {
            fields.push(("type".to_string(), object_type));
        }
        let form = MultipartForm {
            file_name: object.file_name.unwrap_or_else(|| "upload.bin".to_string()),
            content_type: object.content_type,
            content,
            fields,
        };
        let stored = self.multipart_request("/objects/upload", form).await?;

        if !object.referenced_by.is_empty() {
            let stored_object_id = stored
                .get("object_id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .ok_or(Error::MissingUploadObjectId)?;
            for reference in &object.referenced_by {
                self.add_object_reference(&stored_object_id, reference).await?;
            }
        }

        Ok(stored)
    }

    /// Register metadata for an object whose content lives elsewhere.
    pub async fn create_object_metadata(&self, metadata: CreateObjectMetadata) -> Result<Value> {
        let mut payload = Map::new();
        payload.insert("object_id".to_string(), Value::String(metadata.object_id));
        if let Some(path) = metadata.path {
            payload.insert("path".to_string(), Value::String(path));
        }
        if let Some(bucket) = metadata.bucket {
            payload.insert("bucket".to_string(), Value::String(bucket));
        }
        if let Some(size_bytes) = metadata.size_bytes {
            payload.insert("size_bytes".to_string(), json!(size_bytes));
        }
        if let Some(content_type) = metadata.content_type {
            payload.insert("content_type".to_string(), Value::String(content_type));
        }
        if let Some(object_type) = metadata.object_type {
            payload.insert("type".to_string(), Value::String(object_type));
        }
        if let Some(usage_hints) = metadata.usage_hints {
            payload.insert("usage_hints".to_string(), json!(usage_hints));
        }
        if let Some(referenced_by) = &metadata.referenced_by {
            payload.insert(
                "referenced_by".to_string(),
                serialize_references(referenced_by)?,
            );
        }
        if let Some(extra) = metadata.extra {
            payload.insert("extra".to_string(), Value::Object(extra));
        }
        self.request(
            Method::Post,
            "/objects",
            Vec::new(),
            RequestBody::Json(Value::Object(payload)),
        )
        .await
    }

    /// Partially update object metadata. Fails locally when no field is
    /// supplied.
    pub async fn update_object(&self, object_id: &str, update: UpdateObject) -> Result<Value> {
        let mut payload = Map::new();
        if let Some(usage_hints) = update.usage_hints {
            payload.insert("usage_hints".to_string(), json!(usage_hints));
        }
        if let Some(referenced_by) = &update.referenced_by {
            payload.insert(
                "referenced_by".to_string(),
                serialize_references(referenced_by)?,
            );
        }
        if payload.is_empty() {
            return Err(Error::InvalidRequest(
                "update_object requires at least one field to update".to_string(),
            ));
        }
        self.request(
            Method::Patch,
            &format!("/objects/{object_id}"),
            Vec::new(),
            RequestBody::Json(Value::Object(payload)),
        )
        .await
    }

    pub async fn delete_object(&self, object_id: &str) -> Result<()> {
        self.request(
            Method::Delete,
            &format!("/objects/{object_id}"),
            Vec::new(),
            RequestBody::Empty,
        )
        .await?;
        Ok(())
    }

    pub async fn get_objects_by_entity(
        &self,
        entity_id: &str,
        page: RelatedObjectsPage,
    ) -> Result<Value> {
        let query = vec![
            ("limit".to_string(), page.limit.to_string()),
            ("offset".to_string(), page.offset.to_string()),
        ];
        self.request(
            Method::Get,
            &format!("/entities/{entity_id}/objects"),
            query,
            RequestBody::Empty,
        )
        .await
    }

    pub async fn get_objects_by_task(
        &self,
        task_id: &str,
        page: RelatedObjectsPage,
    ) -> Result<Value> {
        let query = vec![
            ("limit".to_string(), page.limit.to_string()),
            ("offset".to_string(), page.offset.to_string()),
        ];
        self.request(
            Method::Get,
            &format!("/tasks/{task_id}/objects"),
            query,
            RequestBody::Empty,
        )
        .await
    }

    /// Attach a reference. Both id keys are always transmitted, null when
    /// unset.
    pub async fn add_object_reference(
        &self,
        object_id: &str,
        reference: &ObjectReference,
    ) -> Result<Value> {
        let payload = json!({
            "entity_id": reference.entity_id,
            "task_id": reference.task_id,
        });
        self.request(
            Method::Post,
            &format!("/objects/{object_id}/references"),
            Vec::new(),
            RequestBody::Json(payload),
        )
        .await
    }

    /// Detach a reference. A DELETE with a JSON body, mirroring the
    /// server's contract.
    pub async fn remove_object_reference(
        &self,
        object_id: &str,
        reference: &ObjectReference,
    ) -> Result<Value> {
        let payload = json!({
            "entity_id": reference.entity_id,
            "task_id": reference.task_id,
        });
        self.request(
            Method::Delete,
            &format!("/objects/{object_id}/references"),
            Vec::new(),
            RequestBody::Json(payload),
        )
        .await
    }

    pub async fn find_orphaned_objects(&self, page: Page) -> Result<Value> {
        let query = vec![
            ("limit".to_string(), page.limit.to_string()),
            ("offset".to_string(), page.offset.to_string()),
        ];
        self.request(Method::Get, "/objects/orphaned", query, RequestBody::Empty)
            .await
    }

    pub async fn get_object_references(&self, object_id: &str) -> Result<Value> {
        self.request(
            Method::Get,
            &format!("/objects/{object_id}/references/info"),
            Vec::new(),
            RequestBody::Empty,
        )
        .await
    }

    pub async fn validate_object_references(&self, object_id: &str) -> Result<Value> {
        self.request(
            Method::Get,
            &format!("/objects/{object_id}/references/validate"),
            Vec::new(),
            RequestBody::Empty,
        )
        .await
    }

    pub async fn cleanup_object_references(&self, object_id: &str) -> Result<Value> {
        self.request(
            Method::Post,
            &format!("/objects/{object_id}/references/cleanup"),
            Vec::new(),
            RequestBody::Empty,
        )
        .await
    }

    // Queries --------------------------------------------------------------------

    /// Everything that changed since an RFC 3339 instant. The response
    /// carries `entities`, `tasks`, `objects` plus `deleted_entities`,
    /// `deleted_tasks` and `deleted_objects`, where each deleted entry
    /// holds the resource id and a `deleted_at` timestamp or null.
    pub async fn get_changed_since(
        &self,
        since: &str,
        limit_per_type: Option<u32>,
    ) -> Result<Value> {
        let mut query = vec![("since".to_string(), since.to_string())];
        if let Some(limit) = limit_per_type {
            query.push(("limit_per_type".to_string(), limit.to_string()));
        }
        self.request(Method::Get, "/queries/changed-since", query, RequestBody::Empty)
            .await
    }

    pub async fn get_full_dataset(&self, query: FullDatasetQuery) -> Result<Value> {
        let mut params = Vec::new();
        if let Some(limit) = query.entity_limit {
            params.push(("entity_limit".to_string(), limit.to_string()));
        }
        if let Some(limit) = query.task_limit {
            params.push(("task_limit".to_string(), limit.to_string()));
        }
        if let Some(limit) = query.object_limit {
            params.push(("object_limit".to_string(), limit.to_string()));
        }
        self.request(Method::Get, "/queries/full", params, RequestBody::Empty)
            .await
    }
}

/// Content-Length is used only when it is unambiguous: non-empty, all
/// ASCII digits (no sign, no whitespace).
fn parse_content_length(header: Option<&str>) -> Option<u64> {
    let raw = header?;
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn serialize_references(references: &[ObjectReference]) -> Result<Value> {
    let values = references
        .iter()
        .map(|reference| reference.to_value(true))
        .collect::<serde_json::Result<Vec<_>>>()
        .map_err(Error::Serialize)?;
    Ok(Value::Array(values))
}
