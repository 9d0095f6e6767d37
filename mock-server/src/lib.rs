use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

const TERMINAL_STATUSES: [&str; 3] = ["completed", "failed", "cancelled"];

/// In-memory state behind the mock API: records are stored as plain JSON so
/// the server tolerates the same open schemas the real one does.
#[derive(Default)]
pub struct Store {
    pub entities: BTreeMap<String, Value>,
    pub tasks: BTreeMap<String, Value>,
    pub objects: BTreeMap<String, Value>,
    pub contents: HashMap<String, Bytes>,
    pub deleted_entities: Vec<(String, String)>,
    pub deleted_tasks: Vec<(String, String)>,
    pub deleted_objects: Vec<(String, String)>,
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Deserialize)]
pub struct Paging {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Deserialize)]
pub struct TaskQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Deserialize)]
pub struct ObjectQuery {
    pub content_type: Option<String>,
    #[serde(rename = "type")]
    pub object_type: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Deserialize)]
pub struct CheckinQuery {
    pub status_filter: Option<String>,
    pub limit: Option<usize>,
    pub since: Option<String>,
    pub fields: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangedSinceQuery {
    pub since: String,
    pub limit_per_type: Option<usize>,
}

#[derive(Deserialize)]
pub struct FullQuery {
    pub entity_limit: Option<usize>,
    pub task_limit: Option<usize>,
    pub object_limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct CreateEntityBody {
    pub entity_id: String,
    pub entity_type: String,
    pub alias: String,
    pub subtype: String,
    #[serde(default)]
    pub components: Option<Value>,
}

#[derive(Deserialize)]
pub struct UpdateEntityBody {
    pub components: Option<Value>,
    pub subtype: Option<String>,
}

#[derive(Deserialize)]
pub struct CheckinBody {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_m: Option<f64>,
    pub speed_m_s: Option<f64>,
    pub heading_deg: Option<f64>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateTaskBody {
    pub task_id: String,
    #[serde(default = "default_task_status")]
    pub status: String,
    pub entity_id: Option<String>,
    pub components: Option<Value>,
    pub extra: Option<Value>,
}

#[derive(Deserialize)]
pub struct UpdateTaskBody {
    pub status: Option<String>,
    pub entity_id: Option<String>,
    pub components: Option<Value>,
    pub extra: Option<Value>,
}

#[derive(Deserialize)]
pub struct TransitionBody {
    pub status: String,
    #[serde(default = "default_true")]
    pub validate: bool,
    pub extra: Option<Value>,
}

#[derive(Deserialize)]
pub struct CompleteBody {
    pub result: Option<Value>,
}

#[derive(Deserialize)]
pub struct FailBody {
    pub error_message: Option<String>,
    pub error_details: Option<Value>,
}

#[derive(Deserialize)]
pub struct UpdateObjectBody {
    pub usage_hints: Option<Value>,
    pub referenced_by: Option<Value>,
}

#[derive(Deserialize)]
pub struct ReferenceBody {
    pub entity_id: Option<String>,
    pub task_id: Option<String>,
}

fn default_task_status() -> String {
    "pending".to_string()
}

fn default_true() -> bool {
    true
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/readiness", get(readiness))
        .route("/entities", get(list_entities).post(create_entity))
        .route(
            "/entities/{id}",
            get(get_entity).patch(update_entity).delete(delete_entity),
        )
        .route("/entities/alias/{alias}", get(get_entity_by_alias))
        .route("/entities/{id}/checkin", post(checkin_entity))
        .route("/entities/{id}/telemetry", patch(update_entity_telemetry))
        .route("/entities/{id}/tasks", get(tasks_by_entity))
        .route("/entities/{id}/objects", get(objects_by_entity))
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/tasks/{id}/acknowledge", post(acknowledge_task))
        .route("/tasks/{id}/complete", post(complete_task))
        .route("/tasks/{id}/status", post(transition_task))
        .route("/tasks/{id}/fail", post(fail_task))
        .route("/tasks/{id}/objects", get(objects_by_task))
        .route("/objects", get(list_objects).post(create_object_metadata))
        .route("/objects/upload", post(upload_object))
        .route("/objects/orphaned", get(orphaned_objects))
        .route(
            "/objects/{id}",
            get(get_object).patch(update_object).delete(delete_object),
        )
        .route("/objects/{id}/download", get(download_object))
        .route("/objects/{id}/view", get(view_object))
        .route(
            "/objects/{id}/references",
            post(add_reference).delete(remove_reference),
        )
        .route("/objects/{id}/references/info", get(reference_info))
        .route("/objects/{id}/references/validate", get(validate_references))
        .route("/objects/{id}/references/cleanup", post(cleanup_references))
        .route("/queries/changed-since", get(changed_since))
        .route("/queries/full", get(full_dataset))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn paginate(values: Vec<Value>, limit: usize, offset: usize) -> Vec<Value> {
    values.into_iter().skip(offset).take(limit).collect()
}

fn ensure_object(slot: &mut Value) -> &mut Map<String, Value> {
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn is_terminal(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).ok()
}

fn record_changed_after(record: &Value, since: DateTime<FixedOffset>) -> bool {
    record
        .get("updated_at")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .map(|at| at > since)
        .unwrap_or(false)
}

fn reference_names(reference: &Value) -> (Option<&str>, Option<&str>) {
    (
        reference.get("entity_id").and_then(Value::as_str),
        reference.get("task_id").and_then(Value::as_str),
    )
}

fn reference_is_valid(store: &Store, reference: &Value) -> bool {
    let (entity_id, task_id) = reference_names(reference);
    if entity_id.is_none() && task_id.is_none() {
        return false;
    }
    if let Some(id) = entity_id {
        if !store.entities.contains_key(id) {
            return false;
        }
    }
    if let Some(id) = task_id {
        if !store.tasks.contains_key(id) {
            return false;
        }
    }
    true
}

fn references_of(record: &Value) -> Vec<Value> {
    record
        .get("referenced_by")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn references_resource(record: &Value, key: &str, id: &str) -> bool {
    references_of(record)
        .iter()
        .any(|reference| reference.get(key).and_then(Value::as_str) == Some(id))
}

// Service ----------------------------------------------------------------

async fn root() -> Json<Value> {
    Json(json!({"service": "atlas-command-mock", "status": "ok"}))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn readiness() -> Json<Value> {
    Json(json!({"ready": true}))
}

// Entities ----------------------------------------------------------------

async fn list_entities(State(db): State<Db>, Query(paging): Query<Paging>) -> Json<Vec<Value>> {
    let store = db.read().await;
    let entities = store.entities.values().cloned().collect();
    Json(paginate(
        entities,
        paging.limit.unwrap_or(100),
        paging.offset.unwrap_or(0),
    ))
}

async fn create_entity(
    State(db): State<Db>,
    Json(body): Json<CreateEntityBody>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    if body.entity_id.is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let mut store = db.write().await;
    if store.entities.contains_key(&body.entity_id) {
        return Err(StatusCode::CONFLICT);
    }
    let stamp = now();
    let record = json!({
        "entity_id": body.entity_id,
        "entity_type": body.entity_type,
        "alias": body.alias,
        "subtype": body.subtype,
        "components": body.components,
        "created_at": stamp,
        "updated_at": stamp,
    });
    store.entities.insert(body.entity_id.clone(), record.clone());
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_entity(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    store
        .entities
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_entity_by_alias(
    State(db): State<Db>,
    Path(alias): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    store
        .entities
        .values()
        .find(|record| record.get("alias").and_then(Value::as_str) == Some(alias.as_str()))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_entity(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(body): Json<UpdateEntityBody>,
) -> Result<Json<Value>, StatusCode> {
    if body.components.is_none() && body.subtype.is_none() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let mut store = db.write().await;
    let record = store.entities.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(Value::Object(updates)) = body.components {
        let components = ensure_object(&mut record["components"]);
        for (key, value) in updates {
            components.insert(key, value);
        }
    }
    if let Some(subtype) = body.subtype {
        record["subtype"] = Value::String(subtype);
    }
    record["updated_at"] = Value::String(now());
    Ok(Json(record.clone()))
}

async fn delete_entity(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    if store.entities.remove(&id).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    store.deleted_entities.push((id, now()));
    Ok(StatusCode::NO_CONTENT)
}

fn apply_telemetry(record: &mut Value, body: &CheckinBody) {
    let components = ensure_object(&mut record["components"]);
    let telemetry = ensure_object(components.entry("telemetry").or_insert(Value::Null));
    for (key, value) in [
        ("latitude", body.latitude),
        ("longitude", body.longitude),
        ("altitude_m", body.altitude_m),
        ("speed_m_s", body.speed_m_s),
        ("heading_deg", body.heading_deg),
    ] {
        if let Some(value) = value {
            telemetry.insert(key.to_string(), json!(value));
        }
    }
}

fn project_fields(record: &Value, fields: &str) -> Value {
    let keep: Vec<&str> = fields.split(',').map(str::trim).collect();
    let mut projected = Map::new();
    if let Some(map) = record.as_object() {
        for (key, value) in map {
            if key == "task_id" || keep.contains(&key.as_str()) {
                projected.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(projected)
}

async fn checkin_entity(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<CheckinQuery>,
    Json(body): Json<CheckinBody>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let record = store.entities.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    apply_telemetry(record, &body);
    if let Some(status) = &body.status {
        let components = ensure_object(&mut record["components"]);
        let status_slot = ensure_object(components.entry("status").or_insert(Value::Null));
        status_slot.insert("value".to_string(), Value::String(status.clone()));
        status_slot.insert("last_update".to_string(), Value::String(now()));
    }
    record["updated_at"] = Value::String(now());

    let filter = query
        .status_filter
        .unwrap_or_else(|| "pending,acknowledged".to_string());
    let accepted: Vec<&str> = filter.split(',').map(str::trim).collect();
    let since = query.since.as_deref().and_then(parse_timestamp);
    let tasks: Vec<Value> = store
        .tasks
        .values()
        .filter(|task| task.get("entity_id").and_then(Value::as_str) == Some(id.as_str()))
        .filter(|task| {
            task.get("status")
                .and_then(Value::as_str)
                .map(|status| accepted.contains(&status))
                .unwrap_or(false)
        })
        .filter(|task| since.map_or(true, |since| record_changed_after(task, since)))
        .take(query.limit.unwrap_or(10))
        .map(|task| match &query.fields {
            Some(fields) => project_fields(task, fields),
            None => task.clone(),
        })
        .collect();

    Ok(Json(json!({"entity_id": id, "tasks": tasks})))
}

async fn update_entity_telemetry(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(body): Json<CheckinBody>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let record = store.entities.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    apply_telemetry(record, &body);
    record["updated_at"] = Value::String(now());
    Ok(Json(record.clone()))
}

async fn tasks_by_entity(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<TaskQuery>,
) -> Json<Vec<Value>> {
    let store = db.read().await;
    let tasks: Vec<Value> = store
        .tasks
        .values()
        .filter(|task| task.get("entity_id").and_then(Value::as_str) == Some(id.as_str()))
        .filter(|task| match &query.status {
            Some(status) => task.get("status").and_then(Value::as_str) == Some(status.as_str()),
            None => true,
        })
        .cloned()
        .collect();
    Json(paginate(
        tasks,
        query.limit.unwrap_or(25),
        query.offset.unwrap_or(0),
    ))
}

async fn objects_by_entity(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(paging): Query<Paging>,
) -> Json<Vec<Value>> {
    let store = db.read().await;
    let objects: Vec<Value> = store
        .objects
        .values()
        .filter(|record| references_resource(record, "entity_id", &id))
        .cloned()
        .collect();
    Json(paginate(
        objects,
        paging.limit.unwrap_or(50),
        paging.offset.unwrap_or(0),
    ))
}

// Tasks ---------------------------------------------------------------------

async fn list_tasks(State(db): State<Db>, Query(query): Query<TaskQuery>) -> Json<Vec<Value>> {
    let store = db.read().await;
    let tasks: Vec<Value> = store
        .tasks
        .values()
        .filter(|task| match &query.status {
            Some(status) => task.get("status").and_then(Value::as_str) == Some(status.as_str()),
            None => true,
        })
        .cloned()
        .collect();
    Json(paginate(
        tasks,
        query.limit.unwrap_or(25),
        query.offset.unwrap_or(0),
    ))
}

async fn create_task(
    State(db): State<Db>,
    Json(body): Json<CreateTaskBody>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    if body.task_id.is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let mut store = db.write().await;
    if store.tasks.contains_key(&body.task_id) {
        return Err(StatusCode::CONFLICT);
    }
    let stamp = now();
    let mut record = json!({
        "task_id": body.task_id,
        "status": body.status,
        "created_at": stamp,
        "updated_at": stamp,
    });
    if let Some(entity_id) = body.entity_id {
        record["entity_id"] = Value::String(entity_id);
    }
    if let Some(components) = body.components {
        record["components"] = components;
    }
    if let Some(extra) = body.extra {
        record["extra"] = extra;
    }
    store.tasks.insert(body.task_id.clone(), record.clone());
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_task(State(db): State<Db>, Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    store
        .tasks
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_task(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTaskBody>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let record = store.tasks.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(status) = body.status {
        record["status"] = Value::String(status);
    }
    if let Some(entity_id) = body.entity_id {
        record["entity_id"] = Value::String(entity_id);
    }
    if let Some(Value::Object(updates)) = body.components {
        let components = ensure_object(&mut record["components"]);
        for (key, value) in updates {
            components.insert(key, value);
        }
    }
    if let Some(extra) = body.extra {
        record["extra"] = extra;
    }
    record["updated_at"] = Value::String(now());
    Ok(Json(record.clone()))
}

async fn delete_task(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    if store.tasks.remove(&id).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    store.deleted_tasks.push((id, now()));
    Ok(StatusCode::NO_CONTENT)
}

fn set_task_status(record: &mut Value, status: &str) {
    record["status"] = Value::String(status.to_string());
    record["updated_at"] = Value::String(now());
}

async fn acknowledge_task(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let record = store.tasks.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    set_task_status(record, "acknowledged");
    Ok(Json(record.clone()))
}

async fn complete_task(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let record = store.tasks.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    set_task_status(record, "completed");
    if let Some(result) = body.result {
        record["result"] = result;
    }
    Ok(Json(record.clone()))
}

async fn transition_task(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(body): Json<TransitionBody>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let record = store.tasks.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if body.validate {
        let current = record.get("status").and_then(Value::as_str).unwrap_or("");
        if is_terminal(current) {
            return Err(StatusCode::CONFLICT);
        }
    }
    set_task_status(record, &body.status);
    if let Some(extra) = body.extra {
        record["extra"] = extra;
    }
    Ok(Json(record.clone()))
}

async fn fail_task(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(body): Json<FailBody>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let record = store.tasks.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    set_task_status(record, "failed");
    record["error_message"] = body.error_message.map(Value::String).unwrap_or(Value::Null);
    record["error_details"] = body.error_details.unwrap_or(Value::Null);
    Ok(Json(record.clone()))
}

async fn objects_by_task(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(paging): Query<Paging>,
) -> Json<Vec<Value>> {
    let store = db.read().await;
    let objects: Vec<Value> = store
        .objects
        .values()
        .filter(|record| references_resource(record, "task_id", &id))
        .cloned()
        .collect();
    Json(paginate(
        objects,
        paging.limit.unwrap_or(50),
        paging.offset.unwrap_or(0),
    ))
}

// Objects ---------------------------------------------------------------------

async fn list_objects(State(db): State<Db>, Query(query): Query<ObjectQuery>) -> Json<Vec<Value>> {
    let store = db.read().await;
    let objects: Vec<Value> = store
        .objects
        .values()
        .filter(|record| match &query.content_type {
            Some(filter) => {
                record.get("content_type").and_then(Value::as_str) == Some(filter.as_str())
            }
            None => true,
        })
        .filter(|record| match &query.object_type {
            Some(filter) => record.get("type").and_then(Value::as_str) == Some(filter.as_str()),
            None => true,
        })
        .cloned()
        .collect();
    Json(paginate(
        objects,
        query.limit.unwrap_or(100),
        query.offset.unwrap_or(0),
    ))
}

async fn get_object(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    store
        .objects
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn create_object_metadata(
    State(db): State<Db>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let mut record = match body {
        Value::Object(map) => map,
        _ => return Err(StatusCode::UNPROCESSABLE_ENTITY),
    };
    let object_id = record
        .get("object_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(StatusCode::UNPROCESSABLE_ENTITY)?;
    let mut store = db.write().await;
    if store.objects.contains_key(&object_id) {
        return Err(StatusCode::CONFLICT);
    }
    let stamp = now();
    record.insert("created_at".to_string(), Value::String(stamp.clone()));
    record.insert("updated_at".to_string(), Value::String(stamp));
    record
        .entry("referenced_by".to_string())
        .or_insert_with(|| json!([]));
    let record = Value::Object(record);
    store.objects.insert(object_id, record.clone());
    Ok((StatusCode::CREATED, Json(record)))
}

async fn upload_object(
    State(db): State<Db>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let mut object_id = None;
    let mut usage_hint = None;
    let mut object_type = None;
    let mut file: Option<(Bytes, Option<String>, Option<String>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let content_type = field.content_type().map(str::to_string);
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                file = Some((bytes, content_type, file_name));
            }
            Some("object_id") => {
                object_id = Some(field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?);
            }
            Some("usage_hint") => {
                usage_hint = Some(field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?);
            }
            Some("type") => {
                object_type = Some(field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?);
            }
            _ => {}
        }
    }
    let (bytes, content_type, file_name) = file.ok_or(StatusCode::BAD_REQUEST)?;
    let object_id = object_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut store = db.write().await;
    let stamp = now();
    let mut record = Map::new();
    record.insert("object_id".to_string(), Value::String(object_id.clone()));
    record.insert("size_bytes".to_string(), json!(bytes.len()));
    if let Some(content_type) = content_type {
        record.insert("content_type".to_string(), Value::String(content_type));
    }
    if let Some(file_name) = file_name {
        record.insert("file_name".to_string(), Value::String(file_name));
    }
    if let Some(usage_hint) = usage_hint {
        record.insert("usage_hints".to_string(), json!([usage_hint]));
    }
    if let Some(object_type) = object_type {
        record.insert("type".to_string(), Value::String(object_type));
    }
    record.insert("referenced_by".to_string(), json!([]));
    record.insert("created_at".to_string(), Value::String(stamp.clone()));
    record.insert("updated_at".to_string(), Value::String(stamp));
    let record = Value::Object(record);
    store.contents.insert(object_id.clone(), bytes);
    store.objects.insert(object_id, record.clone());
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_object(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(body): Json<UpdateObjectBody>,
) -> Result<Json<Value>, StatusCode> {
    if body.usage_hints.is_none() && body.referenced_by.is_none() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let mut store = db.write().await;
    let record = store.objects.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(usage_hints) = body.usage_hints {
        record["usage_hints"] = usage_hints;
    }
    if let Some(referenced_by) = body.referenced_by {
        record["referenced_by"] = referenced_by;
    }
    record["updated_at"] = Value::String(now());
    Ok(Json(record.clone()))
}

async fn delete_object(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    if store.objects.remove(&id).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    store.contents.remove(&id);
    store.deleted_objects.push((id, now()));
    Ok(StatusCode::NO_CONTENT)
}

async fn download_object(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<([(header::HeaderName, String); 2], Bytes), StatusCode> {
    let store = db.read().await;
    let record = store.objects.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let bytes = store
        .contents
        .get(&id)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;
    let content_type = record
        .get("content_type")
        .and_then(Value::as_str)
        .unwrap_or("application/octet-stream")
        .to_string();
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, bytes.len().to_string()),
        ],
        bytes,
    ))
}

async fn view_object(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<([(header::HeaderName, String); 2], String), StatusCode> {
    let store = db.read().await;
    if !store.objects.contains_key(&id) {
        return Err(StatusCode::NOT_FOUND);
    }
    let bytes = store.contents.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let text = String::from_utf8_lossy(bytes).into_owned();
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_LENGTH, text.len().to_string()),
        ],
        text,
    ))
}

async fn orphaned_objects(State(db): State<Db>, Query(paging): Query<Paging>) -> Json<Vec<Value>> {
    let store = db.read().await;
    let objects: Vec<Value> = store
        .objects
        .values()
        .filter(|record| references_of(record).is_empty())
        .cloned()
        .collect();
    Json(paginate(
        objects,
        paging.limit.unwrap_or(100),
        paging.offset.unwrap_or(0),
    ))
}

async fn add_reference(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(body): Json<ReferenceBody>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let record = store.objects.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    let mut reference = Map::new();
    if let Some(entity_id) = body.entity_id {
        reference.insert("entity_id".to_string(), Value::String(entity_id));
    }
    if let Some(task_id) = body.task_id {
        reference.insert("task_id".to_string(), Value::String(task_id));
    }
    let references = ensure_object(record)
        .entry("referenced_by".to_string())
        .or_insert_with(|| json!([]));
    if let Value::Array(items) = references {
        items.push(Value::Object(reference));
    }
    record["updated_at"] = Value::String(now());
    Ok(Json(record.clone()))
}

async fn remove_reference(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(body): Json<ReferenceBody>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let record = store.objects.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(Value::Array(items)) = record.get_mut("referenced_by") {
        items.retain(|reference| {
            let (entity_id, task_id) = reference_names(reference);
            entity_id != body.entity_id.as_deref() || task_id != body.task_id.as_deref()
        });
    }
    record["updated_at"] = Value::String(now());
    Ok(Json(record.clone()))
}

async fn reference_info(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    let record = store.objects.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let references = references_of(record);
    Ok(Json(json!({
        "object_id": id,
        "count": references.len(),
        "referenced_by": references,
    })))
}

async fn validate_references(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Value>>, StatusCode> {
    let store = db.read().await;
    let record = store.objects.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let report = references_of(record)
        .into_iter()
        .map(|reference| {
            let valid = reference_is_valid(&store, &reference);
            let mut entry = reference.as_object().cloned().unwrap_or_default();
            entry.insert("valid".to_string(), Value::Bool(valid));
            Value::Object(entry)
        })
        .collect();
    Ok(Json(report))
}

async fn cleanup_references(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let record = store.objects.get(&id).cloned().ok_or(StatusCode::NOT_FOUND)?;
    let references = references_of(&record);
    let kept: Vec<Value> = references
        .iter()
        .filter(|reference| reference_is_valid(&store, reference))
        .cloned()
        .collect();
    let removed = references.len() - kept.len();
    if let Some(record) = store.objects.get_mut(&id) {
        record["referenced_by"] = Value::Array(kept.clone());
        record["updated_at"] = Value::String(now());
    }
    Ok(Json(json!({
        "object_id": id,
        "removed": removed,
        "referenced_by": kept,
    })))
}

// Queries ----------------------------------------------------------------------

async fn changed_since(
    State(db): State<Db>,
    Query(query): Query<ChangedSinceQuery>,
) -> Result<Json<Value>, StatusCode> {
    let since = parse_timestamp(&query.since).ok_or(StatusCode::BAD_REQUEST)?;
    let limit = query.limit_per_type.unwrap_or(usize::MAX);
    let store = db.read().await;

    let changed = |records: &BTreeMap<String, Value>| -> Vec<Value> {
        records
            .values()
            .filter(|record| record_changed_after(record, since))
            .take(limit)
            .cloned()
            .collect()
    };
    let deleted = |log: &[(String, String)], key: &str| -> Vec<Value> {
        log.iter()
            .filter(|(_, at)| parse_timestamp(at).map(|at| at > since).unwrap_or(false))
            .take(limit)
            .map(|(id, at)| json!({key: id, "deleted_at": at}))
            .collect()
    };

    Ok(Json(json!({
        "entities": changed(&store.entities),
        "tasks": changed(&store.tasks),
        "objects": changed(&store.objects),
        "deleted_entities": deleted(&store.deleted_entities, "entity_id"),
        "deleted_tasks": deleted(&store.deleted_tasks, "task_id"),
        "deleted_objects": deleted(&store.deleted_objects, "object_id"),
    })))
}

async fn full_dataset(State(db): State<Db>, Query(query): Query<FullQuery>) -> Json<Value> {
    let store = db.read().await;
    let collect = |records: &BTreeMap<String, Value>, limit: Option<usize>| -> Vec<Value> {
        records
            .values()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    };
    Json(json!({
        "entities": collect(&store.entities, query.entity_limit),
        "tasks": collect(&store.tasks, query.task_limit),
        "objects": collect(&store.objects, query.object_limit),
    }))
}
