//! Full lifecycle test against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then exercises every client
//! operation family over real HTTP: entities with validated components,
//! task transitions, multipart upload with reference attachment, object
//! downloads, reference maintenance and the bulk queries. Validates that
//! request building and response parsing work end-to-end with an actual
//! server rather than a canned transport.

use atlas_client::{
    AtlasCommandClient, CheckinOptions, CommandComponent, CreateEntity, CreateObject,
    CreateObjectMetadata, CreateTask, EntityComponents, Error, FullDatasetQuery, ObjectListQuery,
    ObjectReference, Page, RelatedObjectsPage, StatusComponent, TaskComponents, TaskListQuery,
    TaskParametersComponent, TelemetryComponent, UpdateEntity, UpdateObject, UpdateTask,
    UpdateTelemetry,
};
use serde_json::{json, Map};

async fn spawn_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { mock_server::run(listener).await.unwrap() });
    format!("http://{addr}")
}

#[tokio::test]
async fn full_lifecycle() {
    let base_url = spawn_server().await;
    let client = AtlasCommandClient::builder(&base_url)
        .token("integration-token")
        .build()
        .unwrap();

    // Step 1: service endpoints answer.
    let health = client.get_health().await.unwrap();
    assert_eq!(health["status"], "ok");
    let readiness = client.get_readiness().await.unwrap();
    assert_eq!(readiness["ready"], true);

    // Step 2: create an entity with validated components; unset component
    // fields must not reach the wire.
    let components = EntityComponents::builder()
        .telemetry(
            TelemetryComponent::builder()
                .latitude(40.7)
                .longitude(-74.0)
                .build()
                .unwrap(),
        )
        .status(StatusComponent::new("idle", None).unwrap())
        .build()
        .unwrap();
    let created = client
        .create_entity(CreateEntity {
            entity_id: "asset-7".to_string(),
            entity_type: "drone".to_string(),
            alias: "heron".to_string(),
            subtype: "fixed-wing".to_string(),
            components: Some(components),
        })
        .await
        .unwrap();
    assert_eq!(created["entity_id"], "asset-7");
    assert_eq!(created["components"]["telemetry"]["latitude"], 40.7);
    assert_eq!(created["components"]["status"]["value"], "idle");
    assert!(created["components"]["telemetry"].get("speed_m_s").is_none());

    // Step 3: fetch it back, by id and by alias.
    let fetched = client.get_entity("asset-7").await.unwrap();
    assert_eq!(fetched["alias"], "heron");
    let fetched = client.get_entity_by_alias("heron").await.unwrap();
    assert_eq!(fetched["entity_id"], "asset-7");
    let entities = client.list_entities(Page::default()).await.unwrap();
    assert_eq!(entities.as_array().unwrap().len(), 1);

    // Step 4: partial update merges without clobbering other components.
    let updated = client
        .update_entity(
            "asset-7",
            UpdateEntity {
                subtype: Some("fixed-wing-vtol".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated["subtype"], "fixed-wing-vtol");
    assert_eq!(updated["components"]["telemetry"]["latitude"], 40.7);

    // Step 5: raw telemetry patch touches only the sent fields.
    let updated = client
        .update_entity_telemetry(
            "asset-7",
            UpdateTelemetry {
                speed_m_s: Some(12.5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated["components"]["telemetry"]["speed_m_s"], 12.5);
    assert_eq!(updated["components"]["telemetry"]["latitude"], 40.7);

    // Step 6: create a task carrying command and parameter components.
    let task_components = TaskComponents::builder()
        .command(CommandComponent::new("survey").unwrap())
        .parameters(
            TaskParametersComponent::builder()
                .latitude(40.7)
                .longitude(-74.0)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    let mut task = CreateTask::new("t-1");
    task.entity_id = Some("asset-7".to_string());
    task.components = Some(task_components);
    let created = client.create_task(task).await.unwrap();
    assert_eq!(created["status"], "pending");
    assert_eq!(created["components"]["command"]["type"], "survey");

    let tasks = client
        .get_tasks_by_entity(
            "asset-7",
            TaskListQuery {
                status: Some("pending".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(tasks.as_array().unwrap().len(), 1);

    // Step 7: check in; the report lands on the entity and pending work
    // comes back.
    let checkin = client
        .checkin_entity(
            "asset-7",
            CheckinOptions {
                status: Some("operational".to_string()),
                heading_deg: Some(270.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let pending = checkin["tasks"].as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["task_id"], "t-1");
    let entity = client.get_entity("asset-7").await.unwrap();
    assert_eq!(entity["components"]["status"]["value"], "operational");
    assert_eq!(entity["components"]["telemetry"]["heading_deg"], 270.0);

    // Step 8: walk the task through its transitions.
    let task = client.start_task("t-1").await.unwrap();
    assert_eq!(task["status"], "acknowledged");
    let task = client
        .transition_task_status("t-1", "in_progress", true, None)
        .await
        .unwrap();
    assert_eq!(task["status"], "in_progress");
    let mut result = Map::new();
    result.insert("frames".to_string(), json!(42));
    let task = client.complete_task("t-1", Some(result)).await.unwrap();
    assert_eq!(task["status"], "completed");
    assert_eq!(task["result"]["frames"], 42);

    // Step 9: a validated transition out of a terminal status is refused.
    let err = client
        .transition_task_status("t-1", "pending", true, None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(409));

    // Step 10: a second task fails with diagnostics attached.
    client.create_task(CreateTask::new("t-2")).await.unwrap();
    let mut extra = Map::new();
    extra.insert("operator".to_string(), json!("ops-1"));
    let task = client
        .update_task(
            "t-2",
            UpdateTask {
                extra: Some(extra),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(task["extra"]["operator"], "ops-1");
    let task = client
        .fail_task("t-2", Some("sensor offline"), None)
        .await
        .unwrap();
    assert_eq!(task["status"], "failed");
    assert_eq!(task["error_message"], "sensor offline");

    // Step 11: upload an object; references are attached one by one after
    // the multipart request.
    let mut object = CreateObject::new("obj-1", "text/plain");
    object.file_name = Some("report.txt".to_string());
    object.usage_hint = Some("thumbnail".to_string());
    object.referenced_by = vec![
        ObjectReference::entity("asset-7"),
        ObjectReference::task("t-1"),
    ];
    let stored = client
        .create_object(b"hello atlas".to_vec(), object)
        .await
        .unwrap();
    assert_eq!(stored["object_id"], "obj-1");
    assert_eq!(stored["size_bytes"], 11);
    let info = client.get_object_references("obj-1").await.unwrap();
    assert_eq!(info["count"], 2);

    // Step 12: the content round-trips, as bytes and as text.
    let download = client.download_object("obj-1").await.unwrap();
    assert_eq!(&download.content[..], b"hello atlas");
    assert_eq!(download.content_type.as_deref(), Some("text/plain"));
    assert_eq!(download.content_length, Some(11));
    let view = client.view_object("obj-1").await.unwrap();
    assert_eq!(view.content, "hello atlas");

    // Step 13: the object is listed under its owners and by filter.
    let owned = client
        .get_objects_by_entity("asset-7", RelatedObjectsPage::default())
        .await
        .unwrap();
    assert_eq!(owned.as_array().unwrap().len(), 1);
    let owned = client
        .get_objects_by_task("t-1", RelatedObjectsPage::default())
        .await
        .unwrap();
    assert_eq!(owned.as_array().unwrap().len(), 1);
    let objects = client
        .list_objects(ObjectListQuery {
            content_type: Some("text/plain".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(objects.as_array().unwrap().len(), 1);

    // Step 14: register metadata without content; it starts orphaned.
    let mut metadata = CreateObjectMetadata::new("obj-2");
    metadata.content_type = Some("application/geo+json".to_string());
    metadata.path = Some("overlays/zone.geojson".to_string());
    let record = client.create_object_metadata(metadata).await.unwrap();
    assert_eq!(record["referenced_by"], json!([]));
    let orphaned = client.find_orphaned_objects(Page::default()).await.unwrap();
    let orphaned = orphaned.as_array().unwrap();
    assert_eq!(orphaned.len(), 1);
    assert_eq!(orphaned[0]["object_id"], "obj-2");

    let record = client
        .update_object(
            "obj-2",
            UpdateObject {
                usage_hints: Some(vec!["map-overlay".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(record["usage_hints"], json!(["map-overlay"]));

    // Step 15: attach and detach a reference on the metadata object.
    let reference = ObjectReference::task("t-2");
    let record = client
        .add_object_reference("obj-2", &reference)
        .await
        .unwrap();
    assert_eq!(record["referenced_by"].as_array().unwrap().len(), 1);
    let record = client
        .remove_object_reference("obj-2", &reference)
        .await
        .unwrap();
    assert_eq!(record["referenced_by"], json!([]));

    // Step 16: deleting a task leaves a dangling reference behind, which
    // validation reports and cleanup removes.
    client.delete_task("t-1").await.unwrap();
    let report = client.validate_object_references("obj-1").await.unwrap();
    let report = report.as_array().unwrap();
    assert_eq!(report.len(), 2);
    assert_eq!(report[0]["valid"], true);
    assert_eq!(report[1]["valid"], false);
    let cleaned = client.cleanup_object_references("obj-1").await.unwrap();
    assert_eq!(cleaned["removed"], 1);
    assert_eq!(cleaned["referenced_by"].as_array().unwrap().len(), 1);

    // Step 17: bulk queries see the surviving records and the deletion.
    let delta = client
        .get_changed_since("2000-01-01T00:00:00Z", None)
        .await
        .unwrap();
    assert_eq!(delta["entities"].as_array().unwrap().len(), 1);
    assert_eq!(delta["deleted_tasks"].as_array().unwrap().len(), 1);
    assert_eq!(delta["deleted_tasks"][0]["task_id"], "t-1");
    let snapshot = client
        .get_full_dataset(FullDatasetQuery::default())
        .await
        .unwrap();
    assert_eq!(snapshot["entities"].as_array().unwrap().len(), 1);
    assert_eq!(snapshot["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(snapshot["objects"].as_array().unwrap().len(), 2);

    // Step 18: tear down and confirm the 404 surfaces as a status error.
    client.delete_object("obj-1").await.unwrap();
    client.delete_object("obj-2").await.unwrap();
    client.delete_entity("asset-7").await.unwrap();
    let err = client.get_entity("asset-7").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn closed_client_refuses_requests() {
    let base_url = spawn_server().await;
    let mut client = AtlasCommandClient::new(&base_url).unwrap();

    client.get_health().await.unwrap();
    client.close();
    assert!(client.is_closed());
    let err = client.get_health().await.unwrap_err();
    assert!(matches!(err, Error::Closed));
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = AtlasCommandClient::new(&format!("http://{addr}")).unwrap();
    let err = client.get_health().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}
