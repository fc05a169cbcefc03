//! HTTP-level tests for the Compute Engine client.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::instance_config::{InstanceRequest, InstanceTemplate};

const PROJECT: &str = "demo-project";
const ZONE: &str = "us-central1-a";

async fn client(version: ApiVersion) -> (MockServer, ComputeClient) {
    let server = MockServer::start().await;
    let client = ComputeClient::with_endpoint(
        server.uri(),
        version,
        Credentials::from_access_token("test-token"),
    )
    .unwrap_or_else(|err| panic!("client: {err}"));
    (server, client)
}

#[test]
fn public_client_targets_the_versioned_api_root() {
    let client = ComputeClient::new(ApiVersion::Beta, Credentials::from_access_token("t"))
        .unwrap_or_else(|err| panic!("client: {err}"));

    assert_eq!(client.version(), ApiVersion::Beta);
    assert_eq!(
        client.project_url(PROJECT, "zones"),
        format!("{COMPUTE_API_ROOT}/beta/projects/{PROJECT}/zones")
    );
}

fn running_operation(name: &str) -> serde_json::Value {
    json!({ "name": name, "status": "RUNNING", "operationType": "insert" })
}

#[tokio::test]
async fn list_zones_returns_names_with_bearer_auth() {
    let (server, client) = client(ApiVersion::V1).await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/demo-project/zones"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "name": "us-central1-a" }, { "name": "europe-west1-b" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let zones = client
        .list_zones(PROJECT)
        .await
        .unwrap_or_else(|err| panic!("list zones: {err}"));

    assert_eq!(zones, vec!["us-central1-a", "europe-west1-b"]);
}

#[tokio::test]
async fn empty_listing_without_items_is_empty() {
    let (server, client) = client(ApiVersion::V1).await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/demo-project/zones/us-central1-a/instances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "compute#instanceList"
        })))
        .mount(&server)
        .await;

    let instances = client
        .list_instances(PROJECT, ZONE)
        .await
        .unwrap_or_else(|err| panic!("list instances: {err}"));

    assert!(instances.is_empty());
}

#[tokio::test]
async fn list_instances_follows_page_tokens() {
    let (server, client) = client(ApiVersion::V1).await;
    let list_path = "/v1/projects/demo-project/zones/us-central1-a/instances";
    Mock::given(method("GET"))
        .and(path(list_path))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "name": "second", "id": "2" }]
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(list_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "name": "first", "id": "1" }],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let instances = client
        .list_instances(PROJECT, ZONE)
        .await
        .unwrap_or_else(|err| panic!("list instances: {err}"));

    let names: Vec<_> = instances
        .iter()
        .filter_map(|instance| instance.name.as_deref())
        .collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[tokio::test]
async fn get_instance_decodes_string_encoded_int64_fields() {
    let (server, client) = client(ApiVersion::V1).await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/demo-project/zones/us-central1-a/instances/vm-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "8167307532474612345",
            "name": "vm-1",
            "status": "RUNNING",
            "disks": [{ "diskSizeGb": "50", "boot": true, "type": "PERSISTENT" }]
        })))
        .mount(&server)
        .await;

    let instance = client
        .get_instance(PROJECT, ZONE, "vm-1")
        .await
        .unwrap_or_else(|err| panic!("get instance: {err}"));

    assert_eq!(instance.id.as_deref(), Some("8167307532474612345"));
    let boot = instance.disks.first().unwrap_or_else(|| panic!("boot disk"));
    assert_eq!(boot.disk_size_gb.as_deref(), Some("50"));
    assert!(boot.boot);
}

#[tokio::test]
async fn insert_posts_the_instance_config() {
    let (server, client) = client(ApiVersion::V1).await;
    Mock::given(method("POST"))
        .and(path("/v1/projects/demo-project/zones/us-central1-a/instances"))
        .and(body_partial_json(json!({
            "name": "vm-1",
            "machineType": "zones/us-central1-a/machineTypes/n2-highmem-4",
            "tags": { "items": ["sap", "http"] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(running_operation("op-insert")))
        .expect(1)
        .mount(&server)
        .await;
    let config = InstanceTemplate::default().build(
        &InstanceRequest::new(ZONE, "vm-1"),
        "projects/debian-cloud/global/images/debian-11-bullseye-v20240110",
        String::from("#!/bin/bash"),
    );

    let operation = client
        .insert_instance(PROJECT, ZONE, &config)
        .await
        .unwrap_or_else(|err| panic!("insert: {err}"));

    assert_eq!(operation.name, "op-insert");
    assert_eq!(operation.status, model::OperationStatus::Running);
}

#[tokio::test]
async fn suspend_targets_beta_and_discards_local_ssd() {
    let (server, client) = client(ApiVersion::Beta).await;
    Mock::given(method("POST"))
        .and(path(
            "/beta/projects/demo-project/zones/us-central1-a/instances/vm-1/suspend",
        ))
        .and(query_param("discardLocalSsd", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(running_operation("op-suspend")))
        .expect(1)
        .mount(&server)
        .await;

    let operation = client
        .perform_action(
            PROJECT,
            ZONE,
            "vm-1",
            InstanceAction::Suspend {
                discard_local_ssd: true,
            },
        )
        .await
        .unwrap_or_else(|err| panic!("suspend: {err}"));

    assert_eq!(operation.name, "op-suspend");
}

#[tokio::test]
async fn delete_and_state_actions_use_their_verbs() {
    let (server, client) = client(ApiVersion::V1).await;
    let instance_path = "/v1/projects/demo-project/zones/us-central1-a/instances/vm-1";
    Mock::given(method("DELETE"))
        .and(path(instance_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(running_operation("op-delete")))
        .expect(1)
        .mount(&server)
        .await;
    for verb in ["start", "stop", "resume"] {
        Mock::given(method("POST"))
            .and(path(format!("{instance_path}/{verb}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(running_operation(&format!("op-{verb}"))),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let deleted = client
        .delete_instance(PROJECT, ZONE, "vm-1")
        .await
        .unwrap_or_else(|err| panic!("delete: {err}"));
    assert_eq!(deleted.name, "op-delete");

    for action in [
        InstanceAction::Start,
        InstanceAction::Stop,
        InstanceAction::Resume,
    ] {
        let operation = client
            .perform_action(PROJECT, ZONE, "vm-1", action)
            .await
            .unwrap_or_else(|err| panic!("{action}: {err}"));
        assert_eq!(operation.name, format!("op-{action}"));
    }
}

#[tokio::test]
async fn zone_operation_and_image_family_paths() {
    let (server, client) = client(ApiVersion::V1).await;
    Mock::given(method("GET"))
        .and(path(
            "/v1/projects/demo-project/zones/us-central1-a/operations/op-1",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "op-1",
            "status": "DONE"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/debian-cloud/global/images/family/debian-11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "debian-11-bullseye-v20240110",
            "selfLink": "https://www.googleapis.com/compute/v1/projects/debian-cloud/global/images/debian-11-bullseye-v20240110"
        })))
        .mount(&server)
        .await;

    let operation = client
        .get_zone_operation(PROJECT, ZONE, "op-1")
        .await
        .unwrap_or_else(|err| panic!("operation: {err}"));
    let image = client
        .get_image_from_family("debian-cloud", "debian-11")
        .await
        .unwrap_or_else(|err| panic!("image: {err}"));

    assert!(operation.status.is_done());
    assert_eq!(image.name.as_deref(), Some("debian-11-bullseye-v20240110"));
}

#[tokio::test]
async fn api_errors_carry_the_service_message() {
    let (server, client) = client(ApiVersion::V1).await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/demo-project/zones/us-central1-a/instances/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "code": 404,
                "message": "The resource 'projects/demo-project/zones/us-central1-a/instances/ghost' was not found"
            }
        })))
        .mount(&server)
        .await;

    let err = client
        .get_instance(PROJECT, ZONE, "ghost")
        .await
        .expect_err("missing instance should fail");

    assert!(
        matches!(err, ComputeError::Api { status: 404, ref message } if message.contains("was not found")),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn non_json_error_bodies_are_kept_verbatim() {
    let (server, client) = client(ApiVersion::V1).await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/demo-project/zones"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = client
        .list_zones(PROJECT)
        .await
        .expect_err("gateway error should fail");

    assert_eq!(
        err,
        ComputeError::Api {
            status: 502,
            message: String::from("upstream unavailable"),
        }
    );
}

#[tokio::test]
async fn undecodable_success_body_is_a_decode_error() {
    let (server, client) = client(ApiVersion::V1).await;
    Mock::given(method("GET"))
        .and(path(
            "/v1/projects/demo-project/zones/us-central1-a/operations/op-1",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client
        .get_zone_operation(PROJECT, ZONE, "op-1")
        .await
        .expect_err("html should not decode");

    assert!(
        matches!(err, ComputeError::Decode { ref resource, .. } if resource == "operation"),
        "unexpected error: {err}"
    );
}
