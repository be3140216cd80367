#[path = "../src/api_client.rs"]
#[allow(dead_code)] // Some methods are used by the binary but not by tests
mod api_client;

use airlift_core::{AppId, RolloutState, VersionId};
use api_client::{ApiClient, CreateAppRequest, CreateUploadRequest, RegisterVersionRequest};
use httpmock::Method::{DELETE, GET, POST, PUT};
use httpmock::MockServer;
use serde_json::json;
use std::net::TcpListener;

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn touch_me(me: &api_client::MeResponse) {
    let _ = (&me.user_id, &me.email);
}

fn touch_app(app: &api_client::AppResponse) {
    let _ = (&app.app_id, &app.name, &app.created_at);
}

fn touch_version(version: &airlift_core::BundleVersion) {
    let _ = (
        &version.id,
        &version.app_id,
        &version.name,
        &version.created_at,
        version.deleted,
        &version.checksum,
        &version.external_url,
    );
}

#[tokio::test]
async fn api_client_success_paths() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let apikey = "apk_secret";
    let app_id = "com.example.app";

    let version_response = json!({
        "id": 7,
        "app_id": app_id,
        "name": "1.2.3",
        "created_at": "2026-02-01T08:00:00Z",
        "checksum": "ab".repeat(32)
    });
    let channel_response = json!({
        "app_id": app_id,
        "name": "production",
        "created_by": "usr_1",
        "version": 7,
        "second_version": 9,
        "secondary_percentage": 0.1,
        "created_at": "2026-02-01T08:00:00Z",
        "updated_at": "2026-02-01T08:00:00Z"
    });

    let me_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/auth/me")
            .header("authorization", format!("Bearer {apikey}"));
        then.status(200).json_body(json!({
            "user_id": "usr_1",
            "email": "dev@example.com"
        }));
    });
    let create_app_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/apps")
            .json_body(json!({ "app_id": app_id, "name": "Example" }));
        then.status(201).json_body(json!({
            "app_id": app_id,
            "name": "Example",
            "created_at": "2026-02-01T08:00:00Z"
        }));
    });
    let list_apps_mock = server.mock(|when, then| {
        when.method(GET).path("/v1/apps");
        then.status(200).json_body(json!({
            "apps": [{ "app_id": app_id, "created_at": "2026-02-01T08:00:00Z" }]
        }));
    });
    let list_versions_mock = server.mock(|when, then| {
        when.method(GET)
            .path(format!("/v1/apps/{app_id}/versions"))
            .query_param("include_deleted", "true");
        then.status(200)
            .json_body(json!({ "versions": [version_response] }));
    });
    let get_version_mock = server.mock(|when, then| {
        when.method(GET)
            .path(format!("/v1/apps/{app_id}/versions/1.2.3"));
        then.status(200).json_body(version_response.clone());
    });
    let in_use_mock = server.mock(|when, then| {
        when.method(GET)
            .path(format!("/v1/apps/{app_id}/versions/in-use"));
        then.status(200).json_body(json!({ "version_ids": [7, 9] }));
    });
    let register_mock = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/v1/apps/{app_id}/versions"))
            .json_body(json!({ "name": "1.2.3", "checksum": "ab".repeat(32) }));
        then.status(201).json_body(version_response.clone());
    });
    let create_upload_mock = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/v1/apps/{app_id}/versions/1.2.3/upload"))
            .json_body(json!({ "content_length": 4 }));
        then.status(200).json_body(json!({
            "upload_url": server.url("/blob/1.2.3")
        }));
    });
    let put_payload_mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/blob/1.2.3")
            .header("content-type", "application/octet-stream")
            .body("data");
        then.status(200);
    });
    let delete_version_mock = server.mock(|when, then| {
        when.method(DELETE)
            .path(format!("/v1/apps/{app_id}/versions/0.9.0"));
        then.status(204);
    });
    let list_channels_mock = server.mock(|when, then| {
        when.method(GET).path(format!("/v1/apps/{app_id}/channels"));
        then.status(200)
            .json_body(json!({ "channels": [channel_response] }));
    });
    let get_channel_mock = server.mock(|when, then| {
        when.method(GET)
            .path(format!("/v1/apps/{app_id}/channels/production"));
        then.status(200).json_body(channel_response.clone());
    });
    let upsert_channel_mock = server.mock(|when, then| {
        when.method(PUT)
            .path(format!("/v1/apps/{app_id}/channels/production"));
        then.status(200).json_body(channel_response.clone());
    });
    let delete_channel_mock = server.mock(|when, then| {
        when.method(DELETE)
            .path(format!("/v1/apps/{app_id}/channels/beta"));
        then.status(204);
    });
    let delete_app_mock = server.mock(|when, then| {
        when.method(DELETE).path(format!("/v1/apps/{app_id}"));
        then.status(204);
    });

    let client = ApiClient::new(&server.base_url(), apikey).unwrap();
    let app = AppId::parse(app_id).unwrap();

    let me = client.me().await.unwrap();
    assert_eq!(me.user_id, "usr_1");
    touch_me(&me);

    let created = client
        .create_app(CreateAppRequest {
            app_id: app.clone(),
            name: Some("Example".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(created.app_id, app);
    touch_app(&created);

    let apps = client.list_apps().await.unwrap();
    assert_eq!(apps.len(), 1);
    assert!(apps[0].name.is_none());

    let versions = client.list_versions(&app, true).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].name, "1.2.3");
    touch_version(&versions[0]);

    let version = client
        .get_version_by_name(&app, "1.2.3")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(version.id, VersionId::new(7));

    let in_use = client.in_use_version_ids(&app).await.unwrap();
    assert_eq!(in_use, vec![VersionId::new(7), VersionId::new(9)]);

    let registered = client
        .register_version(
            &app,
            RegisterVersionRequest {
                name: "1.2.3".to_string(),
                checksum: Some("ab".repeat(32)),
                external_url: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(registered.id, VersionId::new(7));

    let upload = client
        .create_upload(&app, "1.2.3", CreateUploadRequest { content_length: 4 })
        .await
        .unwrap();
    client
        .put_payload(&upload.upload_url, b"data".to_vec())
        .await
        .unwrap();

    client.delete_version(&app, "0.9.0").await.unwrap();

    let channels = client.list_channels(&app).await.unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].state(), RolloutState::Splitting);

    let channel = client.get_channel(&app, "production").await.unwrap().unwrap();
    assert_eq!(channel.version, VersionId::new(7));
    assert_eq!(channel.second_version, Some(VersionId::new(9)));

    client.upsert_channel(&channel).await.unwrap();
    client.delete_channel(&app, "beta").await.unwrap();
    client.delete_app(&app).await.unwrap();

    me_mock.assert();
    create_app_mock.assert();
    list_apps_mock.assert();
    list_versions_mock.assert();
    get_version_mock.assert();
    in_use_mock.assert();
    register_mock.assert();
    create_upload_mock.assert();
    put_payload_mock.assert();
    delete_version_mock.assert();
    list_channels_mock.assert();
    get_channel_mock.assert();
    upsert_channel_mock.assert();
    delete_channel_mock.assert();
    delete_app_mock.assert();
}

#[tokio::test]
async fn missing_resources_come_back_as_none() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path_contains("/versions/");
        then.status(404).body("not found");
    });
    server.mock(|when, then| {
        when.method(GET).path_contains("/channels/");
        then.status(404).body("not found");
    });

    let client = ApiClient::new(&server.base_url(), "apk_secret").unwrap();
    let app = AppId::parse("com.example.app").unwrap();

    assert!(client
        .get_version_by_name(&app, "9.9.9")
        .await
        .unwrap()
        .is_none());
    assert!(client.get_channel(&app, "nope").await.unwrap().is_none());
}

#[tokio::test]
async fn errors_carry_status_and_body() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/apps");
        then.status(403).body("apikey lacks app:read");
    });

    let client = ApiClient::new(&server.base_url(), "apk_secret").unwrap();
    let err = client.list_apps().await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("403"), "got: {message}");
    assert!(message.contains("apikey lacks app:read"), "got: {message}");
}

#[test]
fn rejects_invalid_base_url() {
    assert!(ApiClient::new("not a url", "apk_secret").is_err());
}
