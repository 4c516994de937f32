//! REST API behaviour, driven through `warp::test` with scripted tools.

use std::path::Path;
use std::sync::Arc;

use imount_core::commands::MountOptions;
use imount_core::journal::OperationLog;
use imount_core::server::routes;
use imount_core::service::{MountService, ServiceSettings};
use imount_core::testing::ScriptedExecutor;
use serde_json::Value;
use tempfile::TempDir;

struct Api {
    dir: TempDir,
    exec: Arc<ScriptedExecutor>,
    service: MountService,
}

fn api(script: impl FnOnce(&Path) -> ScriptedExecutor) -> Api {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let exec = Arc::new(script(root));
    let service = MountService::new(
        exec.clone(),
        OperationLog::in_dir(&root.join("settings"), 100),
        ServiceSettings {
            default_mount_point: root.join("iPhone"),
            apps_mount_root: root.join("iPhone_Apps"),
            mount_options: MountOptions::default(),
        },
    );
    Api { dir, exec, service }
}

async fn call(api: &Api, method: &str, path: &str, body: &str) -> (u16, Value) {
    let response = warp::test::request()
        .method(method)
        .path(path)
        .body(body.to_string())
        .reply(&routes(api.service.clone()))
        .await;
    let status = response.status().as_u16();
    let json = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health() {
    let api = api(|_| ScriptedExecutor::new());
    let (status, body) = call(&api, "GET", "/api/health", "").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert!(api.exec.calls().is_empty());
}

#[tokio::test]
async fn check_device_returns_command_result() {
    let api = api(|_| ScriptedExecutor::new().ok("idevicepair validate", "SUCCESS\n"));
    let (status, body) = call(&api, "POST", "/api/check-device", "").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["stdout"], "SUCCESS\n");
    assert_eq!(body["code"], 0);
}

#[tokio::test]
async fn mount_with_empty_body_uses_default_mount_point() {
    let api = api(|root| {
        ScriptedExecutor::new().ok(
            &format!("ifuse {} -o allow_other", root.join("iPhone").display()),
            "",
        )
    });
    let (status, body) = call(&api, "POST", "/api/mount", "").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert!(api.dir.path().join("iPhone").is_dir());
}

#[tokio::test]
async fn mount_read_only_from_body() {
    let api = api(|_| ScriptedExecutor::new());
    let target = api.dir.path().join("ro");
    let body = serde_json::json!({
        "mount_point": target.to_string_lossy(),
        "read_only": true,
    })
    .to_string();
    let (status, reply) = call(&api, "POST", "/api/mount", &body).await;
    assert_eq!(status, 200);
    // Unscripted, so the command "fails" with 127 but the argv is what counts.
    assert_eq!(reply["code"], 127);
    assert_eq!(
        api.exec.calls(),
        [format!("ifuse {} -o ro -o allow_other", target.display())]
    );
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let api = api(|_| ScriptedExecutor::new());
    let (status, body) = call(&api, "POST", "/api/mount", "{oops").await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("Invalid request body"));
    assert!(api.exec.calls().is_empty());
}

#[tokio::test]
async fn one_click_reports_steps() {
    let api = api(|root| {
        ScriptedExecutor::new()
            .fail("idevicepair validate", "not paired")
            .ok("idevicepair pair", "SUCCESS")
            .ok(
                &format!("ifuse {} -o allow_other", root.join("iPhone").display()),
                "",
            )
    });
    let (status, body) = call(&api, "POST", "/api/one-click-mount", "{}").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    let steps: Vec<&str> = body["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["step"].as_str().unwrap())
        .collect();
    assert_eq!(steps, ["validate", "pair", "mount"]);
}

#[tokio::test]
async fn device_info_without_device() {
    let api = api(|_| ScriptedExecutor::new().ok("idevice_id -l", ""));
    let (status, body) = call(&api, "GET", "/api/device-info", "").await;
    assert_eq!(status, 200);
    assert_eq!(body["error"], "No device found");
}

#[tokio::test]
async fn device_info_with_device() {
    let api = api(|_| {
        ScriptedExecutor::new()
            .ok("idevice_id -l", "abc123\n")
            .ok("ideviceinfo -u abc123 -k ProductVersion", "17.4\n")
    });
    let (status, body) = call(&api, "GET", "/api/device-info", "").await;
    assert_eq!(status, 200);
    assert_eq!(body["udid"], "abc123");
    assert_eq!(body["ios_version"], "17.4");
    assert!(body.get("name").is_none());
}

#[tokio::test]
async fn open_folder_when_not_mounted() {
    let api = api(|_| ScriptedExecutor::new());
    let (status, body) = call(&api, "POST", "/api/open-folder", "").await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Device not mounted");
    assert!(api.exec.calls().is_empty());
}

#[tokio::test]
async fn is_mounted_is_a_pure_query() {
    let api = api(|_| ScriptedExecutor::new());
    let (status, body) = call(&api, "POST", "/api/is-mounted", "").await;
    assert_eq!(status, 200);
    assert_eq!(body["mounted"], false);

    let (_, body) = call(&api, "POST", "/api/is-mounted", r#"{"mount_point": "/"}"#).await;
    assert_eq!(body["mounted"], true);

    let (_, logs) = call(&api, "GET", "/api/logs", "").await;
    assert_eq!(logs, Value::Array(vec![]));
}

#[tokio::test]
async fn logs_record_operations_and_clear() {
    let api = api(|_| ScriptedExecutor::new().fail("idevicepair pair", "denied"));
    call(&api, "POST", "/api/pair-device", "").await;

    let (status, logs) = call(&api, "GET", "/api/logs", "").await;
    assert_eq!(status, 200);
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["operation"], "Pair Device");
    assert_eq!(logs[0]["status"], "FAILED");
    assert_eq!(logs[0]["details"], "denied");

    let (status, body) = call(&api, "DELETE", "/api/logs", "").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    let (_, logs) = call(&api, "GET", "/api/logs", "").await;
    assert_eq!(logs, Value::Array(vec![]));
}

#[tokio::test]
async fn corrupt_log_is_a_bad_request() {
    let api = api(|_| ScriptedExecutor::new());
    let settings = api.dir.path().join("settings");
    std::fs::create_dir_all(&settings).unwrap();
    std::fs::write(settings.join("operation_log.json"), "not json").unwrap();

    let (status, body) = call(&api, "GET", "/api/logs", "").await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn list_apps_returns_raw_and_parsed() {
    let api = api(|_| {
        ScriptedExecutor::new().ok(
            "ifuse --list-apps",
            "\"CFBundleIdentifier\",\"CFBundleVersion\",\"CFBundleDisplayName\"\n\
             \"com.example.notes\",\"2.1\",\"Notes\"\n",
        )
    });
    let (status, body) = call(&api, "GET", "/api/list-apps", "").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["apps"].as_array().unwrap().len(), 2);
    assert_eq!(body["entries"][0]["bundle_id"], "com.example.notes");
    assert_eq!(body["entries"][0]["name"], "Notes (com.example.notes)");
}

#[tokio::test]
async fn list_apps_failure() {
    let api = api(|_| ScriptedExecutor::new().fail("ifuse --list-apps", "No device found"));
    let (status, body) = call(&api, "GET", "/api/list-apps", "").await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No device found");
}

#[tokio::test]
async fn mount_app_requires_bundle_id() {
    let api = api(|_| ScriptedExecutor::new());
    let (status, body) = call(&api, "POST", "/api/mount-app", r#"{"bundle_id": ""}"#).await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert!(api.exec.calls().is_empty());
}

#[tokio::test]
async fn mount_app_rejects_option_like_bundle_id() {
    let api = api(|_| ScriptedExecutor::new());
    let (status, body) = call(&api, "POST", "/api/mount-app", r#"{"bundle_id": "-o"}"#).await;
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Invalid bundle_id: -o");
    assert!(api.exec.calls().is_empty());
}

#[tokio::test]
async fn dash_mount_point_is_passed_as_a_path() {
    let api = api(|_| ScriptedExecutor::new());
    call(&api, "POST", "/api/unmount", r#"{"mount_point": "-z"}"#).await;
    assert_eq!(api.exec.calls(), ["fusermount -u ./-z"]);
}

#[tokio::test]
async fn mount_app_mounts_documents() {
    let api = api(|root| {
        ScriptedExecutor::new().ok(
            &format!(
                "ifuse --documents com.example.notes {}",
                root.join("iPhone_Apps").join("Notes").display()
            ),
            "",
        )
    });
    let body = r#"{"bundle_id": "com.example.notes", "name": "Notes (com.example.notes)"}"#;
    let (status, reply) = call(&api, "POST", "/api/mount-app", body).await;
    assert_eq!(status, 200);
    assert_eq!(reply["success"], true);
    assert!(api.dir.path().join("iPhone_Apps").join("Notes").is_dir());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let api = api(|_| ScriptedExecutor::new());
    let (status, _) = call(&api, "GET", "/api/nope", "").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let api = api(|_| ScriptedExecutor::new());
    let response = warp::test::request()
        .method("GET")
        .path("/api/health")
        .header("origin", "http://localhost:3000")
        .reply(&routes(api.service.clone()))
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );
}
