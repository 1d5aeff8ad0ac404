mod helpers;

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use horus_host::engines::ResolutionEngine;
use horus_host::http::{HttpState, NAMESPACE, app};
use horus_host::{DEFAULT_KERNEL_NAME, HorusHost, LockError};
use horus_lockfile::{Pipfile, Requirement};
use serde_json::{Value, json};
use tower::ServiceExt;

use helpers::{FakeEngine, host_with_engines, test_config};

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(format!("{NAMESPACE}{uri}"));
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&value).unwrap())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, value)
}

async fn wait_task(app: &Router, location: &str) -> (StatusCode, Value) {
    let uri = location.strip_prefix(NAMESPACE).unwrap();
    for _ in 0..400 {
        let (status, _, body) = send(app, Method::GET, uri, None).await;
        if status != StatusCode::ACCEPTED {
            return (status, body);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task at {location} never finished");
}

fn location(headers: &HeaderMap) -> String {
    headers[header::LOCATION].to_str().unwrap().to_string()
}

fn manifest_json() -> Value {
    let mut pipfile = Pipfile::new(Some("3.8"));
    pipfile
        .packages
        .insert("flask".into(), Requirement::Version("*".into()));
    pipfile.to_json_value().unwrap()
}

fn app_for(host: HorusHost) -> Router {
    app(HttpState::new(host))
}

#[tokio::test]
async fn pipenv_lock_runs_as_a_task() {
    let dir = tempfile::tempdir().unwrap();
    let host = host_with_engines(
        test_config(dir.path()),
        &[FakeEngine::pinning(ResolutionEngine::Pipenv, "2.0.1")],
    );
    let app = app_for(host);

    let (status, headers, body) = send(
        &app,
        Method::POST,
        "/pipenv",
        Some(json!({"kernel_name": "demo", "requirements": manifest_json().to_string()})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let location = location(&headers);
    assert_eq!(location, format!("{NAMESPACE}/tasks/{}", body["task_id"]));

    let (status, result) = wait_task(&app, &location).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["engine"], "pipenv");
    assert_eq!(result["persisted"], true);
    assert_eq!(result["requirements_lock"]["default"]["flask"]["version"], "==2.0.1");

    let (status, _, again) = send(&app, Method::GET, location.strip_prefix(NAMESPACE).unwrap(), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(again["code"], "unknown_task");
}

#[tokio::test]
async fn failed_resolution_polls_as_500() {
    let dir = tempfile::tempdir().unwrap();
    let host = host_with_engines(
        test_config(dir.path()),
        &[FakeEngine::failing(
            ResolutionEngine::Thoth,
            LockError::service("No solver found"),
        )],
    );
    let app = app_for(host);

    let (status, headers, _) = send(
        &app,
        Method::POST,
        "/thoth/resolution",
        Some(json!({"kernel_name": "demo", "requirements": manifest_json()})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = wait_task(&app, &location(&headers)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], true);
    assert_eq!(body["type"], "lock_error");
    assert_eq!(body["error_msg"], "service error: No solver found");
}

#[tokio::test]
async fn install_failure_is_reported_by_the_poll() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_for(HorusHost::new(test_config(dir.path())));

    let (status, headers, _) = send(
        &app,
        Method::POST,
        "/kernel/install",
        Some(json!({"kernel_name": "demo", "resolution_engine": "thoth"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = wait_task(&app, &location(&headers)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], true);
    assert_eq!(body["kernel_name"], "demo");
    assert_eq!(body["steps"][0]["ok"], false);
}

#[tokio::test]
async fn dependency_files_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_for(HorusHost::new(test_config(dir.path())));

    let (status, _, stored) = send(
        &app,
        Method::POST,
        "/file/stored",
        Some(json!({"kernel_name": "demo"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(stored["requirements"].is_null());

    let (status, _, written) = send(
        &app,
        Method::POST,
        "/file/dependencies",
        Some(json!({"kernel_name": "demo", "requirements": manifest_json()})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(written["written"].as_array().unwrap().len(), 1);

    let (_, _, stored) = send(
        &app,
        Method::POST,
        "/file/stored",
        Some(json!({"kernel_name": "demo"})),
    )
    .await;
    assert_eq!(stored["requirements"]["packages"], json!({"flask": "*"}));
    assert!(stored["requirements_lock"].is_null());
}

#[tokio::test]
async fn thoth_config_is_created_then_updated() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_for(HorusHost::new(test_config(dir.path())));

    let (status, _, config) = send(&app, Method::GET, "/thoth/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["runtime_environments"][0]["name"], DEFAULT_KERNEL_NAME);

    let (status, _, config) = send(
        &app,
        Method::PUT,
        "/thoth/config",
        Some(json!({
            "runtime_environment": {
                "name": "gpu",
                "operating_system": {"name": "ubi", "version": "8"},
                "python_version": "3.8",
                "recommendation_type": "performance"
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["runtime_environments"][0]["name"], "gpu");
    assert_eq!(config["runtime_environments"][1]["name"], DEFAULT_KERNEL_NAME);

    let (_, _, again) = send(
        &app,
        Method::GET,
        &format!("/thoth/config?kernel_name={DEFAULT_KERNEL_NAME}"),
        None,
    )
    .await;
    assert_eq!(again, config);
}

#[tokio::test]
async fn invectio_gathers_imports() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_for(HorusHost::new(test_config(dir.path())));
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/invectio",
        Some(json!({"notebook_content": "import pandas as pd\nfrom sklearn import svm\nimport json\n"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["libraries"], json!(["pandas", "scikit-learn"]));
}

#[tokio::test]
async fn bad_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_for(HorusHost::new(test_config(dir.path())));

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/kernel/packages",
        Some(json!({"kernel_name": "../escape"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/pipenv",
        Some(json!({"requirements": "not json"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");

    let (status, _, _) = send(&app, Method::DELETE, "/tasks/77", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_environment_lists_no_packages() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_for(HorusHost::new(test_config(dir.path())));
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/kernel/packages",
        Some(json!({"kernel_name": "demo"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}
