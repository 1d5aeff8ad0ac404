use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use horus_lockfile::{Pipfile, PipfileLock};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::artifacts::{ArtifactSelection, Artifacts};
use crate::config::DEFAULT_KERNEL_NAME;
use crate::discover::{discover_python_version, gather_libraries};
use crate::engines::thoth::RuntimeEnvironment;
use crate::engines::{EngineSpec, LockRequest, ResolutionEngine, ThothConfig};
use crate::error::HorusError;
use crate::http::{HttpState, NAMESPACE};
use crate::tasks::{TaskId, TaskPoll};

pub fn router() -> Router<HttpState> {
    Router::new()
        .route(
            "/thoth/config",
            get(thoth_config_get).post(thoth_config_create).put(thoth_config_update),
        )
        .route("/thoth/resolution", post(thoth_resolution))
        .route("/pipenv", post(pipenv_resolution))
        .route("/kernel/install", post(kernel_install))
        .route(
            "/kernel/create",
            post(kernel_create).get(kernel_list).delete(kernel_delete),
        )
        .route("/kernel/packages", post(kernel_packages))
        .route("/file/dependencies", post(file_dependencies))
        .route("/file/stored", post(file_stored))
        .route("/python", get(python_version))
        .route("/invectio", post(invectio))
        .route("/tasks/{id}", get(task_poll).delete(task_cancel))
}

#[derive(Debug)]
enum ApiError {
    Horus(HorusError),
    Invalid(String),
}

impl ApiError {
    fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::Invalid(msg.into())
    }
}

impl From<HorusError> for ApiError {
    fn from(err: HorusError) -> Self {
        ApiError::Horus(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Horus(err) => {
                let status = match &err {
                    HorusError::UnknownTask(_) | HorusError::RequirementNotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    HorusError::Invalid(_)
                    | HorusError::NotANotebook(_)
                    | HorusError::MissingMetadata(_)
                    | HorusError::Lockfile(_)
                    | HorusError::Json(_)
                    | HorusError::Yaml(_) => StatusCode::BAD_REQUEST,
                    HorusError::DuplicateRequirement { .. }
                    | HorusError::AlreadyExists(_)
                    | HorusError::MetadataExists(_)
                    | HorusError::CheckFailed(_) => StatusCode::CONFLICT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.kind().to_string(), err.to_string())
            }
            ApiError::Invalid(msg) => (StatusCode::BAD_REQUEST, "invalid_request".into(), msg),
        };
        let body = json!({ "code": code, "message": message });
        (status, Json(body)).into_response()
    }
}

fn accepted(id: TaskId) -> Response {
    let location = format!("{NAMESPACE}/tasks/{id}");
    (
        StatusCode::ACCEPTED,
        [(header::LOCATION, location.clone())],
        Json(json!({ "task_id": id, "location": location })),
    )
        .into_response()
}

/// Manifests arrive either as JSON objects or as JSON-encoded strings.
fn pipfile_from(value: Value) -> Result<Pipfile, ApiError> {
    let parsed = match value {
        Value::String(text) => Pipfile::from_json_str(&text),
        other => Pipfile::from_json_value(other),
    };
    parsed.map_err(|e| ApiError::bad_request(format!("invalid requirements: {e}")))
}

fn pipfile_lock_from(value: Value) -> Result<PipfileLock, ApiError> {
    let parsed = match value {
        Value::String(text) => PipfileLock::from_json_str(&text),
        other => PipfileLock::from_json_value(other),
    };
    parsed.map_err(|e| ApiError::bad_request(format!("invalid requirements lock: {e}")))
}

fn thoth_config_from(value: Value) -> Result<ThothConfig, ApiError> {
    let parsed = match value {
        Value::String(text) => serde_json::from_str(&text),
        other => serde_json::from_value(other),
    };
    parsed.map_err(|e| ApiError::bad_request(format!("invalid thoth config: {e}")))
}

fn kernel_or_default(kernel_name: Option<String>) -> String {
    kernel_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_KERNEL_NAME.to_string())
}

#[derive(Debug, Deserialize)]
struct KernelQuery {
    kernel_name: Option<String>,
}

async fn thoth_config_get(
    State(state): State<HttpState>,
    Query(query): Query<KernelQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let kernel_name = kernel_or_default(query.kernel_name);
    let config = state.host.thoth_config(&kernel_name, None)?;
    Ok(Json(config))
}

#[derive(Debug, Deserialize)]
struct ThothConfigCreate {
    kernel_name: Option<String>,
    python_version: Option<String>,
}

async fn thoth_config_create(
    State(state): State<HttpState>,
    Json(req): Json<ThothConfigCreate>,
) -> Result<impl IntoResponse, ApiError> {
    let kernel_name = kernel_or_default(req.kernel_name);
    let config = state
        .host
        .thoth_config(&kernel_name, req.python_version.as_deref())?;
    Ok(Json(config))
}

#[derive(Debug, Deserialize)]
struct ThothConfigUpdate {
    kernel_name: Option<String>,
    runtime_environment: RuntimeEnvironment,
}

async fn thoth_config_update(
    State(state): State<HttpState>,
    Json(req): Json<ThothConfigUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let kernel_name = kernel_or_default(req.kernel_name);
    let mut config = state.host.thoth_config(&kernel_name, None)?;
    config.set_runtime_environment(req.runtime_environment);
    let dir = state.host.environments().path(&kernel_name)?;
    config.save(&dir)?;
    tracing::info!(kernel = %kernel_name, "thoth configuration updated");
    Ok(Json(config))
}

#[derive(Debug, Deserialize)]
struct ThothResolutionRequest {
    kernel_name: Option<String>,
    requirements: Value,
    thoth_config: Option<Value>,
    timeout: Option<u64>,
    #[serde(default)]
    force: bool,
    notebook_content: Option<String>,
}

async fn thoth_resolution(
    State(state): State<HttpState>,
    Json(req): Json<ThothResolutionRequest>,
) -> Result<Response, ApiError> {
    let kernel_name = kernel_or_default(req.kernel_name);
    let pipfile = pipfile_from(req.requirements)?;
    let config = match req.thoth_config {
        Some(value) => thoth_config_from(value)?,
        None => state
            .host
            .thoth_config(&kernel_name, pipfile.python_version())?,
    };
    let request = LockRequest {
        pipfile,
        engine: EngineSpec::Thoth(config),
        environment: kernel_name,
        timeout: req
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(state.host.config().lock_timeout),
        force: req.force,
        notebook_source: req.notebook_content,
    };
    let host = state.host.clone();
    let id = state.tasks.submit("thoth-resolution", async move {
        host.lock_environment(request).await.map_err(HorusError::from)
    });
    Ok(accepted(id))
}

#[derive(Debug, Deserialize)]
struct PipenvRequest {
    kernel_name: Option<String>,
    requirements: Value,
}

async fn pipenv_resolution(
    State(state): State<HttpState>,
    Json(req): Json<PipenvRequest>,
) -> Result<Response, ApiError> {
    let request = LockRequest {
        pipfile: pipfile_from(req.requirements)?,
        engine: EngineSpec::Pipenv,
        environment: kernel_or_default(req.kernel_name),
        timeout: state.host.config().process_timeout,
        force: false,
        notebook_source: None,
    };
    let host = state.host.clone();
    let id = state.tasks.submit("pipenv-resolution", async move {
        host.lock_environment(request).await.map_err(HorusError::from)
    });
    Ok(accepted(id))
}

#[derive(Debug, Deserialize)]
struct InstallRequest {
    kernel_name: Option<String>,
    resolution_engine: Option<ResolutionEngine>,
}

async fn kernel_install(
    State(state): State<HttpState>,
    Json(req): Json<InstallRequest>,
) -> Result<Response, ApiError> {
    let kernel_name = kernel_or_default(req.kernel_name);
    state.host.environments().path(&kernel_name)?;
    let engine = req.resolution_engine.unwrap_or(ResolutionEngine::Thoth);
    let host = state.host.clone();
    let id = state.tasks.submit("kernel-install", async move {
        Ok::<_, HorusError>(host.install_environment(&kernel_name, engine).await)
    });
    Ok(accepted(id))
}

#[derive(Debug, Deserialize)]
struct KernelRequest {
    kernel_name: Option<String>,
}

async fn kernel_create(
    State(state): State<HttpState>,
    Json(req): Json<KernelRequest>,
) -> Result<Response, ApiError> {
    let kernel_name = kernel_or_default(req.kernel_name);
    state.host.environments().path(&kernel_name)?;
    let host = state.host.clone();
    let id = state.tasks.submit("kernel-create", async move {
        let message = host.create_kernel(&kernel_name).await?;
        Ok::<_, HorusError>(json!({ "kernel_name": kernel_name, "message": message }))
    });
    Ok(accepted(id))
}

async fn kernel_list(State(state): State<HttpState>) -> Result<impl IntoResponse, ApiError> {
    let kernels = state.host.list_kernels().await?;
    Ok(Json(kernels))
}

async fn kernel_delete(
    State(state): State<HttpState>,
    Json(req): Json<KernelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req
        .kernel_name
        .ok_or_else(|| ApiError::bad_request("kernel_name is required"))?;
    let outcome = state.host.delete_kernel(&name).await?;
    Ok(Json(outcome))
}

async fn kernel_packages(
    State(state): State<HttpState>,
    Json(req): Json<KernelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kernel_name = kernel_or_default(req.kernel_name);
    state.host.environments().path(&kernel_name)?;
    let packages = state.host.environments().list_packages(&kernel_name).await?;
    Ok(Json(packages))
}

#[derive(Debug, Deserialize)]
struct StoreDependencies {
    kernel_name: Option<String>,
    requirements: Value,
    requirements_lock: Option<Value>,
}

async fn file_dependencies(
    State(state): State<HttpState>,
    Json(req): Json<StoreDependencies>,
) -> Result<impl IntoResponse, ApiError> {
    let kernel_name = kernel_or_default(req.kernel_name);
    let artifacts = Artifacts {
        pipfile: Some(pipfile_from(req.requirements)?),
        pipfile_lock: req.requirements_lock.map(pipfile_lock_from).transpose()?,
        thoth_config: None,
    };
    let dir = state.host.environments().ensure_dir(&kernel_name)?;
    let written = artifacts.write_dir(&dir, true)?;
    tracing::debug!(kernel = %kernel_name, files = written.len(), "dependencies stored");
    Ok(Json(json!({ "kernel_name": kernel_name, "written": written })))
}

async fn file_stored(
    State(state): State<HttpState>,
    Json(req): Json<KernelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kernel_name = kernel_or_default(req.kernel_name);
    let dir = state.host.environments().path(&kernel_name)?;
    let selection = ArtifactSelection {
        pipfile: true,
        pipfile_lock: true,
        thoth_config: false,
    };
    let artifacts = Artifacts::read_dir(&dir, selection)?;
    Ok(Json(json!({
        "kernel_name": kernel_name,
        "requirements": artifacts.pipfile,
        "requirements_lock": artifacts.pipfile_lock,
    })))
}

async fn python_version(State(state): State<HttpState>) -> Result<impl IntoResponse, ApiError> {
    let config = state.host.config();
    let version = discover_python_version(&config.tools.python, config.process_timeout).await?;
    Ok(Json(json!({ "python_version": version })))
}

#[derive(Debug, Deserialize)]
struct InvectioRequest {
    notebook_content: String,
}

async fn invectio(Json(req): Json<InvectioRequest>) -> impl IntoResponse {
    Json(json!({ "libraries": gather_libraries(&req.notebook_content) }))
}

async fn task_poll(
    State(state): State<HttpState>,
    Path(id): Path<TaskId>,
) -> Result<Response, ApiError> {
    match state.tasks.poll(id).await? {
        TaskPoll::Pending => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "task_id": id, "status": "pending" })),
        )
            .into_response()),
        TaskPoll::Done(outcome) => {
            let status = if outcome.is_error() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            Ok((status, Json(outcome.body())).into_response())
        }
    }
}

async fn task_cancel(
    State(state): State<HttpState>,
    Path(id): Path<TaskId>,
) -> Result<impl IntoResponse, ApiError> {
    state.tasks.cancel(id)?;
    Ok(Json(json!({ "task_id": id, "cancelled": true })))
}
