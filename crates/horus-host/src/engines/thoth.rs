//! Remote advisory resolution through a Thoth user API.
//!
//! The adviser is asynchronous on the service side: a request is submitted,
//! its status polled until it reaches a terminal state, then the report is
//! fetched. The whole exchange is bounded by the lock request's timeout.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use horus_lockfile::{Pipfile, PipfileLock};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::traits::{LockEngine, LockRequest, Resolution};
use super::ResolutionEngine;
use crate::artifacts::THOTH_CONFIG_FILE;
use crate::config::ThothClientConfig;
use crate::discover::gather_libraries;
use crate::error::{HorusError, HorusResult, LockError, io_error};
use crate::util::{read_to_string, write_atomic};

const ORIGIN: &str = "jupyterlab-requirements";
const SOURCE_TYPE: &str = "JUPYTER_NOTEBOOK";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    Latest,
    Stable,
    Performance,
    Security,
}

impl RecommendationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationType::Latest => "latest",
            RecommendationType::Stable => "stable",
            RecommendationType::Performance => "performance",
            RecommendationType::Security => "security",
        }
    }
}

impl fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendationType {
    type Err = HorusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(RecommendationType::Latest),
            "stable" => Ok(RecommendationType::Stable),
            "performance" => Ok(RecommendationType::Performance),
            "security" => Ok(RecommendationType::Security),
            other => Err(HorusError::Invalid(format!(
                "unknown recommendation type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperatingSystem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuntimeEnvironment {
    pub name: String,
    #[serde(default)]
    pub operating_system: OperatingSystem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_type: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Contents of `.thoth.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThothConfig {
    pub host: String,
    #[serde(default = "tls_verify_default")]
    pub tls_verify: bool,
    #[serde(default = "requirements_format_default")]
    pub requirements_format: String,
    #[serde(default)]
    pub runtime_environments: Vec<RuntimeEnvironment>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

fn tls_verify_default() -> bool {
    true
}

fn requirements_format_default() -> String {
    "pipenv".to_string()
}

/// Command-line adjustments applied to the first runtime environment.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub recommendation_type: Option<RecommendationType>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub python_version: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl ThothConfig {
    pub fn default_for(host: &str, kernel_name: &str, python_version: Option<&str>) -> Self {
        Self {
            host: host.to_string(),
            tls_verify: true,
            requirements_format: requirements_format_default(),
            runtime_environments: vec![RuntimeEnvironment {
                name: kernel_name.to_string(),
                operating_system: OperatingSystem::default(),
                python_version: python_version.map(str::to_string),
                recommendation_type: Some(RecommendationType::Latest.as_str().to_string()),
                other: BTreeMap::new(),
            }],
            labels: BTreeMap::new(),
            other: BTreeMap::new(),
        }
    }

    /// Read `<dir>/.thoth.yaml`, writing a default one first when absent.
    /// The flag is true when the file was created.
    pub fn load_or_create(
        dir: &Path,
        host: &str,
        kernel_name: &str,
        python_version: Option<&str>,
    ) -> HorusResult<(Self, bool)> {
        let path = dir.join(THOTH_CONFIG_FILE);
        if path.is_file() {
            return Ok((Self::from_yaml_str(&read_to_string(&path)?)?, false));
        }
        let config = Self::default_for(host, kernel_name, python_version);
        config.save(dir)?;
        tracing::info!(path = %path.display(), "created thoth configuration");
        Ok((config, true))
    }

    pub fn save(&self, dir: &Path) -> HorusResult<()> {
        std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        write_atomic(&dir.join(THOTH_CONFIG_FILE), self.to_yaml_string()?.as_bytes())
    }

    pub fn from_yaml_str(text: &str) -> HorusResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml_string(&self) -> HorusResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn runtime_environment(&self) -> Option<&RuntimeEnvironment> {
        self.runtime_environments.first()
    }

    fn runtime_environment_mut(&mut self) -> &mut RuntimeEnvironment {
        if self.runtime_environments.is_empty() {
            self.runtime_environments.push(RuntimeEnvironment::default());
        }
        &mut self.runtime_environments[0]
    }

    /// Insert or replace the runtime environment with the same name, moving it first.
    pub fn set_runtime_environment(&mut self, environment: RuntimeEnvironment) {
        self.runtime_environments
            .retain(|existing| existing.name != environment.name);
        self.runtime_environments.insert(0, environment);
    }

    pub fn apply(&mut self, overrides: &RuntimeOverrides) {
        let runtime = self.runtime_environment_mut();
        if let Some(kind) = overrides.recommendation_type {
            runtime.recommendation_type = Some(kind.as_str().to_string());
        }
        if let Some(name) = &overrides.os_name {
            runtime.operating_system.name = Some(name.clone());
        }
        if let Some(version) = &overrides.os_version {
            runtime.operating_system.version = Some(version.clone());
        }
        if let Some(version) = &overrides.python_version {
            runtime.python_version = Some(version.clone());
        }
        self.labels
            .extend(overrides.labels.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Minimal client for the adviser endpoints of the Thoth user API.
#[derive(Debug, Clone)]
pub struct ThothClient {
    http: reqwest::Client,
    base: String,
    poll_interval: Duration,
}

impl ThothClient {
    pub fn new(host: &str, tls_verify: bool, poll_interval: Duration) -> HorusResult<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!tls_verify)
            .build()
            .map_err(|e| HorusError::Thoth(format!("build http client: {e}")))?;
        Ok(Self {
            http,
            base: Self::api_base(host),
            poll_interval,
        })
    }

    /// `host` may be a bare host name or a full URL.
    pub fn api_base(host: &str) -> String {
        let host = host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}/api/v1")
        } else {
            format!("https://{host}/api/v1")
        }
    }

    pub async fn submit_advise(&self, body: &Value, force: bool) -> HorusResult<String> {
        let url = format!("{}/advise/python", self.base);
        let response = self
            .http
            .post(&url)
            .query(&[
                ("force", force.to_string()),
                ("origin", ORIGIN.to_string()),
                ("source_type", SOURCE_TYPE.to_string()),
            ])
            .json(body)
            .send()
            .await
            .map_err(request_error)?;
        let (status, document) = read_json(response).await?;
        if !status.is_success() {
            return Err(HorusError::Thoth(service_message(&document, status)));
        }
        document
            .get("analysis_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| HorusError::Thoth("advise response carries no analysis_id".into()))
    }

    pub async fn advise_state(&self, analysis_id: &str) -> HorusResult<String> {
        let url = format!("{}/advise/python/{analysis_id}/status", self.base);
        let response = self.http.get(&url).send().await.map_err(request_error)?;
        let (status, document) = read_json(response).await?;
        if !status.is_success() {
            return Err(HorusError::Thoth(service_message(&document, status)));
        }
        Ok(document
            .pointer("/status/state")
            .and_then(Value::as_str)
            .unwrap_or("pending")
            .to_string())
    }

    /// Poll until the analysis leaves the running states, then fetch its document.
    pub async fn wait_for_result(&self, analysis_id: &str) -> HorusResult<Value> {
        loop {
            let state = self.advise_state(analysis_id).await?;
            tracing::debug!(%analysis_id, %state, "advise status");
            if matches!(state.as_str(), "finished" | "succeeded" | "failed" | "error") {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        loop {
            let url = format!("{}/advise/python/{analysis_id}", self.base);
            let response = self.http.get(&url).send().await.map_err(request_error)?;
            let (status, document) = read_json(response).await?;
            if status == StatusCode::ACCEPTED {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }
            if !status.is_success() && document.get("result").is_none() {
                return Err(HorusError::Thoth(service_message(&document, status)));
            }
            return Ok(document);
        }
    }

    pub async fn advise_log(&self, analysis_id: &str) -> HorusResult<String> {
        let url = format!("{}/advise/python/{analysis_id}/log", self.base);
        let response = self.http.get(&url).send().await.map_err(request_error)?;
        let (status, document) = read_json(response).await?;
        if !status.is_success() {
            return Err(HorusError::Thoth(service_message(&document, status)));
        }
        Ok(document
            .get("log")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

fn request_error(err: reqwest::Error) -> HorusError {
    HorusError::Thoth(err.to_string())
}

async fn read_json(response: reqwest::Response) -> HorusResult<(StatusCode, Value)> {
    let status = response.status();
    let text = response.text().await.map_err(request_error)?;
    let document = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Ok((status, document))
}

fn service_message(document: &Value, status: StatusCode) -> String {
    document
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("thoth responded with {status}"))
}

pub struct ThothEngine {
    poll_interval: Duration,
}

impl ThothEngine {
    pub fn new(config: &ThothClientConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
        }
    }
}

#[async_trait]
impl LockEngine for ThothEngine {
    fn kind(&self) -> ResolutionEngine {
        ResolutionEngine::Thoth
    }

    async fn resolve(&self, request: &LockRequest) -> Result<Resolution, LockError> {
        let Some(config) = request.engine.thoth_config() else {
            return Err(LockError::new(
                LockError::UNAVAILABLE,
                "thoth resolution needs a thoth configuration",
            ));
        };
        let body = advise_request_body(request, config)?;
        let client = ThothClient::new(&config.host, config.tls_verify, self.poll_interval)
            .map_err(|e| LockError::engine_failure(e.to_string()))?;

        let exchange = async {
            let analysis_id = client.submit_advise(&body, request.force).await?;
            tracing::info!(%analysis_id, host = %config.host, "submitted advise request");
            let document = client.wait_for_result(&analysis_id).await?;
            Ok::<_, HorusError>((analysis_id, document))
        };
        let (analysis_id, document) = match tokio::time::timeout(request.timeout, exchange).await {
            Ok(Ok(done)) => done,
            Ok(Err(err)) => {
                return Err(LockError::engine_failure(format!(
                    "Error locking dependencies, check pod logs for more details about the error. {err}"
                )));
            }
            Err(_) => {
                return Err(LockError::timeout(format!(
                    "no recommendation within {}s",
                    request.timeout.as_secs()
                )));
            }
        };
        parse_advise_result(&document, analysis_id)
    }
}

fn advise_request_body(request: &LockRequest, config: &ThothConfig) -> Result<Value, LockError> {
    let requirements = request
        .pipfile
        .to_toml_string()
        .map_err(|e| LockError::engine_failure(e.to_string()))?;
    let runtime = config.runtime_environment().cloned().unwrap_or_default();
    let recommendation_type = runtime
        .recommendation_type
        .clone()
        .unwrap_or_else(|| RecommendationType::Latest.as_str().to_string());
    let library_usage = request.notebook_source.as_deref().map(|source| {
        let report: BTreeMap<String, Vec<&str>> = gather_libraries(source)
            .into_iter()
            .map(|library| (library, vec!["*"]))
            .collect();
        json!({ "report": report })
    });
    Ok(json!({
        "application_stack": {
            "requirements": requirements,
            "requirements_format": config.requirements_format,
        },
        "runtime_environment": runtime,
        "recommendation_type": recommendation_type,
        "labels": config.labels,
        "library_usage": library_usage,
    }))
}

/// Pick the best (first) product of an adviser report.
pub fn parse_advise_result(document: &Value, analysis_id: String) -> Result<Resolution, LockError> {
    let result = document.get("result").unwrap_or(document);
    if result.get("error").and_then(Value::as_bool).unwrap_or(false) {
        let message = result
            .get("error_msg")
            .and_then(Value::as_str)
            .unwrap_or("thoth reported an error without a message");
        return Err(LockError::service(message));
    }
    let report = result
        .get("report")
        .ok_or_else(|| LockError::service("adviser response carries no report"))?;
    let product = report
        .get("products")
        .and_then(Value::as_array)
        .and_then(|products| products.first())
        .ok_or_else(|| LockError::service("adviser found no software stack to recommend"))?;

    let requirements_lock = product
        .pointer("/project/requirements_locked")
        .cloned()
        .ok_or_else(|| LockError::service("recommended product has no locked requirements"))
        .and_then(|value| {
            PipfileLock::from_json_value(value)
                .map_err(|e| LockError::service(format!("malformed locked requirements: {e}")))
        })?;
    let requirements = match product.pointer("/project/requirements").cloned() {
        Some(value) => Some(
            Pipfile::from_json_value(value)
                .map_err(|e| LockError::service(format!("malformed requirements: {e}")))?,
        ),
        None => None,
    };

    Ok(Resolution {
        requirements_lock,
        requirements,
        justification: array_of(product.get("justification")),
        stack_info: array_of(report.get("stack_info")),
        analysis_id: Some(analysis_id),
    })
}

fn array_of(value: Option<&Value>) -> Vec<Value> {
    value
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_accepts_hosts_and_urls() {
        assert_eq!(
            ThothClient::api_base("khemet.thoth-station.ninja"),
            "https://khemet.thoth-station.ninja/api/v1"
        );
        assert_eq!(
            ThothClient::api_base("http://127.0.0.1:9000/"),
            "http://127.0.0.1:9000/api/v1"
        );
    }

    #[test]
    fn overrides_patch_first_runtime() {
        let mut config = ThothConfig::default_for("thoth.local", "demo", Some("3.8"));
        config.apply(&RuntimeOverrides {
            recommendation_type: Some(RecommendationType::Security),
            os_name: Some("rhel".into()),
            os_version: Some("8".into()),
            python_version: None,
            labels: BTreeMap::from([("team".to_string(), "ml".to_string())]),
        });
        let runtime = config.runtime_environment().unwrap();
        assert_eq!(runtime.name, "demo");
        assert_eq!(runtime.recommendation_type.as_deref(), Some("security"));
        assert_eq!(runtime.operating_system.name.as_deref(), Some("rhel"));
        assert_eq!(runtime.python_version.as_deref(), Some("3.8"));
        assert_eq!(config.labels["team"], "ml");
    }

    #[test]
    fn yaml_keeps_unknown_keys() {
        let text = "host: thoth.local\ntls_verify: false\nmanaged: true\nruntime_environments:\n  - name: demo\n    operating_system:\n      name: ubi\n      version: '8'\n    hardware:\n      cpu_family: 6\n";
        let config = ThothConfig::from_yaml_str(text).unwrap();
        assert!(!config.tls_verify);
        assert_eq!(config.requirements_format, "pipenv");
        assert_eq!(config.other["managed"], json!(true));
        assert!(config.runtime_environments[0].other.contains_key("hardware"));
        let again = ThothConfig::from_yaml_str(&config.to_yaml_string().unwrap()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn load_or_create_writes_default_once() {
        let dir = tempfile::tempdir().unwrap();
        let (config, created) =
            ThothConfig::load_or_create(dir.path(), "thoth.local", "demo", Some("3.9")).unwrap();
        assert!(created);
        assert!(dir.path().join(THOTH_CONFIG_FILE).is_file());
        let (again, created) =
            ThothConfig::load_or_create(dir.path(), "elsewhere", "demo", None).unwrap();
        assert!(!created);
        assert_eq!(again, config);
    }

    #[test]
    fn first_product_wins() {
        let document = json!({
            "result": {
                "error": false,
                "report": {
                    "products": [
                        {
                            "justification": [{"type": "INFO", "message": "best"}],
                            "project": {
                                "requirements": {"packages": {"flask": "*"}, "source": []},
                                "requirements_locked": {
                                    "_meta": {"hash": {"sha256": "abc"}},
                                    "default": {"flask": {"version": "==2.0.1"}}
                                }
                            }
                        },
                        {"project": {"requirements_locked": {"_meta": {}, "default": {"flask": {"version": "==1.0"}}}}}
                    ],
                    "stack_info": [{"type": "WARNING", "message": "note"}]
                }
            }
        });
        let resolution = parse_advise_result(&document, "adviser-1".into()).unwrap();
        assert_eq!(
            resolution.requirements_lock.default["flask"].exact_version(),
            Some("2.0.1")
        );
        assert_eq!(resolution.justification.len(), 1);
        assert_eq!(resolution.stack_info.len(), 1);
        assert!(resolution.requirements.is_some());
        assert_eq!(resolution.analysis_id.as_deref(), Some("adviser-1"));
    }

    #[test]
    fn service_error_carries_message() {
        let document = json!({"result": {"error": true, "error_msg": "No solver found"}});
        let err = parse_advise_result(&document, "adviser-2".into()).unwrap_err();
        assert_eq!(err, LockError::service("No solver found"));
    }
}
