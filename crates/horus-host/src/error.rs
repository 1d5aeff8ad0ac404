use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::check::CheckItem;

#[derive(Debug, Error)]
pub enum HorusError {
    #[error("not a notebook: {0}")]
    NotANotebook(String),
    #[error("notebook metadata has no '{0}' entry")]
    MissingMetadata(String),
    #[error("requirement '{name}' is already declared in {group} packages")]
    DuplicateRequirement { name: String, group: &'static str },
    #[error("requirement '{0}' is not declared in packages or dev-packages")]
    RequirementNotFound(String),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("task {0} does not exist or was already consumed")]
    UnknownTask(u64),
    #[error("kernel error: {0}")]
    Kernel(String),
    #[error("consistency check reported errors:{}", error_lines(.0))]
    CheckFailed(Vec<CheckItem>),
    #[error("{0} already exists, use force to overwrite it")]
    AlreadyExists(PathBuf),
    #[error("notebook metadata already has '{0}', use force to overwrite it")]
    MetadataExists(String),
    #[error("thoth error: {0}")]
    Thoth(String),
    #[error("process error: {0}")]
    Process(String),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("dependency file error: {0}")]
    Lockfile(#[from] horus_lockfile::LockfileError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn error_lines(items: &[CheckItem]) -> String {
    items
        .iter()
        .filter(|item| item.is_error())
        .map(|item| format!("\n  - {}", item.message))
        .collect()
}

impl HorusError {
    /// Stable identifier used in task error records and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            HorusError::NotANotebook(_) => "not_a_notebook",
            HorusError::MissingMetadata(_) => "missing_metadata",
            HorusError::DuplicateRequirement { .. } => "duplicate_requirement",
            HorusError::RequirementNotFound(_) => "requirement_not_found",
            HorusError::Lock(_) => "lock_error",
            HorusError::UnknownTask(_) => "unknown_task",
            HorusError::Kernel(_) => "kernel_error",
            HorusError::CheckFailed(_) => "check_failed",
            HorusError::AlreadyExists(_) | HorusError::MetadataExists(_) => "already_exists",
            HorusError::Thoth(_) => "thoth_error",
            HorusError::Process(_) => "process_error",
            HorusError::Invalid(_) => "invalid_input",
            HorusError::Io { .. } => "io_error",
            HorusError::Lockfile(_) | HorusError::Json(_) | HorusError::Yaml(_) => "decode_error",
        }
    }
}

pub(crate) fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> HorusError {
    HorusError::Io {
        path: path.into(),
        source,
    }
}

pub type HorusResult<T> = Result<T, HorusError>;

/// Resolution failure reported by a lock engine.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{reason}: {detail}")]
pub struct LockError {
    pub reason: String,
    pub detail: String,
}

impl LockError {
    pub const ENGINE_FAILURE: &'static str = "engine failure";
    pub const SERVICE_ERROR: &'static str = "service error";
    pub const TIMEOUT: &'static str = "timeout";
    pub const UNAVAILABLE: &'static str = "engine unavailable";

    pub fn new(reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            detail: detail.into(),
        }
    }

    pub fn engine_failure(detail: impl Into<String>) -> Self {
        Self::new(Self::ENGINE_FAILURE, detail)
    }

    pub fn service(detail: impl Into<String>) -> Self {
        Self::new(Self::SERVICE_ERROR, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(Self::TIMEOUT, detail)
    }
}
