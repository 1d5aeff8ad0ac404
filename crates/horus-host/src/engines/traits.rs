use std::time::Duration;

use async_trait::async_trait;
use horus_lockfile::{Pipfile, PipfileLock};
use serde_json::Value;

use super::{EngineSpec, ResolutionEngine};
use crate::error::LockError;

/// Everything an engine needs to turn a manifest into a lock.
#[derive(Debug, Clone)]
pub struct LockRequest {
    pub pipfile: Pipfile,
    pub engine: EngineSpec,
    /// Named environment whose directory receives the lock artifacts.
    pub environment: String,
    pub timeout: Duration,
    /// Cache-bypass hint for the remote service.
    pub force: bool,
    /// Notebook code cells, used for static analysis by the remote service.
    pub notebook_source: Option<String>,
}

/// Raw engine output before the orchestrator normalizes it.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub requirements_lock: PipfileLock,
    /// Manifest echoed back by the engine, when it returns one.
    pub requirements: Option<Pipfile>,
    pub justification: Vec<Value>,
    pub stack_info: Vec<Value>,
    pub analysis_id: Option<String>,
}

impl Resolution {
    pub fn from_lock(requirements_lock: PipfileLock) -> Self {
        Self {
            requirements_lock,
            requirements: None,
            justification: Vec::new(),
            stack_info: Vec::new(),
            analysis_id: None,
        }
    }
}

#[async_trait]
pub trait LockEngine: Send + Sync {
    fn kind(&self) -> ResolutionEngine;
    async fn resolve(&self, request: &LockRequest) -> Result<Resolution, LockError>;
}
