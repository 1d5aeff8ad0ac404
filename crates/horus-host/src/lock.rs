//! Lock orchestrator: dispatches a manifest to an engine and normalizes the result.

use std::collections::HashMap;
use std::sync::Arc;

use horus_lockfile::{Pipfile, PipfileLock};
use serde::Serialize;
use serde_json::Value;

use crate::artifacts::Artifacts;
use crate::config::HorusConfig;
use crate::engines::{LockEngine, LockRequest, PipenvEngine, ResolutionEngine, ThothEngine};
use crate::environment::EnvironmentManager;
use crate::error::{HorusResult, LockError};

/// Normalized lock result, identical in shape for both engines.
#[derive(Debug, Clone, Serialize)]
pub struct LockOutcome {
    pub engine: ResolutionEngine,
    pub requirements: Pipfile,
    pub requirements_lock: PipfileLock,
    pub justification: Vec<Value>,
    pub stack_info: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
    /// Whether the lock artifacts reached the environment directory.
    pub persisted: bool,
}

pub struct LockOrchestrator {
    engines: HashMap<ResolutionEngine, Arc<dyn LockEngine>>,
    envs: EnvironmentManager,
}

impl LockOrchestrator {
    pub fn new(envs: EnvironmentManager) -> Self {
        Self {
            engines: HashMap::new(),
            envs,
        }
    }

    /// Orchestrator with the pipenv and thoth engines registered.
    pub fn with_default_engines(config: &HorusConfig, envs: EnvironmentManager) -> Self {
        let mut orchestrator = Self::new(envs.clone());
        orchestrator.register(Arc::new(PipenvEngine::new(config, envs)));
        orchestrator.register(Arc::new(ThothEngine::new(&config.thoth)));
        orchestrator
    }

    pub fn register(&mut self, engine: Arc<dyn LockEngine>) {
        self.engines.insert(engine.kind(), engine);
    }

    pub fn get(&self, kind: ResolutionEngine) -> Option<&dyn LockEngine> {
        self.engines.get(&kind).map(|engine| engine.as_ref())
    }

    /// Lock `request.pipfile`. On success the returned lock records
    /// `hash(request.pipfile)`, and the artifacts were written to the
    /// environment directory unless `persisted` is false.
    pub async fn lock(&self, request: LockRequest) -> Result<LockOutcome, LockError> {
        let kind = request.engine.kind();
        let engine = self.get(kind).ok_or_else(|| {
            LockError::new(LockError::UNAVAILABLE, format!("no {kind} engine is registered"))
        })?;
        let expected = request.pipfile.hash();
        tracing::info!(engine = %kind, environment = %request.environment, "locking dependencies");

        let resolution = engine.resolve(&request).await.inspect_err(|err| {
            tracing::warn!(engine = %kind, environment = %request.environment, %err, "lock failed");
        })?;

        if let Some(returned) = &resolution.requirements {
            if returned.hash() != expected {
                tracing::debug!(engine = %kind, "engine echoed a different manifest; keeping the submitted one");
            }
        }
        let mut requirements_lock = resolution.requirements_lock;
        if requirements_lock.source_hash() != Some(expected.as_str()) {
            tracing::debug!(
                engine = %kind,
                recorded = ?requirements_lock.source_hash(),
                %expected,
                "restamping lock with the submitted manifest hash"
            );
            requirements_lock.set_source_hash(expected);
        }

        let artifacts = Artifacts {
            pipfile: Some(request.pipfile.clone()),
            pipfile_lock: Some(requirements_lock.clone()),
            thoth_config: request.engine.thoth_config().cloned(),
        };
        let persisted = match self.persist(&request.environment, &artifacts) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(environment = %request.environment, %err, "lock artifacts were not persisted");
                false
            }
        };

        Ok(LockOutcome {
            engine: kind,
            requirements: request.pipfile,
            requirements_lock,
            justification: resolution.justification,
            stack_info: resolution.stack_info,
            analysis_id: resolution.analysis_id,
            persisted,
        })
    }

    fn persist(&self, environment: &str, artifacts: &Artifacts) -> HorusResult<()> {
        let dir = self.envs.ensure_dir(environment)?;
        artifacts.write_dir(&dir, true)?;
        Ok(())
    }
}
