use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use super::HorusHost;
use crate::engines::{EngineSpec, LockRequest, ResolutionEngine, RuntimeOverrides, ThothConfig};
use crate::error::HorusResult;
use crate::lock::LockOutcome;
use crate::notebook::{Notebook, NotebookMetadata};

#[derive(Debug, Clone)]
pub struct LockOptions {
    pub engine: ResolutionEngine,
    pub kernel_name: Option<String>,
    /// Falls back to the configured lock timeout.
    pub timeout: Option<Duration>,
    pub force: bool,
    pub overrides: RuntimeOverrides,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            engine: ResolutionEngine::Thoth,
            kernel_name: None,
            timeout: None,
            force: false,
            overrides: RuntimeOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LockSummary {
    pub kernel_name: String,
    #[serde(flatten)]
    pub outcome: LockOutcome,
}

impl HorusHost {
    /// Lock the notebook's manifest and record the result in its metadata.
    pub async fn lock_notebook(&self, path: &Path, options: &LockOptions) -> HorusResult<LockSummary> {
        let mut notebook = Notebook::load(path)?;
        let mut metadata = notebook.metadata();
        let pipfile = metadata.require_requirements()?;
        let kernel_name = self.resolve_kernel_name(options.kernel_name.as_deref(), &metadata);

        let engine = match options.engine {
            ResolutionEngine::Pipenv => EngineSpec::Pipenv,
            ResolutionEngine::Thoth => {
                let mut config = self.thoth_config_for(&metadata, &kernel_name, pipfile.python_version())?;
                config.apply(&options.overrides);
                EngineSpec::Thoth(config)
            }
        };
        let notebook_source = match engine {
            EngineSpec::Thoth(_) => Some(notebook.source_code()),
            EngineSpec::Pipenv => None,
        };

        let request = LockRequest {
            pipfile,
            engine: engine.clone(),
            environment: kernel_name.clone(),
            timeout: options.timeout.unwrap_or(self.config.lock_timeout),
            force: options.force,
            notebook_source,
        };
        let outcome = self.lock_environment(request).await?;

        metadata.set_requirements(&outcome.requirements)?;
        metadata.set_requirements_lock(&outcome.requirements_lock)?;
        metadata.set_resolution_engine(outcome.engine);
        metadata.set_kernel_name(&kernel_name);
        if let Some(config) = engine.thoth_config() {
            metadata.set_thoth_config(config)?;
        }
        if let Some(analysis_id) = &outcome.analysis_id {
            metadata.set_thoth_analysis_id(analysis_id);
        }
        notebook.set_metadata(metadata);
        notebook.save()?;
        tracing::info!(kernel = %kernel_name, engine = %outcome.engine, "notebook locked");

        Ok(LockSummary {
            kernel_name,
            outcome,
        })
    }

    /// Engine configuration for a kernel: the notebook's own copy when it has
    /// one, else the kernel directory's `.thoth.yaml` (created on first use).
    fn thoth_config_for(
        &self,
        metadata: &NotebookMetadata,
        kernel_name: &str,
        python_version: Option<&str>,
    ) -> HorusResult<ThothConfig> {
        if let Some(config) = metadata.thoth_config()? {
            return Ok(config);
        }
        self.thoth_config(kernel_name, python_version)
    }

    /// `.thoth.yaml` of a kernel, created with defaults when missing.
    pub fn thoth_config(&self, kernel_name: &str, python_version: Option<&str>) -> HorusResult<ThothConfig> {
        let dir = self.envs.ensure_dir(kernel_name)?;
        let (config, created) =
            ThothConfig::load_or_create(&dir, &self.config.thoth.host, kernel_name, python_version)?;
        if created {
            tracing::debug!(kernel = %kernel_name, "using default thoth configuration");
        }
        Ok(config)
    }
}
