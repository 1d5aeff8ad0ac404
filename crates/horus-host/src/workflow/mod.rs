//! Notebook-level operations composed from the core components.
//!
//! Every operation re-reads the notebook, works on its metadata and writes
//! the document back only when it succeeds.

mod files;
mod kernel;
mod lock;
mod requirements;

use std::sync::Arc;

use crate::config::{DEFAULT_KERNEL_NAME, HOST_DEFAULT_KERNEL, HorusConfig};
use crate::environment::{EnvironmentLocks, EnvironmentManager, InstallReport};
use crate::engines::{LockRequest, ResolutionEngine};
use crate::error::{HorusResult, LockError};
use crate::kernel::KernelRegistrar;
use crate::lock::{LockOrchestrator, LockOutcome};
use crate::notebook::NotebookMetadata;

pub use files::{DiscoverSummary, ExtractSummary, SaveOptions, ShowReport};
pub use kernel::{CheckReport, SetKernelSummary};
pub use lock::{LockOptions, LockSummary};
pub use requirements::RequirementsEdit;

#[derive(Clone)]
pub struct HorusHost {
    config: HorusConfig,
    envs: EnvironmentManager,
    kernels: KernelRegistrar,
    orchestrator: Arc<LockOrchestrator>,
    locks: EnvironmentLocks,
}

impl HorusHost {
    /// Host with the pipenv and thoth engines.
    pub fn new(config: HorusConfig) -> Self {
        let envs = EnvironmentManager::new(&config);
        let orchestrator = LockOrchestrator::with_default_engines(&config, envs.clone());
        Self::with_orchestrator(config, orchestrator)
    }

    pub fn with_orchestrator(config: HorusConfig, orchestrator: LockOrchestrator) -> Self {
        let envs = EnvironmentManager::new(&config);
        let kernels = KernelRegistrar::new(&config, envs.clone());
        Self {
            config,
            envs,
            kernels,
            orchestrator: Arc::new(orchestrator),
            locks: EnvironmentLocks::default(),
        }
    }

    pub fn config(&self) -> &HorusConfig {
        &self.config
    }

    pub fn environments(&self) -> &EnvironmentManager {
        &self.envs
    }

    pub fn kernels(&self) -> &KernelRegistrar {
        &self.kernels
    }

    pub fn orchestrator(&self) -> &LockOrchestrator {
        &self.orchestrator
    }

    /// Kernel for a notebook: explicit choice, then metadata, then the default.
    /// The host runtime's own kernel is never taken over.
    pub fn resolve_kernel_name(&self, requested: Option<&str>, metadata: &NotebookMetadata) -> String {
        let name = requested
            .filter(|name| !name.trim().is_empty())
            .or_else(|| metadata.kernel_name())
            .unwrap_or(DEFAULT_KERNEL_NAME);
        if name == HOST_DEFAULT_KERNEL {
            tracing::info!(
                "{HOST_DEFAULT_KERNEL} cannot be overwritten, using {DEFAULT_KERNEL_NAME} instead"
            );
            return DEFAULT_KERNEL_NAME.to_string();
        }
        name.to_string()
    }

    /// Lock under the environment's advisory lock.
    pub async fn lock_environment(&self, request: LockRequest) -> Result<LockOutcome, LockError> {
        let _guard = self.locks.acquire(&request.environment).await;
        self.orchestrator.lock(request).await
    }

    pub async fn install_environment(&self, name: &str, engine: ResolutionEngine) -> InstallReport {
        let _guard = self.locks.acquire(name).await;
        self.envs.install(name, engine).await
    }

    pub async fn create_kernel(&self, name: &str) -> HorusResult<String> {
        let _guard = self.locks.acquire(name).await;
        self.kernels.register(name).await
    }
}
