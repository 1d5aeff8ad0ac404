use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;

use super::HorusHost;
use crate::artifacts::Artifacts;
use crate::check::{self, CheckItem, has_errors};
use crate::config::HOST_DEFAULT_KERNEL;
use crate::engines::ResolutionEngine;
use crate::environment::InstallReport;
use crate::error::{HorusError, HorusResult};
use crate::kernel::UnregisterOutcome;
use crate::notebook::Notebook;

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub kernel_name: String,
    pub items: Vec<CheckItem>,
}

impl CheckReport {
    pub fn has_errors(&self) -> bool {
        has_errors(&self.items)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SetKernelSummary {
    pub kernel_name: String,
    pub install: InstallReport,
    pub registration: String,
}

impl HorusHost {
    pub async fn check_notebook(&self, path: &Path, kernel_name: Option<&str>) -> HorusResult<CheckReport> {
        let notebook = Notebook::load(path)?;
        let metadata = notebook.metadata();
        let kernel_name = self.resolve_kernel_name(kernel_name, &metadata);
        let items = check::check(&metadata, &self.envs, &kernel_name).await;
        Ok(CheckReport { kernel_name, items })
    }

    /// Materialize the notebook's lock as a kernel and bind the notebook to it.
    ///
    /// Refuses to start while the consistency check reports errors. With
    /// `force` an existing kernel of that name is removed first.
    pub async fn set_kernel(
        &self,
        path: &Path,
        kernel_name: Option<&str>,
        force: bool,
    ) -> HorusResult<SetKernelSummary> {
        let mut notebook = Notebook::load(path)?;
        let mut metadata = notebook.metadata();
        let kernel_name = self.resolve_kernel_name(kernel_name, &metadata);

        let items = check::check(&metadata, &self.envs, &kernel_name).await;
        if has_errors(&items) {
            return Err(HorusError::CheckFailed(items));
        }

        let artifacts = Artifacts {
            pipfile: Some(metadata.require_requirements()?),
            pipfile_lock: Some(metadata.require_requirements_lock()?),
            thoth_config: metadata.thoth_config()?,
        };
        // No recorded engine means nothing was resolved locally, so build a fresh venv.
        let engine = metadata
            .resolution_engine()?
            .unwrap_or(ResolutionEngine::Thoth);

        let _guard = self.locks.acquire(&kernel_name).await;
        if force {
            self.remove_kernel(&kernel_name).await?;
        }
        let dir = self.envs.ensure_dir(&kernel_name)?;
        artifacts.write_dir(&dir, true)?;

        let install = self.envs.install(&kernel_name, engine).await;
        if install.error {
            return Err(HorusError::Process(install.message));
        }
        let registration = self.kernels.register(&kernel_name).await?;

        metadata.set_kernel_name(&kernel_name);
        notebook.set_metadata(metadata);
        notebook.save()?;
        tracing::info!(kernel = %kernel_name, "notebook kernel set");

        Ok(SetKernelSummary {
            kernel_name,
            install,
            registration,
        })
    }

    /// Unregister when the runtime knows the kernel; drop its directory either way.
    async fn remove_kernel(&self, name: &str) -> HorusResult<()> {
        let registered = match self.kernels.list().await {
            Ok(kernels) => kernels.contains(name),
            Err(err) => {
                tracing::warn!(kernel = %name, %err, "could not list kernels");
                false
            }
        };
        if registered {
            self.kernels.unregister(name).await?;
        } else {
            self.envs.destroy(name)?;
        }
        Ok(())
    }

    pub async fn list_kernels(&self) -> HorusResult<BTreeSet<String>> {
        self.kernels.list().await
    }

    /// Delete a kernel the runtime lists, never its default one.
    pub async fn delete_kernel(&self, name: &str) -> HorusResult<UnregisterOutcome> {
        if name == HOST_DEFAULT_KERNEL {
            return Err(HorusError::Kernel(format!(
                "{HOST_DEFAULT_KERNEL} is the default kernel and cannot be removed"
            )));
        }
        let kernels = self.kernels.list().await?;
        if !kernels.contains(name) {
            let deletable: Vec<&str> = kernels.iter().map(String::as_str).collect();
            return Err(HorusError::Kernel(format!(
                "kernel {name} does not exist; kernels that can be deleted: {}",
                if deletable.is_empty() {
                    "none".to_string()
                } else {
                    deletable.join(", ")
                }
            )));
        }
        let _guard = self.locks.acquire(name).await;
        self.kernels.unregister(name).await
    }

    /// Installed packages of an existing kernel environment.
    pub async fn kernel_packages(&self, name: &str) -> HorusResult<BTreeMap<String, String>> {
        if !self.envs.exists(name) {
            return Err(HorusError::Kernel(format!(
                "kernel {name} has no environment under {}",
                self.envs.root().display()
            )));
        }
        self.envs.list_packages(name).await
    }
}
