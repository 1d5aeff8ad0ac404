//! Environment manager: one virtual environment per name under the kernels root.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use horus_lockfile::PIPFILE_LOCK;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::OwnedMutexGuard;

use crate::config::HorusConfig;
use crate::engines::ResolutionEngine;
use crate::error::{HorusError, HorusResult, io_error};
use crate::process::{self, has_module, in_venv, venv_python};

/// Entries `python -m venv` owns inside an environment directory. Lock
/// artifacts next to them survive a venv rebuild.
const VENV_ENTRIES: &[&str] = &["bin", "Scripts", "lib", "lib64", "include", "share", "pyvenv.cfg"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallStep {
    pub name: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Outcome of [`EnvironmentManager::install`]; failures are recorded, not raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallReport {
    pub kernel_name: String,
    pub error: bool,
    pub message: String,
    pub steps: Vec<InstallStep>,
}

impl InstallReport {
    fn new(kernel_name: &str) -> Self {
        Self {
            kernel_name: kernel_name.to_string(),
            error: false,
            message: String::new(),
            steps: Vec::new(),
        }
    }

    fn ok(&mut self, step: &str, detail: Option<String>) {
        self.steps.push(InstallStep {
            name: step.to_string(),
            ok: true,
            detail,
        });
    }

    fn fail(mut self, step: &str, detail: String) -> Self {
        tracing::warn!(kernel = %self.kernel_name, %step, %detail, "installation step failed");
        self.message = format!("{step} failed: {detail}");
        self.steps.push(InstallStep {
            name: step.to_string(),
            ok: false,
            detail: Some(detail),
        });
        self.error = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentManager {
    root: PathBuf,
    python: String,
    timeout: Duration,
}

impl EnvironmentManager {
    pub fn new(config: &HorusConfig) -> Self {
        Self {
            root: config.kernels_root.clone(),
            python: config.tools.python.clone(),
            timeout: config.process_timeout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Directory of a named environment; the name must be a single path component.
    pub fn path(&self, name: &str) -> HorusResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_ok_and(|dir| dir.is_dir())
    }

    pub fn has_venv(&self, name: &str) -> bool {
        self.path(name)
            .is_ok_and(|dir| venv_python(&dir).exists())
    }

    pub fn ensure_dir(&self, name: &str) -> HorusResult<PathBuf> {
        let dir = self.path(name)?;
        std::fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        Ok(dir)
    }

    /// Rebuild the virtual environment from scratch, keeping lock artifacts.
    pub async fn create_venv(&self, name: &str) -> HorusResult<PathBuf> {
        let dir = self.ensure_dir(name)?;
        for entry in VENV_ENTRIES {
            let path = dir.join(entry);
            let removed = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else if path.exists() {
                std::fs::remove_file(&path)
            } else {
                Ok(())
            };
            removed.map_err(|e| io_error(&path, e))?;
        }

        let mut command = Command::new(&self.python);
        command.arg("-m").arg("venv").arg(&dir);
        let output = process::run(command, self.timeout).await?;
        if !output.success() {
            return Err(HorusError::Process(format!(
                "creating virtual environment {name} failed: {}",
                output.failure_detail()
            )));
        }
        tracing::info!(environment = %name, path = %dir.display(), "virtual environment created");
        Ok(dir)
    }

    /// Install the locked packages, development ones included.
    ///
    /// The pipenv engine already built the virtual environment while locking,
    /// so it is reused when present; any other engine gets a fresh one.
    pub async fn install(&self, name: &str, engine: ResolutionEngine) -> InstallReport {
        let mut report = InstallReport::new(name);
        let dir = match self.ensure_dir(name) {
            Ok(dir) => dir,
            Err(err) => return report.fail("prepare environment directory", err.to_string()),
        };

        if engine == ResolutionEngine::Pipenv && self.has_venv(name) {
            report.ok("reuse virtual environment", None);
        } else {
            match self.create_venv(name).await {
                Ok(_) => report.ok("create virtual environment", None),
                Err(err) => return report.fail("create virtual environment", err.to_string()),
            }
        }

        if !dir.join(PIPFILE_LOCK).is_file() {
            return report.fail(
                "locate lock file",
                format!("{} has no {PIPFILE_LOCK}", dir.display()),
            );
        }

        let python = venv_python(&dir);
        if let Err(detail) = self.ensure_package(&dir, &python, "micropipenv", "micropipenv").await {
            return report.fail("install micropipenv", detail);
        }
        report.ok("micropipenv available", None);

        let mut command = in_venv(&python, &dir);
        command.args(["-m", "micropipenv", "install", "--dev"]);
        match process::run(command, self.timeout).await {
            Ok(output) if output.success() => report.ok("install locked packages", None),
            Ok(output) => return report.fail("install locked packages", output.failure_detail()),
            Err(err) => return report.fail("install locked packages", err.to_string()),
        }

        report.message = format!("Dependencies installed in environment {name}.");
        tracing::info!(environment = %name, "dependencies installed");
        report
    }

    /// Make `module` importable from the environment's interpreter.
    pub(crate) async fn ensure_package(
        &self,
        dir: &Path,
        python: &Path,
        module: &str,
        package: &str,
    ) -> Result<(), String> {
        if has_module(python, module, self.timeout).await {
            return Ok(());
        }
        tracing::info!(%package, env = %dir.display(), "installing missing package");
        let mut command = in_venv(python, dir);
        command.args(["-m", "pip", "install", package]);
        match process::run(command, self.timeout).await {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => Err(output.failure_detail()),
            Err(err) => Err(err.to_string()),
        }
    }

    /// Installed distributions and versions; empty when there is no environment.
    pub async fn list_packages(&self, name: &str) -> HorusResult<BTreeMap<String, String>> {
        if !self.has_venv(name) {
            return Ok(BTreeMap::new());
        }
        let dir = self.path(name)?;
        let python = venv_python(&dir);

        let mut command = in_venv(&python, &dir);
        command.args(["-m", "pip", "list", "--format=json"]);
        let output = process::run(command, self.timeout).await?;
        if output.success() {
            if let Some(packages) = parse_pip_json(&output.stdout) {
                return Ok(packages);
            }
        }

        let mut command = in_venv(&python, &dir);
        command.args(["-m", "pip", "list"]);
        let output = process::run(command, self.timeout).await?;
        if !output.success() {
            return Err(HorusError::Process(format!(
                "listing packages of {name} failed: {}",
                output.failure_detail()
            )));
        }
        Ok(parse_pip_columns(&output.stdout))
    }

    /// Remove the environment directory. Returns false when there was none.
    pub fn destroy(&self, name: &str) -> HorusResult<bool> {
        let dir = self.path(name)?;
        if !dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        tracing::info!(environment = %name, "environment removed");
        Ok(true)
    }
}

fn validate_name(name: &str) -> HorusResult<()> {
    let valid = !name.is_empty()
        && name.trim() == name
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(HorusError::Invalid(format!("invalid environment name '{name}'")))
    }
}

#[derive(Deserialize)]
struct PipListEntry {
    name: String,
    version: String,
}

fn parse_pip_json(text: &str) -> Option<BTreeMap<String, String>> {
    let entries: Vec<PipListEntry> = serde_json::from_str(text.trim()).ok()?;
    Some(
        entries
            .into_iter()
            .map(|entry| (entry.name, entry.version))
            .collect(),
    )
}

/// Legacy `pip list` table: two header lines, then `name version [location]`.
fn parse_pip_columns(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .skip(2)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            Some((parts.next()?.to_string(), parts.next()?.to_string()))
        })
        .collect()
}

/// Per-environment advisory locks; operations on one name are serialized,
/// different names proceed independently.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl EnvironmentLocks {
    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            // Only the table holds idle entries; guards and waiters keep a clone.
            table.retain(|key, lock| key == name || Arc::strong_count(lock) > 1);
            table.entry(name.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
