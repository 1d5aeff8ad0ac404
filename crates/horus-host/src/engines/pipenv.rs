//! Local deterministic resolution with `pipenv lock`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use horus_lockfile::{PIPFILE, PIPFILE_LOCK, PipfileLock};

use super::traits::{LockEngine, LockRequest, Resolution};
use super::ResolutionEngine;
use crate::config::HorusConfig;
use crate::environment::EnvironmentManager;
use crate::error::LockError;
use crate::process::{self, in_venv, venv_bin, venv_python};
use crate::util::{read_to_string, write_atomic};

pub struct PipenvEngine {
    envs: EnvironmentManager,
    pipenv: String,
    timeout: Duration,
}

impl PipenvEngine {
    pub fn new(config: &HorusConfig, envs: EnvironmentManager) -> Self {
        Self {
            envs,
            pipenv: config.tools.pipenv.clone(),
            timeout: config.process_timeout,
        }
    }

    /// The configured pipenv when it resolves on PATH, else one installed into the venv.
    async fn pipenv_program(&self, dir: &Path) -> Result<PathBuf, LockError> {
        if let Ok(found) = which::which(&self.pipenv) {
            return Ok(found);
        }
        let python = venv_python(dir);
        self.envs
            .ensure_package(dir, &python, "pipenv", "pipenv")
            .await
            .map_err(|detail| LockError::engine_failure(format!("installing pipenv failed: {detail}")))?;
        Ok(venv_bin(dir).join("pipenv"))
    }
}

#[async_trait]
impl LockEngine for PipenvEngine {
    fn kind(&self) -> ResolutionEngine {
        ResolutionEngine::Pipenv
    }

    async fn resolve(&self, request: &LockRequest) -> Result<Resolution, LockError> {
        let name = request.environment.as_str();
        let failure = |err: crate::error::HorusError| LockError::engine_failure(err.to_string());

        self.envs.destroy(name).map_err(failure)?;
        let dir = self.envs.create_venv(name).await.map_err(failure)?;

        let pipfile = request
            .pipfile
            .to_toml_string()
            .map_err(|e| LockError::engine_failure(e.to_string()))?;
        write_atomic(&dir.join(PIPFILE), pipfile.as_bytes()).map_err(failure)?;

        let pipenv = self.pipenv_program(&dir).await?;
        let mut command = in_venv(&pipenv, &dir);
        command
            .arg("lock")
            .env("PIPENV_CACHE_DIR", std::env::temp_dir().join("pipenv-cache"))
            .env("PIPENV_IGNORE_VIRTUALENVS", "0")
            .env("PIPENV_NOSPIN", "1");
        let output = process::run(command, self.timeout).await.map_err(failure)?;
        if output.timed_out {
            return Err(LockError::timeout(format!(
                "pipenv lock did not finish within {}s",
                self.timeout.as_secs()
            )));
        }
        if !output.success() {
            return Err(LockError::engine_failure(output.failure_detail()));
        }

        let lock_path = dir.join(PIPFILE_LOCK);
        if !lock_path.is_file() {
            return Err(LockError::engine_failure(
                "Error retrieving Pipfile.lock created from pipenv.",
            ));
        }
        let text = read_to_string(&lock_path).map_err(failure)?;
        let lock = PipfileLock::from_json_str(&text)
            .map_err(|e| LockError::engine_failure(format!("pipenv wrote an unreadable lock: {e}")))?;
        tracing::info!(environment = %name, packages = lock.default.len(), "pipenv lock finished");
        Ok(Resolution::from_lock(lock))
    }
}
