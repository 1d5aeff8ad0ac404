//! Kernel registrar: exposes named environments to the notebook runtime.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::process::Command;

use crate::config::{HOST_DEFAULT_KERNEL, HorusConfig};
use crate::environment::EnvironmentManager;
use crate::error::{HorusError, HorusResult};
use crate::process::{self, in_venv, venv_python};

/// Result of [`KernelRegistrar::unregister`]. The kernel spec removal is the
/// operation's success criterion; directory cleanup failures are reported here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnregisterOutcome {
    pub kernel_name: String,
    pub directory_removed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KernelRegistrar {
    envs: EnvironmentManager,
    jupyter: String,
    timeout: Duration,
}

impl KernelRegistrar {
    pub fn new(config: &HorusConfig, envs: EnvironmentManager) -> Self {
        Self {
            envs,
            jupyter: config.tools.jupyter.clone(),
            timeout: config.process_timeout,
        }
    }

    /// Install a kernel spec pointing at the environment's interpreter.
    pub async fn register(&self, name: &str) -> HorusResult<String> {
        let dir = self.envs.path(name)?;
        let python = venv_python(&dir);
        if !python.exists() {
            return Err(HorusError::Kernel(format!(
                "environment {name} has no virtual environment to register"
            )));
        }
        self.envs
            .ensure_package(&dir, &python, "ipykernel", "ipykernel")
            .await
            .map_err(|detail| HorusError::Kernel(format!("installing ipykernel failed: {detail}")))?;

        let mut command = in_venv(&python, &dir);
        command
            .args(["-m", "ipykernel", "install", "--user"])
            .arg(format!("--name={name}"))
            .arg(format!("--display-name={name}"));
        let output = process::run(command, self.timeout).await?;
        if !output.success() {
            return Err(HorusError::Kernel(format!(
                "registering kernel {name} failed: {}",
                output.failure_detail()
            )));
        }
        tracing::info!(kernel = %name, "kernel registered");
        Ok(format!("Installed kernelspec called {name}."))
    }

    /// Every kernel spec known to the runtime, its default kernel included.
    pub async fn list_all(&self) -> HorusResult<BTreeSet<String>> {
        let mut command = Command::new(&self.jupyter);
        command.args(["kernelspec", "list", "--json"]);
        let output = process::run(command, self.timeout).await?;
        if !output.success() {
            return Err(HorusError::Kernel(format!(
                "listing kernels failed: {}",
                output.failure_detail()
            )));
        }
        parse_kernelspecs(&output.stdout)
    }

    /// Kernel specs that can be managed here, without the runtime default.
    pub async fn list(&self) -> HorusResult<BTreeSet<String>> {
        let mut kernels = self.list_all().await?;
        kernels.remove(HOST_DEFAULT_KERNEL);
        Ok(kernels)
    }

    /// Remove the kernel spec, then the environment directory.
    pub async fn unregister(&self, name: &str) -> HorusResult<UnregisterOutcome> {
        if name == HOST_DEFAULT_KERNEL {
            return Err(HorusError::Kernel(format!(
                "{HOST_DEFAULT_KERNEL} is the default kernel and cannot be removed"
            )));
        }
        let mut command = Command::new(&self.jupyter);
        command.args(["kernelspec", "remove", "-f", name]);
        let output = process::run(command, self.timeout).await?;
        if !output.success() {
            return Err(HorusError::Kernel(format!(
                "removing kernelspec {name} failed: {}",
                output.failure_detail()
            )));
        }

        let mut outcome = UnregisterOutcome {
            kernel_name: name.to_string(),
            directory_removed: false,
            directory_error: None,
        };
        match self.envs.destroy(name) {
            Ok(removed) => outcome.directory_removed = removed,
            Err(err) => {
                tracing::warn!(kernel = %name, %err, "kernel removed but environment directory remains");
                outcome.directory_error = Some(err.to_string());
            }
        }
        tracing::info!(kernel = %name, "kernel unregistered");
        Ok(outcome)
    }
}

fn parse_kernelspecs(text: &str) -> HorusResult<BTreeSet<String>> {
    let document: Value = serde_json::from_str(text.trim())?;
    let specs = document
        .get("kernelspecs")
        .and_then(Value::as_object)
        .ok_or_else(|| HorusError::Kernel("kernelspec listing has no 'kernelspecs' object".into()))?;
    Ok(specs.keys().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernelspec_names() {
        let text = r#"{"kernelspecs": {"python3": {"resource_dir": "/x"}, "demo": {"resource_dir": "/y"}}}"#;
        let names = parse_kernelspecs(text).unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["demo", "python3"]);
        assert!(parse_kernelspecs("{}").is_err());
    }
}
