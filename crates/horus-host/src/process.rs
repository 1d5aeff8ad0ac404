//! Bounded execution of external programs.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{HorusError, HorusResult};

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// `None` when the process was killed or terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status == Some(0)
    }

    pub fn failure_detail(&self) -> String {
        if self.timed_out {
            return "timed out".to_string();
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.status {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Run `command` to completion, killing it once `timeout` elapses.
///
/// Only a failure to spawn is an error; non-zero exits and timeouts are
/// reported through [`ProcessOutput`].
pub async fn run(mut command: Command, timeout: Duration) -> HorusResult<ProcessOutput> {
    let program = command
        .as_std()
        .get_program()
        .to_string_lossy()
        .into_owned();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command
        .spawn()
        .map_err(|e| HorusError::Process(format!("spawn {program}: {e}")))?;
    tracing::debug!(%program, "spawned process");

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(ProcessOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            timed_out: false,
        }),
        Ok(Err(err)) => Err(HorusError::Process(format!("wait {program}: {err}"))),
        Err(_) => {
            tracing::warn!(%program, ?timeout, "process timed out and was killed");
            Ok(ProcessOutput {
                status: None,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: true,
            })
        }
    }
}

pub fn venv_bin(env_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        env_dir.join("Scripts")
    } else {
        env_dir.join("bin")
    }
}

pub fn venv_python(env_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        venv_bin(env_dir).join("python.exe")
    } else {
        venv_bin(env_dir).join("python")
    }
}

/// Command running inside the virtual environment at `env_dir`, as if activated.
pub fn in_venv(program: impl AsRef<OsStr>, env_dir: &Path) -> Command {
    let bin = venv_bin(env_dir);
    let path = match std::env::var_os("PATH") {
        Some(current) => {
            let entries = std::iter::once(bin.clone()).chain(std::env::split_paths(&current));
            std::env::join_paths(entries).unwrap_or_else(|_| bin.clone().into_os_string())
        }
        None => bin.clone().into_os_string(),
    };
    let mut command = Command::new(program);
    command
        .current_dir(env_dir)
        .env("VIRTUAL_ENV", env_dir)
        .env("PATH", path)
        .env_remove("PYTHONHOME");
    command
}

/// Whether `python` can import `module`.
pub async fn has_module(python: impl AsRef<OsStr>, module: &str, timeout: Duration) -> bool {
    let mut command = Command::new(python);
    command.arg("-c").arg(format!(
        "import importlib.util, sys; sys.exit(0 if importlib.util.find_spec('{module}') else 1)"
    ));
    matches!(run(command, timeout).await, Ok(output) if output.success())
}
