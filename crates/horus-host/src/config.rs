use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Kernel used when a notebook names none, or names the host default.
pub const DEFAULT_KERNEL_NAME: &str = "jupyterlab-requirements";
/// The notebook runtime's own kernel; never listed, overwritten or deleted.
pub const HOST_DEFAULT_KERNEL: &str = "python3";
pub const DEFAULT_THOTH_HOST: &str = "khemet.thoth-station.ninja";

#[derive(Debug, Clone)]
pub struct HorusConfig {
    /// Directory holding one sub-directory per named environment.
    pub kernels_root: PathBuf,
    pub tools: ToolConfig,
    /// Upper bound for every local subprocess (venv creation, pipenv, installers).
    pub process_timeout: Duration,
    /// Default resolution timeout for lock requests.
    pub lock_timeout: Duration,
    pub thoth: ThothClientConfig,
    pub http: HttpServerConfig,
}

impl Default for HorusConfig {
    fn default() -> Self {
        Self {
            kernels_root: default_kernels_root(),
            tools: ToolConfig::default(),
            process_timeout: Duration::from_secs(30 * 60),
            lock_timeout: Duration::from_secs(180),
            thoth: ThothClientConfig::default(),
            http: HttpServerConfig::default(),
        }
    }
}

impl HorusConfig {
    /// Defaults overridden by `HORUS_*` / `THOTH_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(root) = env_string("HORUS_KERNELS_ROOT") {
            config.kernels_root = PathBuf::from(root);
        }
        if let Some(python) = env_string("HORUS_PYTHON") {
            config.tools.python = python;
        }
        if let Some(pipenv) = env_string("HORUS_PIPENV") {
            config.tools.pipenv = pipenv;
        }
        if let Some(jupyter) = env_string("HORUS_JUPYTER") {
            config.tools.jupyter = jupyter;
        }
        if let Some(secs) = env_u64("HORUS_PROCESS_TIMEOUT_SECS") {
            config.process_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("HORUS_LOCK_TIMEOUT_SECS") {
            config.lock_timeout = Duration::from_secs(secs);
        }
        if let Some(host) = env_string("THOTH_HOST") {
            config.thoth.host = host;
        }
        if let Some(ms) = env_u64("THOTH_POLL_INTERVAL_MS") {
            config.thoth.poll_interval = Duration::from_millis(ms);
        }
        if let Some(bind) = env_string("HORUS_BIND").and_then(|s| s.parse().ok()) {
            config.http.bind = bind;
        }
        config
    }

    pub fn with_kernels_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.kernels_root = root.into();
        self
    }
}

/// External programs the host shells out to.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub python: String,
    pub pipenv: String,
    pub jupyter: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            python: "python3".into(),
            pipenv: "pipenv".into(),
            jupyter: "jupyter".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThothClientConfig {
    /// Host used when a notebook carries no engine configuration yet.
    pub host: String,
    pub poll_interval: Duration,
}

impl Default for ThothClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_THOTH_HOST.into(),
            poll_interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub enabled: bool,
    pub bind: SocketAddr,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: SocketAddr::from(([127, 0, 0, 1], 8899)),
        }
    }
}

fn default_kernels_root() -> PathBuf {
    home::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("thoth")
        .join("kernels")
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HorusConfig::default();
        assert!(config.kernels_root.ends_with(".local/share/thoth/kernels"));
        assert_eq!(config.lock_timeout, Duration::from_secs(180));
        assert_eq!(config.tools.python, "python3");
        assert_eq!(config.thoth.host, DEFAULT_THOTH_HOST);
    }

    #[test]
    fn kernels_root_override() {
        let config = HorusConfig::default().with_kernels_root("/tmp/kernels");
        assert_eq!(config.kernels_root, PathBuf::from("/tmp/kernels"));
    }
}
