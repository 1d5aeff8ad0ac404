//! Shared fixtures for the horus-host integration tests.
//!
//! Each integration test compiles this module separately, so some helpers
//! look unused from one test file or another.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use horus_host::engines::{LockEngine, LockRequest, Resolution, ResolutionEngine};
use horus_host::{EnvironmentManager, HorusConfig, HorusHost, LockError, LockOrchestrator};
use horus_lockfile::{LockedPackage, PipfileLock};
use serde_json::{Value, json};

/// Config rooted at `root` whose tools do not exist, so nothing real is spawned.
pub fn test_config(root: &Path) -> HorusConfig {
    let mut config = HorusConfig::default().with_kernels_root(root.join("kernels"));
    config.tools.python = "horus-test-no-python".into();
    config.tools.pipenv = "horus-test-no-pipenv".into();
    config.tools.jupyter = "horus-test-no-jupyter".into();
    config.process_timeout = Duration::from_secs(20);
    config.lock_timeout = Duration::from_secs(5);
    config.thoth.poll_interval = Duration::from_millis(10);
    config
}

/// Engine that pins every default package to a fixed version and records
/// a digest that never matches, so callers see the orchestrator restamp it.
pub struct FakeEngine {
    kind: ResolutionEngine,
    version: String,
    failure: Option<LockError>,
    pub calls: AtomicUsize,
}

impl FakeEngine {
    pub fn pinning(kind: ResolutionEngine, version: &str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            version: version.to_string(),
            failure: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(kind: ResolutionEngine, error: LockError) -> Arc<Self> {
        Arc::new(Self {
            kind,
            version: String::new(),
            failure: Some(error),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LockEngine for FakeEngine {
    fn kind(&self) -> ResolutionEngine {
        self.kind
    }

    async fn resolve(&self, request: &LockRequest) -> Result<Resolution, LockError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let mut lock = PipfileLock::for_pipfile(&request.pipfile);
        lock.set_source_hash("0000-not-the-manifest-hash");
        for name in request.pipfile.packages.keys() {
            lock.default
                .insert(name.clone(), LockedPackage::pinned(&self.version, Vec::new()));
        }
        for name in request.pipfile.dev_packages.keys() {
            lock.develop
                .insert(name.clone(), LockedPackage::pinned(&self.version, Vec::new()));
        }
        let mut resolution = Resolution::from_lock(lock);
        if self.kind == ResolutionEngine::Thoth {
            resolution.analysis_id = Some("adviser-test-1".into());
            resolution.justification = vec![json!({"type": "INFO", "message": "fake"})];
        }
        Ok(resolution)
    }
}

/// Host whose orchestrator only knows the given engines.
pub fn host_with_engines(config: HorusConfig, engines: &[Arc<FakeEngine>]) -> HorusHost {
    let envs = EnvironmentManager::new(&config);
    let mut orchestrator = LockOrchestrator::new(envs);
    for engine in engines {
        orchestrator.register(engine.clone());
    }
    HorusHost::with_orchestrator(config, orchestrator)
}

pub fn write_notebook(dir: &Path, name: &str, metadata: Value, cells: Vec<Value>) -> PathBuf {
    let path = dir.join(name);
    let document = json!({
        "cells": cells,
        "metadata": metadata,
        "nbformat": 4,
        "nbformat_minor": 5
    });
    std::fs::write(&path, serde_json::to_vec_pretty(&document).unwrap()).unwrap();
    path
}

/// Python notebook with no dependency metadata.
pub fn empty_notebook(dir: &Path) -> PathBuf {
    write_notebook(
        dir,
        "empty.ipynb",
        json!({
            "kernelspec": {"name": "python3", "display_name": "Python 3", "language": "python"},
            "language_info": {"name": "python"}
        }),
        Vec::new(),
    )
}

pub fn code_cell(source: &str) -> Value {
    json!({
        "cell_type": "code",
        "execution_count": null,
        "metadata": {},
        "outputs": [],
        "source": source
    })
}

pub fn read_metadata(path: &Path) -> Value {
    let text = std::fs::read_to_string(path).unwrap();
    let document: Value = serde_json::from_str(&text).unwrap();
    document["metadata"].clone()
}

/// Shell-script stand-ins for `python`, `jupyter` and `pipenv`.
///
/// Every invocation is appended to a log. `python -m venv DIR` copies the
/// fake interpreter into `DIR/bin/python`, so environments it creates answer
/// the same way.
#[cfg(unix)]
pub struct FakeTools {
    pub bin: PathBuf,
    pub log: PathBuf,
    pip_list: PathBuf,
    kernels: PathBuf,
    lock: PathBuf,
}

#[cfg(unix)]
impl FakeTools {
    pub fn install(root: &Path) -> Self {
        let bin = root.join("fake-bin");
        std::fs::create_dir_all(&bin).unwrap();
        let tools = Self {
            log: root.join("fake-tools.log"),
            pip_list: root.join("pip-list.json"),
            kernels: root.join("kernelspecs.json"),
            lock: root.join("pipenv-lock.json"),
            bin,
        };
        tools.write_script(
            "python",
            &format!(
                r#"echo "python $*" >> "{log}"
case "$1" in
  -c)
    case "$2" in
      *version_info*) echo "3.8" ;;
    esac
    ;;
  -m)
    case "$2" in
      venv) mkdir -p "$3/bin" && cp "$0" "$3/bin/python" && chmod +x "$3/bin/python" ;;
      pip) [ "$3" = "list" ] && cat "{pip_list}" 2>/dev/null ;;
    esac
    ;;
esac
exit 0
"#,
                log = tools.log.display(),
                pip_list = tools.pip_list.display(),
            ),
        );
        tools.write_script(
            "jupyter",
            &format!(
                r#"echo "jupyter $*" >> "{log}"
case "$2" in
  list) cat "{kernels}" ;;
esac
exit 0
"#,
                log = tools.log.display(),
                kernels = tools.kernels.display(),
            ),
        );
        tools.write_script(
            "pipenv",
            &format!(
                r#"echo "pipenv $*" >> "{log}"
[ -f Pipfile ] || {{ echo "no Pipfile in $(pwd)" >&2; exit 2; }}
[ -f "{lock}" ] && cat "{lock}" > Pipfile.lock
exit 0
"#,
                log = tools.log.display(),
                lock = tools.lock.display(),
            ),
        );
        tools.set_kernels(&[]);
        tools
    }

    fn write_script(&self, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = self.bin.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    pub fn config(&self, root: &Path) -> HorusConfig {
        let mut config = test_config(root);
        config.tools.python = self.bin.join("python").display().to_string();
        config.tools.jupyter = self.bin.join("jupyter").display().to_string();
        config.tools.pipenv = self.bin.join("pipenv").display().to_string();
        config
    }

    pub fn log(&self) -> String {
        std::fs::read_to_string(&self.log).unwrap_or_default()
    }

    pub fn set_pip_list(&self, packages: &[(&str, &str)]) {
        let entries: Vec<Value> = packages
            .iter()
            .map(|(name, version)| json!({"name": name, "version": version}))
            .collect();
        std::fs::write(&self.pip_list, serde_json::to_vec(&entries).unwrap()).unwrap();
    }

    pub fn set_kernels(&self, names: &[&str]) {
        let mut specs = serde_json::Map::new();
        specs.insert("python3".into(), json!({"resource_dir": "/usr/share/jupyter/kernels/python3"}));
        for name in names {
            specs.insert(name.to_string(), json!({"resource_dir": format!("/kernels/{name}")}));
        }
        let document = json!({"kernelspecs": specs});
        std::fs::write(&self.kernels, serde_json::to_vec(&document).unwrap()).unwrap();
    }

    /// Lock document the fake `pipenv lock` writes; without one it writes nothing.
    pub fn set_pipenv_lock(&self, lock: &PipfileLock) {
        std::fs::write(&self.lock, lock.to_json_pretty().unwrap()).unwrap();
    }

    /// Make `pipenv` fail the way a resolver conflict does.
    pub fn break_pipenv(&self, stderr: &str) {
        self.write_script(
            "pipenv",
            &format!("echo \"pipenv $*\" >> \"{}\"\necho \"{stderr}\" >&2\nexit 1\n", self.log.display()),
        );
    }
}
