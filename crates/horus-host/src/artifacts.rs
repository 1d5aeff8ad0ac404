//! Dependency files as they live on disk: `Pipfile`, `Pipfile.lock`, `.thoth.yaml`.

use std::path::{Path, PathBuf};

use horus_lockfile::{PIPFILE, PIPFILE_LOCK, Pipfile, PipfileLock};

use crate::engines::ThothConfig;
use crate::error::{HorusError, HorusResult, io_error};
use crate::util::{read_to_string, write_atomic};

pub const THOTH_CONFIG_FILE: &str = ".thoth.yaml";

/// Which of the three files an operation touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtifactSelection {
    pub pipfile: bool,
    pub pipfile_lock: bool,
    pub thoth_config: bool,
}

impl ArtifactSelection {
    pub fn all() -> Self {
        Self {
            pipfile: true,
            pipfile_lock: true,
            thoth_config: true,
        }
    }

    /// No explicit choice means every file.
    pub fn or_all(self) -> Self {
        if self == Self::default() { Self::all() } else { self }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artifacts {
    pub pipfile: Option<Pipfile>,
    pub pipfile_lock: Option<PipfileLock>,
    pub thoth_config: Option<ThothConfig>,
}

impl Artifacts {
    /// Read the selected files from `dir`; absent files stay `None`.
    pub fn read_dir(dir: &Path, selection: ArtifactSelection) -> HorusResult<Self> {
        let mut artifacts = Artifacts::default();
        let pipfile_path = dir.join(PIPFILE);
        if selection.pipfile && pipfile_path.is_file() {
            artifacts.pipfile = Some(Pipfile::from_toml_str(&read_to_string(&pipfile_path)?)?);
        }
        let lock_path = dir.join(PIPFILE_LOCK);
        if selection.pipfile_lock && lock_path.is_file() {
            artifacts.pipfile_lock = Some(PipfileLock::from_json_str(&read_to_string(&lock_path)?)?);
        }
        let config_path = dir.join(THOTH_CONFIG_FILE);
        if selection.thoth_config && config_path.is_file() {
            artifacts.thoth_config = Some(ThothConfig::from_yaml_str(&read_to_string(&config_path)?)?);
        }
        Ok(artifacts)
    }

    /// Write every present file into `dir`. Nothing is written when one
    /// target exists and `force` is off.
    pub fn write_dir(&self, dir: &Path, force: bool) -> HorusResult<Vec<PathBuf>> {
        let mut files: Vec<(PathBuf, String)> = Vec::new();
        if let Some(pipfile) = &self.pipfile {
            files.push((dir.join(PIPFILE), pipfile.to_toml_string()?));
        }
        if let Some(lock) = &self.pipfile_lock {
            files.push((dir.join(PIPFILE_LOCK), lock.to_json_pretty()?));
        }
        if let Some(config) = &self.thoth_config {
            files.push((dir.join(THOTH_CONFIG_FILE), config.to_yaml_string()?));
        }

        if !force {
            if let Some((path, _)) = files.iter().find(|(path, _)| path.exists()) {
                return Err(HorusError::AlreadyExists(path.clone()));
            }
        }
        if !files.is_empty() {
            std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        }
        let mut written = Vec::with_capacity(files.len());
        for (path, contents) in files {
            write_atomic(&path, contents.as_bytes())?;
            written.push(path);
        }
        Ok(written)
    }

    pub fn is_empty(&self) -> bool {
        self.pipfile.is_none() && self.pipfile_lock.is_none() && self.thoth_config.is_none()
    }
}
