use std::path::{Path, PathBuf};

use horus_lockfile::Pipfile;
use serde::Serialize;

use super::HorusHost;
use crate::artifacts::{ArtifactSelection, Artifacts};
use crate::discover::{discover_python_version, gather_libraries, pipfile_for_libraries};
use crate::engines::{ResolutionEngine, ThothClient};
use crate::error::{HorusError, HorusResult};
use crate::notebook::{Notebook, NotebookMetadata, keys};

#[derive(Debug, Clone, Serialize)]
pub struct ExtractSummary {
    pub directory: PathBuf,
    pub written: Vec<PathBuf>,
}

/// Stored dependency files rendered in their on-disk formats.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShowReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipfile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipfile_lock: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thoth_config: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Directory holding the files to import.
    pub store: PathBuf,
    pub selection: ArtifactSelection,
    pub engine: ResolutionEngine,
    pub kernel_name: Option<String>,
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoverSummary {
    pub libraries: Vec<String>,
    pub requirements: Pipfile,
    /// Where the manifest went; `None` when it was only shown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<String>,
}

impl HorusHost {
    /// Write the selected metadata entries out as dependency files.
    ///
    /// With `use_overlay` the files land in `<store>/overlays/<kernel>/`.
    pub fn extract(
        &self,
        path: &Path,
        store: &Path,
        selection: ArtifactSelection,
        use_overlay: bool,
        force: bool,
    ) -> HorusResult<ExtractSummary> {
        let notebook = Notebook::load(path)?;
        let metadata = notebook.metadata();
        let artifacts = stored_artifacts(&metadata, selection.or_all())?;
        if artifacts.is_empty() {
            return Err(HorusError::MissingMetadata(keys::REQUIREMENTS.into()));
        }

        let directory = if use_overlay {
            let kernel_name = self.resolve_kernel_name(None, &metadata);
            store.join("overlays").join(kernel_name)
        } else {
            store.to_path_buf()
        };
        let written = artifacts.write_dir(&directory, force)?;
        tracing::info!(directory = %directory.display(), files = written.len(), "dependency files extracted");
        Ok(ExtractSummary { directory, written })
    }

    pub fn show(&self, path: &Path, selection: ArtifactSelection) -> HorusResult<ShowReport> {
        let notebook = Notebook::load(path)?;
        let artifacts = stored_artifacts(&notebook.metadata(), selection.or_all())?;
        if artifacts.is_empty() {
            return Err(HorusError::MissingMetadata(keys::REQUIREMENTS.into()));
        }
        Ok(ShowReport {
            pipfile: artifacts.pipfile.map(|p| p.to_toml_string()).transpose()?,
            pipfile_lock: artifacts
                .pipfile_lock
                .map(|lock| lock.to_json_pretty())
                .transpose()?,
            thoth_config: artifacts
                .thoth_config
                .map(|config| config.to_yaml_string())
                .transpose()?,
        })
    }

    /// Import dependency files from disk into the notebook metadata.
    /// Returns the metadata keys that were written.
    pub fn save_files(&self, path: &Path, options: &SaveOptions) -> HorusResult<Vec<&'static str>> {
        let mut notebook = Notebook::load(path)?;
        let mut metadata = notebook.metadata();
        let artifacts = Artifacts::read_dir(&options.store, options.selection.or_all())?;
        if artifacts.is_empty() {
            return Err(HorusError::Invalid(format!(
                "no dependency files found in {}",
                options.store.display()
            )));
        }

        let mut saved = Vec::new();
        if artifacts.pipfile.is_some() {
            saved.push(keys::REQUIREMENTS);
        }
        if artifacts.pipfile_lock.is_some() {
            saved.push(keys::REQUIREMENTS_LOCK);
        }
        if artifacts.thoth_config.is_some() {
            saved.push(keys::THOTH_CONFIG);
        }
        if !options.force {
            if let Some(key) = saved.iter().find(|key| metadata.contains(key)) {
                return Err(HorusError::MetadataExists(key.to_string()));
            }
        }

        if let Some(pipfile) = &artifacts.pipfile {
            metadata.set_requirements(pipfile)?;
        }
        if let Some(lock) = &artifacts.pipfile_lock {
            metadata.set_requirements_lock(lock)?;
        }
        if let Some(config) = &artifacts.thoth_config {
            metadata.set_thoth_config(config)?;
        }
        metadata.set_resolution_engine(options.engine);
        let kernel_name = self.resolve_kernel_name(options.kernel_name.as_deref(), &metadata);
        metadata.set_kernel_name(&kernel_name);

        notebook.set_metadata(metadata);
        notebook.save()?;
        tracing::info!(keys = ?saved, kernel = %kernel_name, "dependency files saved to notebook");
        Ok(saved)
    }

    /// Build a manifest from the notebook's imports.
    ///
    /// The manifest goes to `<store>/Pipfile` when a store is given, else
    /// into the notebook metadata; `show_only` writes nothing.
    pub async fn discover(
        &self,
        path: &Path,
        store: Option<&Path>,
        show_only: bool,
        force: bool,
    ) -> HorusResult<DiscoverSummary> {
        let mut notebook = Notebook::load(path)?;
        let libraries = gather_libraries(&notebook.source_code());
        let python_version =
            match discover_python_version(&self.config.tools.python, self.config.process_timeout).await {
                Ok(version) => Some(version),
                Err(err) => {
                    tracing::warn!(%err, "python version unknown, manifest will not pin it");
                    None
                }
            };
        let requirements = pipfile_for_libraries(&libraries, python_version.as_deref());
        tracing::info!(count = libraries.len(), "libraries discovered");

        let saved_to = if show_only {
            None
        } else if let Some(store) = store {
            let artifacts = Artifacts {
                pipfile: Some(requirements.clone()),
                ..Artifacts::default()
            };
            let written = artifacts.write_dir(store, force)?;
            written.first().map(|path| path.display().to_string())
        } else {
            let mut metadata = notebook.metadata();
            if metadata.contains(keys::REQUIREMENTS) && !force {
                return Err(HorusError::MetadataExists(keys::REQUIREMENTS.into()));
            }
            metadata.set_requirements(&requirements)?;
            notebook.set_metadata(metadata);
            notebook.save()?;
            Some(format!("{} metadata", notebook.path().display()))
        };

        Ok(DiscoverSummary {
            libraries,
            requirements,
            saved_to,
        })
    }

    /// Log of the remote analysis that produced the notebook's lock.
    pub async fn analysis_log(&self, path: &Path) -> HorusResult<String> {
        let notebook = Notebook::load(path)?;
        let metadata = notebook.metadata();
        let analysis_id = metadata
            .thoth_analysis_id()
            .ok_or_else(|| HorusError::MissingMetadata(keys::THOTH_ANALYSIS_ID.into()))?;
        let (host, tls_verify) = match metadata.thoth_config()? {
            Some(config) => (config.host, config.tls_verify),
            None => (self.config.thoth.host.clone(), true),
        };
        let client = ThothClient::new(&host, tls_verify, self.config.thoth.poll_interval)?;
        client.advise_log(analysis_id).await
    }
}

fn stored_artifacts(metadata: &NotebookMetadata, selection: ArtifactSelection) -> HorusResult<Artifacts> {
    let mut artifacts = Artifacts::default();
    if selection.pipfile {
        artifacts.pipfile = metadata.requirements()?;
    }
    if selection.pipfile_lock {
        artifacts.pipfile_lock = metadata.requirements_lock()?;
    }
    if selection.thoth_config {
        artifacts.thoth_config = metadata.thoth_config()?;
    }
    Ok(artifacts)
}
