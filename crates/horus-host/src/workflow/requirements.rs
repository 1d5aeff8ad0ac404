use std::path::Path;

use horus_lockfile::{Pipfile, RequirementSpec};

use super::HorusHost;
use crate::discover::discover_python_version;
use crate::error::HorusResult;
use crate::notebook::Notebook;
use crate::requirements;

/// Manifest edits requested in one call.
#[derive(Debug, Clone, Default)]
pub struct RequirementsEdit {
    pub add: Vec<String>,
    pub remove: Vec<String>,
    /// Index for added packages; empty means the manifest's primary index.
    pub index_url: String,
    pub dev: bool,
}

impl RequirementsEdit {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

impl HorusHost {
    /// Apply `edit` to the notebook's manifest and return the result.
    ///
    /// Without edits the stored manifest is returned as-is. The notebook is
    /// written only when `save` is set and every edit applied.
    pub async fn requirements(
        &self,
        path: &Path,
        edit: &RequirementsEdit,
        save: bool,
    ) -> HorusResult<Pipfile> {
        let mut notebook = Notebook::load(path)?;
        let mut metadata = notebook.metadata();

        if edit.is_empty() {
            return metadata.require_requirements();
        }

        let specs = edit
            .add
            .iter()
            .map(|raw| RequirementSpec::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let mut pipfile = match metadata.requirements()? {
            Some(pipfile) => pipfile,
            None => {
                let python_version = match discover_python_version(
                    &self.config.tools.python,
                    self.config.process_timeout,
                )
                .await
                {
                    Ok(version) => Some(version),
                    Err(err) => {
                        tracing::warn!(%err, "python version unknown, manifest will not pin it");
                        None
                    }
                };
                Pipfile::new(python_version.as_deref())
            }
        };

        for spec in &specs {
            requirements::add(&mut pipfile, spec, &edit.index_url, edit.dev, true)?;
            tracing::info!(package = %spec.name, constraint = %spec.constraint, dev = edit.dev, "requirement added");
        }
        for name in &edit.remove {
            let group = requirements::remove(&mut pipfile, name)?;
            tracing::info!(package = %name, group = group.as_str(), "requirement removed");
        }

        if save {
            metadata.set_requirements(&pipfile)?;
            notebook.set_metadata(metadata);
            notebook.save()?;
        }
        Ok(pipfile)
    }
}
