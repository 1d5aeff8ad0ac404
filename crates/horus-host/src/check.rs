//! Consistency checker: drift between metadata, lock and installed environment.
//!
//! The checker never fails; problems are reported as `ERROR` entries. Any
//! `ERROR` blocks kernel creation.

use std::collections::BTreeMap;
use std::fmt;

use horus_lockfile::canonical_name;
use serde::{Deserialize, Serialize};

use crate::engines::ResolutionEngine;
use crate::environment::EnvironmentManager;
use crate::notebook::{NotebookMetadata, keys};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckItem {
    pub message: String,
    #[serde(rename = "type")]
    pub severity: Severity,
}

impl CheckItem {
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

pub fn has_errors(items: &[CheckItem]) -> bool {
    items.iter().any(CheckItem::is_error)
}

/// Run every rule. `installed` is the package listing of the kernel's
/// environment, `None` when that environment does not exist.
pub fn check_metadata(
    metadata: &NotebookMetadata,
    kernel_name: &str,
    installed: Option<&BTreeMap<String, String>>,
) -> Vec<CheckItem> {
    let mut items = Vec::new();

    if let Some(language) = metadata.language() {
        if !language.eq_ignore_ascii_case("python") {
            items.push(CheckItem::new(
                Severity::Error,
                "Only python programming language is supported.",
            ));
            return items;
        }
    }

    items.push(CheckItem::new(
        Severity::Info,
        format!("kernel name selected: {kernel_name}"),
    ));

    let engine = match metadata.resolution_engine() {
        Ok(Some(engine)) => {
            items.push(CheckItem::new(
                Severity::Info,
                format!("{} found: {engine}", keys::RESOLUTION_ENGINE),
            ));
            Some(engine)
        }
        Ok(None) => {
            items.push(CheckItem::new(
                Severity::Warning,
                format!(
                    "{} key is not present in notebook metadata; it is set when dependencies are locked.",
                    keys::RESOLUTION_ENGINE
                ),
            ));
            None
        }
        Err(err) => {
            items.push(CheckItem::new(Severity::Error, err.to_string()));
            None
        }
    };

    if engine == Some(ResolutionEngine::Thoth) && !metadata.contains(keys::THOTH_CONFIG) {
        items.push(CheckItem::new(
            Severity::Error,
            format!(
                "{} key is not present in notebook metadata, but thoth resolves this notebook. Run `horus lock [YOUR_NOTEBOOK].ipynb`.",
                keys::THOTH_CONFIG
            ),
        ));
    }

    let requirements = match metadata.requirements() {
        Ok(Some(pipfile)) => {
            items.push(CheckItem::new(
                Severity::Info,
                format!("{} found in notebook metadata.", keys::REQUIREMENTS),
            ));
            Some(pipfile)
        }
        Ok(None) => {
            items.push(CheckItem::new(
                Severity::Error,
                format!(
                    "{} key is not present in notebook metadata. Create it with `horus requirements [YOUR_NOTEBOOK].ipynb --add [PACKAGE]`.",
                    keys::REQUIREMENTS
                ),
            ));
            None
        }
        Err(err) => {
            items.push(CheckItem::new(
                Severity::Error,
                format!("{} could not be parsed: {err}", keys::REQUIREMENTS),
            ));
            None
        }
    };

    let lock = match metadata.requirements_lock() {
        Ok(Some(lock)) => {
            items.push(CheckItem::new(
                Severity::Info,
                format!("{} found in notebook metadata.", keys::REQUIREMENTS_LOCK),
            ));
            Some(lock)
        }
        Ok(None) => {
            items.push(CheckItem::new(
                Severity::Error,
                format!(
                    "{} key is not present in notebook metadata. Create it with `horus lock [YOUR_NOTEBOOK].ipynb`.",
                    keys::REQUIREMENTS_LOCK
                ),
            ));
            None
        }
        Err(err) => {
            items.push(CheckItem::new(
                Severity::Error,
                format!("{} could not be parsed: {err}", keys::REQUIREMENTS_LOCK),
            ));
            None
        }
    };

    if let (Some(pipfile), Some(lock)) = (&requirements, &lock) {
        let expected = pipfile.hash();
        match lock.source_hash() {
            Some(recorded) if recorded == expected => items.push(CheckItem::new(
                Severity::Info,
                "Pipfile hash stated in Pipfile.lock corresponds to Pipfile hash.",
            )),
            recorded => items.push(CheckItem::new(
                Severity::Error,
                format!(
                    "Pipfile hash stated in Pipfile.lock {} does not correspond to Pipfile hash {} - was Pipfile adjusted? Then you should run `horus lock [YOUR_NOTEBOOK].ipynb`.",
                    short(recorded.unwrap_or("<missing>")),
                    short(&expected)
                ),
            )),
        }
    }

    if let (Some(lock), Some(installed)) = (&lock, installed) {
        let installed: BTreeMap<String, &str> = installed
            .iter()
            .map(|(name, version)| (canonical_name(name), version.as_str()))
            .collect();
        let mismatched: Vec<String> = lock
            .packages()
            .filter_map(|(name, package)| {
                let wanted = package.exact_version()?;
                match installed.get(&canonical_name(name)) {
                    Some(have) if *have == wanted => None,
                    Some(have) => Some(format!("{name} (locked {wanted}, installed {have})")),
                    None => Some(format!("{name} (locked {wanted}, not installed)")),
                }
            })
            .collect();
        if mismatched.is_empty() {
            items.push(CheckItem::new(
                Severity::Info,
                format!("kernel {kernel_name} selected has all dependencies installed."),
            ));
        } else {
            items.push(CheckItem::new(
                Severity::Warning,
                format!(
                    "kernel {kernel_name} selected does not match your dependencies: {}. Please run `horus set-kernel [YOUR_NOTEBOOK].ipynb` to synchronize it.",
                    mismatched.join(", ")
                ),
            ));
        }
    }

    items
}

/// [`check_metadata`] against the live environment named `kernel_name`.
pub async fn check(
    metadata: &NotebookMetadata,
    envs: &EnvironmentManager,
    kernel_name: &str,
) -> Vec<CheckItem> {
    let installed = if envs.exists(kernel_name) {
        match envs.list_packages(kernel_name).await {
            Ok(packages) => Some(packages),
            Err(err) => {
                tracing::warn!(kernel = %kernel_name, %err, "could not list installed packages");
                let mut items = check_metadata(metadata, kernel_name, None);
                items.push(CheckItem::new(
                    Severity::Warning,
                    format!("installed packages of kernel {kernel_name} could not be listed: {err}"),
                ));
                return items;
            }
        }
    } else {
        None
    };
    check_metadata(metadata, kernel_name, installed.as_ref())
}

fn short(digest: &str) -> &str {
    digest.get(..6).unwrap_or(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_python_stops_early() {
        let metadata = NotebookMetadata::from_value(json!({
            "language_info": {"name": "R"},
        }))
        .unwrap();
        let items = check_metadata(&metadata, "demo", None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].severity, Severity::Error);
        assert_eq!(items[0].message, "Only python programming language is supported.");
    }

    #[test]
    fn thoth_without_config_is_an_error() {
        let metadata = NotebookMetadata::from_value(json!({
            "dependency_resolution_engine": "thoth",
        }))
        .unwrap();
        let items = check_metadata(&metadata, "demo", None);
        assert!(items
            .iter()
            .any(|item| item.is_error() && item.message.starts_with("thoth_config")));
    }

    #[test]
    fn severity_serializes_uppercase() {
        let item = CheckItem::new(Severity::Warning, "x");
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({"message": "x", "type": "WARNING"})
        );
    }
}
