//! Metadata store: the notebook document and the dependency keys in its metadata.
//!
//! Every operation loads the document, edits the metadata bag and writes the
//! whole document back. Nothing is cached between operations; concurrent
//! writers follow last-writer-wins, but each write replaces the file
//! atomically.

use std::path::{Path, PathBuf};

use horus_lockfile::{Pipfile, PipfileLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::engines::{ResolutionEngine, ThothConfig};
use crate::error::{HorusError, HorusResult};
use crate::util::{read_to_string, write_atomic};

/// Well-known metadata keys.
pub mod keys {
    pub const RESOLUTION_ENGINE: &str = "dependency_resolution_engine";
    pub const REQUIREMENTS: &str = "requirements";
    pub const REQUIREMENTS_LOCK: &str = "requirements_lock";
    pub const THOTH_CONFIG: &str = "thoth_config";
    pub const THOTH_ANALYSIS_ID: &str = "thoth_analysis_id";
    pub const KERNELSPEC: &str = "kernelspec";
    pub const LANGUAGE_INFO: &str = "language_info";
}

#[derive(Debug, Clone)]
pub struct Notebook {
    path: PathBuf,
    document: Value,
}

impl Notebook {
    pub fn load(path: &Path) -> HorusResult<Self> {
        if path.extension().and_then(|ext| ext.to_str()) != Some("ipynb") {
            return Err(HorusError::NotANotebook(format!(
                "{} does not have the .ipynb extension",
                path.display()
            )));
        }
        let text = read_to_string(path)?;
        let document: Value = serde_json::from_str(&text).map_err(|e| {
            HorusError::NotANotebook(format!("{} is not valid JSON: {e}", path.display()))
        })?;
        Self::from_document(path, document)
    }

    pub fn from_document(path: &Path, document: Value) -> HorusResult<Self> {
        let object = document.as_object().ok_or_else(|| {
            HorusError::NotANotebook(format!("{} is not a JSON object", path.display()))
        })?;
        if !object.get("cells").is_some_and(Value::is_array) {
            return Err(HorusError::NotANotebook(format!(
                "{} has no cells list",
                path.display()
            )));
        }
        if !object.get("metadata").is_some_and(Value::is_object) {
            return Err(HorusError::NotANotebook(format!(
                "{} has no metadata object",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    /// Minimal nbformat 4 document with no cells.
    pub fn empty_document() -> Value {
        json!({
            "cells": [],
            "metadata": {},
            "nbformat": 4,
            "nbformat_minor": 5
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> NotebookMetadata {
        let bag = self
            .document
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        NotebookMetadata { bag }
    }

    pub fn set_metadata(&mut self, metadata: NotebookMetadata) {
        if let Some(object) = self.document.as_object_mut() {
            object.insert("metadata".into(), Value::Object(metadata.bag));
        }
    }

    /// Persist the whole document in nbformat's one-space indentation.
    pub fn save(&self) -> HorusResult<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.document.serialize(&mut serializer)?;
        buf.push(b'\n');
        write_atomic(&self.path, &buf)?;
        tracing::debug!(path = %self.path.display(), "notebook saved");
        Ok(())
    }

    /// Source of every code cell, joined by newlines.
    pub fn source_code(&self) -> String {
        let cells = self
            .document
            .get("cells")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut sources = Vec::new();
        for cell in cells {
            if cell.get("cell_type").and_then(Value::as_str) != Some("code") {
                continue;
            }
            match cell.get("source") {
                Some(Value::String(text)) => sources.push(text.clone()),
                Some(Value::Array(lines)) => {
                    sources.push(lines.iter().filter_map(Value::as_str).collect::<String>())
                }
                _ => {}
            }
        }
        sources.join("\n")
    }
}

/// The notebook's metadata object with typed accessors for dependency keys.
///
/// Structured values are written as JSON strings, the layout the notebook
/// extension has always used; reads accept strings and plain objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotebookMetadata {
    bag: Map<String, Value>,
}

impl NotebookMetadata {
    pub fn from_value(value: Value) -> HorusResult<Self> {
        match value {
            Value::Object(bag) => Ok(Self { bag }),
            _ => Err(HorusError::NotANotebook("metadata is not an object".into())),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.bag.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.bag.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.bag.remove(key)
    }

    /// Kernel language, from `language_info.name` or `kernelspec.language`.
    pub fn language(&self) -> Option<&str> {
        self.bag
            .get(keys::LANGUAGE_INFO)
            .and_then(|info| info.get("name"))
            .or_else(|| {
                self.bag
                    .get(keys::KERNELSPEC)
                    .and_then(|spec| spec.get("language"))
            })
            .and_then(Value::as_str)
    }

    pub fn kernel_name(&self) -> Option<&str> {
        self.bag
            .get(keys::KERNELSPEC)
            .and_then(|spec| spec.get("name"))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn set_kernel_name(&mut self, name: &str) {
        let spec = self
            .bag
            .entry(keys::KERNELSPEC)
            .or_insert_with(|| Value::Object(Map::new()));
        if !spec.is_object() {
            *spec = Value::Object(Map::new());
        }
        if let Some(spec) = spec.as_object_mut() {
            spec.insert("name".into(), Value::String(name.to_string()));
            spec.insert("display_name".into(), Value::String(name.to_string()));
            spec.entry("language")
                .or_insert_with(|| Value::String("python".into()));
        }
    }

    pub fn resolution_engine(&self) -> HorusResult<Option<ResolutionEngine>> {
        match self.bag.get(keys::RESOLUTION_ENGINE) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(tag)) => tag.parse().map(Some),
            Some(other) => Err(HorusError::Invalid(format!(
                "{} must be a string, found {other}",
                keys::RESOLUTION_ENGINE
            ))),
        }
    }

    pub fn set_resolution_engine(&mut self, engine: ResolutionEngine) {
        self.bag.insert(
            keys::RESOLUTION_ENGINE.into(),
            Value::String(engine.as_str().into()),
        );
    }

    pub fn requirements(&self) -> HorusResult<Option<Pipfile>> {
        self.structured(keys::REQUIREMENTS)
    }

    pub fn require_requirements(&self) -> HorusResult<Pipfile> {
        self.requirements()?
            .ok_or_else(|| HorusError::MissingMetadata(keys::REQUIREMENTS.into()))
    }

    pub fn set_requirements(&mut self, pipfile: &Pipfile) -> HorusResult<()> {
        self.set_structured(keys::REQUIREMENTS, pipfile)
    }

    pub fn requirements_lock(&self) -> HorusResult<Option<PipfileLock>> {
        self.structured(keys::REQUIREMENTS_LOCK)
    }

    pub fn require_requirements_lock(&self) -> HorusResult<PipfileLock> {
        self.requirements_lock()?
            .ok_or_else(|| HorusError::MissingMetadata(keys::REQUIREMENTS_LOCK.into()))
    }

    pub fn set_requirements_lock(&mut self, lock: &PipfileLock) -> HorusResult<()> {
        self.set_structured(keys::REQUIREMENTS_LOCK, lock)
    }

    pub fn thoth_config(&self) -> HorusResult<Option<ThothConfig>> {
        self.structured(keys::THOTH_CONFIG)
    }

    pub fn set_thoth_config(&mut self, config: &ThothConfig) -> HorusResult<()> {
        self.set_structured(keys::THOTH_CONFIG, config)
    }

    pub fn thoth_analysis_id(&self) -> Option<&str> {
        self.bag.get(keys::THOTH_ANALYSIS_ID).and_then(Value::as_str)
    }

    pub fn set_thoth_analysis_id(&mut self, analysis_id: &str) {
        self.bag.insert(
            keys::THOTH_ANALYSIS_ID.into(),
            Value::String(analysis_id.to_string()),
        );
    }

    fn structured<T: DeserializeOwned>(&self, key: &str) -> HorusResult<Option<T>> {
        match self.bag.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(serde_json::from_str(text)?)),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    fn set_structured<T: Serialize>(&mut self, key: &str, value: &T) -> HorusResult<()> {
        let text = serde_json::to_string(value)?;
        self.bag.insert(key.into(), Value::String(text));
        Ok(())
    }
}
