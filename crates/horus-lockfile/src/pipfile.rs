use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{LockfileResult, canonical_name, pipfile_hash};

pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/simple";
pub const DEFAULT_INDEX_NAME: &str = "pypi";

/// Package index a requirement can be resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    #[serde(default = "verify_ssl_default")]
    pub verify_ssl: bool,
}

fn verify_ssl_default() -> bool {
    true
}

impl Source {
    pub fn pypi() -> Self {
        Self {
            name: DEFAULT_INDEX_NAME.into(),
            url: DEFAULT_INDEX_URL.into(),
            verify_ssl: true,
        }
    }
}

/// A manifest entry: either a bare constraint (`"*"`, `">=1.0"`) or a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Requirement {
    Version(String),
    Detailed(RequirementDetail),
}

impl Requirement {
    pub fn version(&self) -> Option<&str> {
        match self {
            Requirement::Version(v) => Some(v),
            Requirement::Detailed(detail) => detail.version.as_deref(),
        }
    }

    pub fn index(&self) -> Option<&str> {
        match self {
            Requirement::Version(_) => None,
            Requirement::Detailed(detail) => detail.index.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequirementDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markers: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extras: Vec<String>,
    /// `git`, `path`, `editable` and friends are carried through untouched.
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Declared dependencies of a project, partitioned into default and dev groups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pipfile {
    #[serde(default)]
    pub source: Vec<Source>,
    #[serde(default)]
    pub packages: BTreeMap<String, Requirement>,
    #[serde(default, rename = "dev-packages")]
    pub dev_packages: BTreeMap<String, Requirement>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requires: BTreeMap<String, String>,
    /// Tables such as `[pipenv]` or `[scripts]`.
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl Pipfile {
    /// Empty manifest resolving from PyPI.
    pub fn new(python_version: Option<&str>) -> Self {
        let mut requires = BTreeMap::new();
        if let Some(version) = python_version {
            requires.insert("python_version".to_string(), version.to_string());
        }
        Self {
            source: vec![Source::pypi()],
            requires,
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> LockfileResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> LockfileResult<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn from_json_str(text: &str) -> LockfileResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_value(value: Value) -> LockfileResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json_string(&self) -> LockfileResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_value(&self) -> LockfileResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn hash(&self) -> String {
        pipfile_hash(self)
    }

    pub fn python_version(&self) -> Option<&str> {
        self.requires.get("python_version").map(String::as_str)
    }

    pub fn group(&self, dev: bool) -> &BTreeMap<String, Requirement> {
        if dev { &self.dev_packages } else { &self.packages }
    }

    pub fn group_mut(&mut self, dev: bool) -> &mut BTreeMap<String, Requirement> {
        if dev {
            &mut self.dev_packages
        } else {
            &mut self.packages
        }
    }

    /// Key of `name` inside a group, compared by canonical name.
    pub fn key_in_group(&self, name: &str, dev: bool) -> Option<&str> {
        let wanted = canonical_name(name);
        self.group(dev)
            .keys()
            .find(|key| canonical_name(key) == wanted)
            .map(String::as_str)
    }

    /// Which group (dev = true) holds `name`, if any.
    pub fn find(&self, name: &str) -> Option<(bool, &str, &Requirement)> {
        for dev in [false, true] {
            if let Some(key) = self.key_in_group(name, dev) {
                let requirement = &self.group(dev)[key];
                return Some((dev, key, requirement));
            }
        }
        None
    }

    pub fn source_by_url(&self, url: &str) -> Option<&Source> {
        let wanted = url.trim_end_matches('/');
        self.source
            .iter()
            .find(|source| source.url.trim_end_matches('/') == wanted)
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.dev_packages.is_empty()
    }
}
