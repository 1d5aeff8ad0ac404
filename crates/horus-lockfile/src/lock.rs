use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{HASH_ALGORITHM, LockfileResult, Pipfile, Source};

/// Lock format revision written by pipenv.
pub const PIPFILE_SPEC: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockMeta {
    #[serde(default)]
    pub hash: BTreeMap<String, String>,
    #[serde(rename = "pipfile-spec", default = "pipfile_spec_default")]
    pub pipfile_spec: u32,
    #[serde(default)]
    pub requires: BTreeMap<String, String>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

fn pipfile_spec_default() -> u32 {
    PIPFILE_SPEC
}

/// One pinned package: exact version plus artifact hashes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LockedPackage {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl LockedPackage {
    pub fn pinned(version: &str, hashes: Vec<String>) -> Self {
        Self {
            hashes,
            index: None,
            markers: None,
            version: Some(format!("=={version}")),
            other: BTreeMap::new(),
        }
    }

    /// Version without the `==`/`===` operator.
    pub fn exact_version(&self) -> Option<&str> {
        let version = self.version.as_deref()?;
        Some(version.trim_start_matches('=').trim())
    }
}

/// A locked manifest. Entries are keyed and ordered by package name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipfileLock {
    #[serde(rename = "_meta")]
    pub meta: LockMeta,
    #[serde(default)]
    pub default: BTreeMap<String, LockedPackage>,
    #[serde(default)]
    pub develop: BTreeMap<String, LockedPackage>,
}

impl PipfileLock {
    /// Empty lock whose metadata is derived from `pipfile`.
    pub fn for_pipfile(pipfile: &Pipfile) -> Self {
        let mut hash = BTreeMap::new();
        hash.insert(HASH_ALGORITHM.to_string(), pipfile.hash());
        Self {
            meta: LockMeta {
                hash,
                pipfile_spec: PIPFILE_SPEC,
                requires: pipfile.requires.clone(),
                sources: pipfile.source.clone(),
            },
            default: BTreeMap::new(),
            develop: BTreeMap::new(),
        }
    }

    /// Digest of the manifest this lock was produced from.
    pub fn source_hash(&self) -> Option<&str> {
        self.meta.hash.get(HASH_ALGORITHM).map(String::as_str)
    }

    pub fn set_source_hash(&mut self, digest: impl Into<String>) {
        self.meta
            .hash
            .insert(HASH_ALGORITHM.to_string(), digest.into());
    }

    /// Default packages followed by develop packages.
    pub fn packages(&self) -> impl Iterator<Item = (&String, &LockedPackage)> {
        self.default.iter().chain(self.develop.iter())
    }

    pub fn from_json_str(text: &str) -> LockfileResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_value(value: Value) -> LockfileResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json_value(&self) -> LockfileResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_string(&self) -> LockfileResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Pipenv's on-disk layout: four-space indentation and a trailing newline.
    pub fn to_json_pretty(&self) -> LockfileResult<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        let mut text = String::from_utf8_lossy(&buf).into_owned();
        text.push('\n');
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Requirement, in_sync};

    const LOCK: &str = r#"{
    "_meta": {
        "hash": {"sha256": "0ba145c19353da73840755ed85984b6653241c800c6ad2c772805a6089dfb424"},
        "pipfile-spec": 6,
        "requires": {"python_version": "3.8"},
        "sources": [{"name": "pypi", "url": "https://pypi.org/simple", "verify_ssl": true}]
    },
    "default": {
        "boto3": {
            "hashes": ["sha256:aaaa", "sha256:bbbb"],
            "index": "pypi",
            "version": "==1.17.0"
        },
        "jmespath": {"markers": "python_version >= '3.6'", "version": "==0.10.0"}
    },
    "develop": {}
}"#;

    #[test]
    fn parses_pipenv_lock() {
        let lock = PipfileLock::from_json_str(LOCK).unwrap();
        assert_eq!(lock.meta.pipfile_spec, 6);
        assert_eq!(lock.default["boto3"].exact_version(), Some("1.17.0"));
        assert_eq!(lock.default["boto3"].hashes.len(), 2);
        let names: Vec<&String> = lock.packages().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["boto3", "jmespath"]);
    }

    #[test]
    fn sync_follows_manifest_edits() {
        let lock = PipfileLock::from_json_str(LOCK).unwrap();
        let mut pipfile = Pipfile::new(Some("3.8"));
        pipfile
            .packages
            .insert("boto3".into(), Requirement::Version("*".into()));
        assert!(in_sync(&pipfile, &lock));

        pipfile
            .packages
            .insert("flask".into(), Requirement::Version("*".into()));
        assert!(!in_sync(&pipfile, &lock));
    }

    #[test]
    fn pretty_output_uses_four_spaces() {
        let lock = PipfileLock::for_pipfile(&Pipfile::new(None));
        let text = lock.to_json_pretty().unwrap();
        assert!(text.starts_with("{\n    \"_meta\""));
        assert!(text.ends_with("}\n"));
        assert_eq!(PipfileLock::from_json_str(&text).unwrap(), lock);
    }

    #[test]
    fn missing_hash_has_no_source() {
        let lock: PipfileLock = serde_json::from_str(r#"{"_meta": {}}"#).unwrap();
        assert_eq!(lock.source_hash(), None);
        assert_eq!(lock.meta.pipfile_spec, PIPFILE_SPEC);
    }
}
