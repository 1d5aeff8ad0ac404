//! Requirement set editor.
//!
//! Edits never touch a lock; callers re-lock explicitly and the consistency
//! check reports the drift until they do.

use std::collections::BTreeSet;

use horus_lockfile::{DEFAULT_INDEX_URL, Pipfile, Requirement, RequirementDetail, RequirementSpec, Source};
use url::Url;

use crate::error::{HorusError, HorusResult};

/// Manifest partition a requirement lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Default,
    Dev,
}

impl Group {
    pub fn from_dev(dev: bool) -> Self {
        if dev { Group::Dev } else { Group::Default }
    }

    pub fn is_dev(self) -> bool {
        self == Group::Dev
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Group::Default => "default",
            Group::Dev => "dev",
        }
    }
}

/// Add `spec` to the selected group.
///
/// A name already declared (in either group, compared canonically) is a
/// duplicate unless `force` is set, in which case the old entry is replaced.
/// On error the manifest is left untouched.
pub fn add(
    pipfile: &mut Pipfile,
    spec: &RequirementSpec,
    index_url: &str,
    dev: bool,
    force: bool,
) -> HorusResult<()> {
    let existing = pipfile
        .find(&spec.name)
        .map(|(in_dev, key, _)| (in_dev, key.to_string()));
    if let Some((in_dev, _)) = &existing {
        if !force {
            return Err(HorusError::DuplicateRequirement {
                name: spec.name.clone(),
                group: Group::from_dev(*in_dev).as_str(),
            });
        }
    }

    let index_name = index_name_for(pipfile, index_url)?;
    let requirement = entry_for(spec, index_name.as_ref().map(|(name, _)| name.as_str()));
    if let Some((name, Some(source))) = index_name {
        tracing::debug!(index = %name, "registering package source");
        pipfile.source.push(source);
    }
    if let Some((in_dev, key)) = existing {
        pipfile.group_mut(in_dev).remove(&key);
    }
    pipfile.group_mut(dev).insert(spec.name.clone(), requirement);
    Ok(())
}

/// Remove `name` from whichever group declares it.
pub fn remove(pipfile: &mut Pipfile, name: &str) -> HorusResult<Group> {
    let (dev, key) = pipfile
        .find(name)
        .map(|(dev, key, _)| (dev, key.to_string()))
        .ok_or_else(|| HorusError::RequirementNotFound(name.to_string()))?;
    pipfile.group_mut(dev).remove(&key);
    prune_sources(pipfile);
    Ok(Group::from_dev(dev))
}

/// Drop secondary sources that no remaining requirement points at.
fn prune_sources(pipfile: &mut Pipfile) {
    let referenced: BTreeSet<String> = pipfile
        .packages
        .values()
        .chain(pipfile.dev_packages.values())
        .filter_map(|requirement| match requirement {
            Requirement::Detailed(detail) => detail.index.clone(),
            Requirement::Version(_) => None,
        })
        .collect();
    let mut position = 0;
    pipfile.source.retain(|source| {
        let keep = position == 0 || referenced.contains(&source.name);
        position += 1;
        if !keep {
            tracing::debug!(index = %source.name, "dropping unused package source");
        }
        keep
    });
}

/// `None` for the manifest's primary index; otherwise the source name to
/// reference, plus a new source entry when the URL is not registered yet.
fn index_name_for(pipfile: &Pipfile, index_url: &str) -> HorusResult<Option<(String, Option<Source>)>> {
    let url = if index_url.trim().is_empty() {
        DEFAULT_INDEX_URL
    } else {
        index_url.trim()
    };
    let primary = pipfile
        .source
        .first()
        .map(|source| source.url.as_str())
        .unwrap_or(DEFAULT_INDEX_URL);
    if primary.trim_end_matches('/') == url.trim_end_matches('/') {
        return Ok(None);
    }
    if let Some(source) = pipfile.source_by_url(url) {
        return Ok(Some((source.name.clone(), None)));
    }

    let parsed = Url::parse(url)
        .map_err(|e| HorusError::Invalid(format!("invalid index url '{url}': {e}")))?;
    let base = parsed
        .host_str()
        .map(|host| host.replace('.', "-"))
        .unwrap_or_else(|| "index".to_string());
    let mut name = base.clone();
    let mut counter = 1;
    while pipfile.source.iter().any(|source| source.name == name) {
        counter += 1;
        name = format!("{base}-{counter}");
    }
    let source = Source {
        name: name.clone(),
        url: url.to_string(),
        verify_ssl: parsed.scheme() == "https",
    };
    Ok(Some((name, Some(source))))
}

fn entry_for(spec: &RequirementSpec, index: Option<&str>) -> Requirement {
    if index.is_none() && spec.extras.is_empty() && spec.markers.is_none() {
        return Requirement::Version(spec.constraint.clone());
    }
    Requirement::Detailed(RequirementDetail {
        version: Some(spec.constraint.clone()),
        index: index.map(str::to_string),
        markers: spec.markers.clone(),
        extras: spec.extras.clone(),
        ..RequirementDetail::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extras_and_markers_make_a_table() {
        let mut pipfile = Pipfile::new(None);
        let spec = RequirementSpec::parse("requests[socks]>=2; python_version > '3'").unwrap();
        add(&mut pipfile, &spec, DEFAULT_INDEX_URL, false, false).unwrap();
        match &pipfile.packages["requests"] {
            Requirement::Detailed(detail) => {
                assert_eq!(detail.version.as_deref(), Some(">=2"));
                assert_eq!(detail.extras, vec!["socks".to_string()]);
                assert!(detail.index.is_none());
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn empty_index_url_means_primary() {
        let mut pipfile = Pipfile::new(None);
        add(&mut pipfile, &RequirementSpec::new("flask", "*"), "", false, false).unwrap();
        assert_eq!(pipfile.packages["flask"], Requirement::Version("*".into()));
        assert_eq!(pipfile.source.len(), 1);
    }

    #[test]
    fn invalid_index_url_leaves_manifest_alone() {
        let mut pipfile = Pipfile::new(None);
        let before = pipfile.clone();
        let err = add(&mut pipfile, &RequirementSpec::new("flask", "*"), "not a url", false, false)
            .unwrap_err();
        assert!(matches!(err, HorusError::Invalid(_)));
        assert_eq!(pipfile, before);
    }
}
