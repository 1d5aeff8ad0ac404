use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{LockfileError, LockfileResult};

static REQUIREMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?P<name>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[(?P<extras>[^\]]*)\])?\s*(?P<constraint>[^;]*?)\s*(?:;\s*(?P<markers>.+?))?\s*$",
    )
    .expect("requirement regex")
});

static SEPARATORS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_.]+").expect("separator regex"));

/// PEP 503 normalized project name.
pub fn canonical_name(name: &str) -> String {
    SEPARATORS_RE
        .replace_all(name.trim(), "-")
        .to_ascii_lowercase()
}

/// A PEP 508 requirement string split into the pieces a manifest stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementSpec {
    pub name: String,
    pub extras: Vec<String>,
    /// `*` when no version constraint was given.
    pub constraint: String,
    pub markers: Option<String>,
}

impl RequirementSpec {
    pub fn new(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extras: Vec::new(),
            constraint: constraint.into(),
            markers: None,
        }
    }

    pub fn parse(input: &str) -> LockfileResult<Self> {
        let invalid = || LockfileError::InvalidRequirement(input.to_string());
        let caps = REQUIREMENT_RE.captures(input).ok_or_else(invalid)?;
        let name = caps["name"].to_string();
        let extras = caps
            .name("extras")
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut constraint = caps
            .name("constraint")
            .map(|m| m.as_str().trim())
            .unwrap_or_default()
            .to_string();
        if constraint.starts_with('(') && constraint.ends_with(')') {
            constraint = constraint[1..constraint.len() - 1].trim().to_string();
        }
        if constraint.is_empty() {
            constraint = "*".to_string();
        } else if constraint != "*" && !constraint.starts_with(['<', '>', '=', '!', '~']) {
            return Err(invalid());
        }

        let markers = caps.name("markers").map(|m| m.as_str().to_string());
        Ok(Self {
            name,
            extras,
            constraint,
            markers,
        })
    }
}

impl FromStr for RequirementSpec {
    type Err = LockfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequirementSpec::parse(s)
    }
}

impl fmt::Display for RequirementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        if self.constraint != "*" {
            f.write_str(&self.constraint)?;
        }
        if let Some(markers) = &self.markers {
            write!(f, "; {markers}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_means_any_version() {
        let spec = RequirementSpec::parse("boto3").unwrap();
        assert_eq!(spec, RequirementSpec::new("boto3", "*"));
    }

    #[test]
    fn parses_constraint_extras_and_markers() {
        let spec = RequirementSpec::parse(
            "requests[security, socks] >=2.25,<3 ; python_version < \"3.8\"",
        )
        .unwrap();
        assert_eq!(spec.name, "requests");
        assert_eq!(spec.extras, vec!["security", "socks"]);
        assert_eq!(spec.constraint, ">=2.25,<3");
        assert_eq!(spec.markers.as_deref(), Some("python_version < \"3.8\""));
        assert_eq!(
            spec.to_string(),
            "requests[security,socks]>=2.25,<3; python_version < \"3.8\""
        );
    }

    #[test]
    fn parenthesized_constraint() {
        let spec = RequirementSpec::parse("flask (~=2.0)").unwrap();
        assert_eq!(spec.constraint, "~=2.0");
    }

    #[test]
    fn rejects_garbage() {
        assert!(RequirementSpec::parse("").is_err());
        assert!(RequirementSpec::parse("flask 2.0").is_err());
        assert!("-flask".parse::<RequirementSpec>().is_err());
    }

    #[test]
    fn canonical_names() {
        assert_eq!(canonical_name("PyYAML"), "pyyaml");
        assert_eq!(canonical_name("typing_extensions"), "typing-extensions");
        assert_eq!(canonical_name("zope.interface"), "zope-interface");
        assert_eq!(canonical_name("a-_.b"), "a-b");
    }
}
