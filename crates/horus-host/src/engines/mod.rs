//! Resolution engines: the local pipenv resolver and the remote Thoth adviser.

pub mod pipenv;
pub mod thoth;
pub mod traits;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HorusError;

pub use pipenv::PipenvEngine;
pub use thoth::{RuntimeOverrides, ThothClient, ThothConfig, ThothEngine};
pub use traits::{LockEngine, LockRequest, Resolution};

/// Value of the `dependency_resolution_engine` metadata key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionEngine {
    /// Remote advisory resolution.
    Thoth,
    /// Local deterministic resolution.
    Pipenv,
}

impl ResolutionEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionEngine::Thoth => "thoth",
            ResolutionEngine::Pipenv => "pipenv",
        }
    }
}

impl fmt::Display for ResolutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionEngine {
    type Err = HorusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "thoth" => Ok(ResolutionEngine::Thoth),
            "pipenv" => Ok(ResolutionEngine::Pipenv),
            other => Err(HorusError::Invalid(format!(
                "unknown resolution engine '{other}', expected 'thoth' or 'pipenv'"
            ))),
        }
    }
}

/// Engine selection together with the side configuration it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSpec {
    Pipenv,
    Thoth(ThothConfig),
}

impl EngineSpec {
    pub fn kind(&self) -> ResolutionEngine {
        match self {
            EngineSpec::Pipenv => ResolutionEngine::Pipenv,
            EngineSpec::Thoth(_) => ResolutionEngine::Thoth,
        }
    }

    pub fn thoth_config(&self) -> Option<&ThothConfig> {
        match self {
            EngineSpec::Thoth(config) => Some(config),
            EngineSpec::Pipenv => None,
        }
    }
}
