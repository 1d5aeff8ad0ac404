//! Pipfile and Pipfile.lock models with pipenv-compatible content hashing.
//!
//! The notebook metadata stores both documents as JSON; on disk the manifest
//! is TOML and the lock is JSON. Hashes follow pipenv exactly so that a lock
//! produced by pipenv itself verifies against a manifest edited here.

mod hash;
mod lock;
mod pipfile;
mod requirement;

pub use hash::{HASH_ALGORITHM, canonical_json, pipfile_hash};
pub use lock::{LockMeta, LockedPackage, PIPFILE_SPEC, PipfileLock};
pub use pipfile::{DEFAULT_INDEX_NAME, DEFAULT_INDEX_URL, Pipfile, Requirement, RequirementDetail, Source};
pub use requirement::{RequirementSpec, canonical_name};

/// File name of the manifest inside an environment directory.
pub const PIPFILE: &str = "Pipfile";
/// File name of the lock inside an environment directory.
pub const PIPFILE_LOCK: &str = "Pipfile.lock";

#[derive(Debug, thiserror::Error)]
pub enum LockfileError {
    #[error("invalid Pipfile: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("cannot encode Pipfile: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid requirement '{0}'")]
    InvalidRequirement(String),
}

pub type LockfileResult<T> = Result<T, LockfileError>;

/// True when `lock` was derived from exactly this manifest.
pub fn in_sync(pipfile: &Pipfile, lock: &PipfileLock) -> bool {
    lock.source_hash() == Some(pipfile.hash().as_str())
}
