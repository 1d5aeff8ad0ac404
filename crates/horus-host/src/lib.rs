pub mod artifacts;
pub mod check;
pub mod config;
pub mod discover;
pub mod engines;
pub mod environment;
pub mod error;
pub mod http;
pub mod kernel;
pub mod lock;
pub mod notebook;
pub mod process;
pub mod requirements;
pub mod tasks;
pub mod workflow;

mod util;

pub use artifacts::{ArtifactSelection, Artifacts};
pub use check::{CheckItem, Severity};
pub use config::{DEFAULT_KERNEL_NAME, HOST_DEFAULT_KERNEL, HorusConfig};
pub use engines::{EngineSpec, LockEngine, LockRequest, Resolution, ResolutionEngine};
pub use environment::{EnvironmentManager, InstallReport};
pub use error::{HorusError, HorusResult, LockError};
pub use lock::{LockOrchestrator, LockOutcome};
pub use notebook::{Notebook, NotebookMetadata};
pub use tasks::{TaskId, TaskOutcome, TaskPoll, TaskRegistry};
pub use workflow::HorusHost;
