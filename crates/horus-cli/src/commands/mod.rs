//! CLI command handlers.

pub mod check;
pub mod discover;
pub mod extract;
pub mod kernels;
pub mod lock;
pub mod log;
pub mod requirements;
pub mod save;
pub mod serve;
pub mod set_kernel;
pub mod show;
pub mod version;

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use horus_host::{ArtifactSelection, ResolutionEngine};

#[derive(Args, Debug)]
pub struct NotebookArgs {
    /// Path to the notebook (.ipynb)
    pub notebook: PathBuf,
}

/// Which dependency files to act on; none selected means all of them.
#[derive(Args, Debug, Clone, Copy)]
pub struct FileArgs {
    /// Pipfile
    #[arg(long)]
    pub pipfile: bool,

    /// Pipfile.lock
    #[arg(long)]
    pub pipfile_lock: bool,

    /// .thoth.yaml
    #[arg(long)]
    pub thoth_config: bool,
}

impl FileArgs {
    pub fn selection(&self) -> ArtifactSelection {
        ArtifactSelection {
            pipfile: self.pipfile,
            pipfile_lock: self.pipfile_lock,
            thoth_config: self.thoth_config,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineArg {
    Thoth,
    Pipenv,
}

impl From<EngineArg> for ResolutionEngine {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Thoth => ResolutionEngine::Thoth,
            EngineArg::Pipenv => ResolutionEngine::Pipenv,
        }
    }
}
