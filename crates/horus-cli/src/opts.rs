//! Global CLI options and host construction.

use std::path::PathBuf;

use clap::Args;
use horus_host::{HorusConfig, HorusHost};

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Debug logging (env: HORUS_DEBUG=1)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON output envelope
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding one environment per kernel (env: HORUS_KERNELS_ROOT)
    #[arg(long, global = true, env = "HORUS_KERNELS_ROOT")]
    pub kernels_root: Option<PathBuf>,
}

impl GlobalOpts {
    pub fn debug(&self) -> bool {
        self.verbose
            || std::env::var("HORUS_DEBUG")
                .is_ok_and(|value| matches!(value.trim(), "1" | "true" | "yes"))
    }

    /// Environment configuration with command-line overrides applied.
    pub fn config(&self) -> HorusConfig {
        let config = HorusConfig::from_env();
        match &self.kernels_root {
            Some(root) => config.with_kernels_root(root),
            None => config,
        }
    }

    pub fn host(&self) -> HorusHost {
        HorusHost::new(self.config())
    }
}
