//! `horus show` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use horus_host::artifacts::THOTH_CONFIG_FILE;
use horus_lockfile::{PIPFILE, PIPFILE_LOCK};

use super::FileArgs;
use crate::opts::GlobalOpts;
use crate::output::print_outcome;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Path to the notebook (.ipynb)
    pub notebook: PathBuf,

    #[command(flatten)]
    pub files: FileArgs,
}

pub fn cmd_show(opts: &GlobalOpts, args: &ShowArgs) -> Result<()> {
    let report = opts.host().show(&args.notebook, args.files.selection())?;

    let sections = [
        (PIPFILE, &report.pipfile),
        (PIPFILE_LOCK, &report.pipfile_lock),
        (THOTH_CONFIG_FILE, &report.thoth_config),
    ];
    let text = sections
        .iter()
        .filter_map(|(name, body)| {
            body.as_ref()
                .map(|body| format!("# {name}\n{}", body.trim_end()))
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    print_outcome(opts, &report, &text, vec![])
}
