//! `horus save` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use horus_host::workflow::SaveOptions;

use super::{EngineArg, FileArgs};
use crate::opts::GlobalOpts;
use crate::output::print_outcome;

#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Path to the notebook (.ipynb)
    pub notebook: PathBuf,

    /// Engine recorded for the imported files
    #[arg(long, value_enum, default_value_t = EngineArg::Thoth)]
    pub resolution_engine: EngineArg,

    /// Directory holding the files
    #[arg(long, default_value = ".")]
    pub store_files_path: PathBuf,

    /// Kernel the notebook should use
    #[arg(long)]
    pub kernel_name: Option<String>,

    #[command(flatten)]
    pub files: FileArgs,

    /// Replace metadata that is already stored
    #[arg(long)]
    pub force: bool,
}

pub fn cmd_save(opts: &GlobalOpts, args: &SaveArgs) -> Result<()> {
    let options = SaveOptions {
        store: args.store_files_path.clone(),
        selection: args.files.selection(),
        engine: args.resolution_engine.into(),
        kernel_name: args.kernel_name.clone(),
        force: args.force,
    };
    let saved = opts.host().save_files(&args.notebook, &options)?;
    let summary = format!(
        "Saved {} in {}",
        saved.join(", "),
        args.notebook.display()
    );
    print_outcome(opts, &saved, &summary, vec![])
}
