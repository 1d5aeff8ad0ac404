//! `horus extract` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::FileArgs;
use crate::opts::GlobalOpts;
use crate::output::print_outcome;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Path to the notebook (.ipynb)
    pub notebook: PathBuf,

    /// Directory receiving the files
    #[arg(long, default_value = ".")]
    pub store_files_path: PathBuf,

    #[command(flatten)]
    pub files: FileArgs,

    /// Write into overlays/<kernel>/ under the store path
    #[arg(long)]
    pub use_overlay: bool,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

pub fn cmd_extract(opts: &GlobalOpts, args: &ExtractArgs) -> Result<()> {
    let host = opts.host();
    let summary = host.extract(
        &args.notebook,
        &args.store_files_path,
        args.files.selection(),
        args.use_overlay,
        args.force,
    )?;
    let names: Vec<String> = summary
        .written
        .iter()
        .map(|path| path.display().to_string())
        .collect();
    print_outcome(opts, &summary, &names.join("\n"), vec![])
}
