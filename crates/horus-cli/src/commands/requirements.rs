//! `horus requirements` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use horus_host::workflow::RequirementsEdit;
use horus_lockfile::DEFAULT_INDEX_URL;

use crate::opts::GlobalOpts;
use crate::output::print_outcome;

#[derive(Args, Debug)]
pub struct RequirementsArgs {
    /// Path to the notebook (.ipynb)
    pub notebook: PathBuf,

    /// Requirements to add, e.g. `pandas` or `"numpy>=1.20"`
    #[arg(long, num_args = 1..)]
    pub add: Vec<String>,

    /// Package names to remove
    #[arg(long, num_args = 1..)]
    pub remove: Vec<String>,

    /// Edit the development group
    #[arg(long)]
    pub dev: bool,

    /// Index added requirements come from
    #[arg(long, default_value = DEFAULT_INDEX_URL)]
    pub index_url: String,

    /// Write the edited requirements back to the notebook
    #[arg(long)]
    pub save: bool,
}

pub async fn cmd_requirements(opts: &GlobalOpts, args: &RequirementsArgs) -> Result<()> {
    let edit = RequirementsEdit {
        add: args.add.clone(),
        remove: args.remove.clone(),
        index_url: args.index_url.clone(),
        dev: args.dev,
    };
    let pipfile = opts
        .host()
        .requirements(&args.notebook, &edit, args.save)
        .await?;

    let mut warnings = Vec::new();
    if !edit.is_empty() && !args.save {
        warnings.push("requirements were not saved; pass --save to store them".to_string());
    }
    let text = pipfile.to_toml_string()?;
    print_outcome(opts, &pipfile, text.trim_end(), warnings)
}
