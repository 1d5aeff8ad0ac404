//! `horus discover` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::opts::GlobalOpts;
use crate::output::print_outcome;

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Path to the notebook (.ipynb)
    pub notebook: PathBuf,

    /// Write a Pipfile into this directory instead of the notebook
    #[arg(long)]
    pub store_files_path: Option<PathBuf>,

    /// Print the result without writing anything
    #[arg(long)]
    pub show_only: bool,

    /// Overwrite existing requirements
    #[arg(long)]
    pub force: bool,
}

pub async fn cmd_discover(opts: &GlobalOpts, args: &DiscoverArgs) -> Result<()> {
    let summary = opts
        .host()
        .discover(
            &args.notebook,
            args.store_files_path.as_deref(),
            args.show_only,
            args.force,
        )
        .await?;

    let mut text = summary.requirements.to_toml_string()?.trim_end().to_string();
    if let Some(target) = &summary.saved_to {
        text.push_str(&format!("\n\nSaved to {target}"));
    }
    let mut warnings = Vec::new();
    if summary.libraries.is_empty() {
        warnings.push("no third-party imports found".to_string());
    }
    print_outcome(opts, &summary, &text, warnings)
}
