//! `horus set-kernel` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::opts::GlobalOpts;
use crate::output::print_outcome;

#[derive(Args, Debug)]
pub struct SetKernelArgs {
    /// Path to the notebook (.ipynb)
    pub notebook: PathBuf,

    /// Kernel to create (default: the notebook's kernel)
    #[arg(long)]
    pub kernel_name: Option<String>,

    /// Recreate the kernel if it exists
    #[arg(long)]
    pub force: bool,
}

pub async fn cmd_set_kernel(opts: &GlobalOpts, args: &SetKernelArgs) -> Result<()> {
    let summary = opts
        .host()
        .set_kernel(&args.notebook, args.kernel_name.as_deref(), args.force)
        .await?;
    let text = format!(
        "{}\n{}\nNotebook {} now uses kernel {}.",
        summary.install.message,
        summary.registration,
        args.notebook.display(),
        summary.kernel_name
    );
    print_outcome(opts, &summary, &text, vec![])
}
