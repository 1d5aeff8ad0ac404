//! `horus list-kernels`, `delete-kernel` and `check-kernel` commands.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::opts::GlobalOpts;
use crate::output::{print_outcome, print_success};

#[derive(Args, Debug)]
pub struct KernelNameArgs {
    /// Kernel name
    pub kernel_name: String,
}

pub async fn cmd_list_kernels(opts: &GlobalOpts) -> Result<()> {
    let kernels = opts.host().list_kernels().await?;
    let text = kernels.iter().cloned().collect::<Vec<_>>().join("\n");
    print_outcome(opts, &kernels, &text, vec![])
}

pub async fn cmd_delete_kernel(opts: &GlobalOpts, args: &KernelNameArgs) -> Result<()> {
    let outcome = opts.host().delete_kernel(&args.kernel_name).await?;
    let mut warnings = Vec::new();
    if let Some(err) = &outcome.directory_error {
        warnings.push(format!("environment directory was not removed: {err}"));
    }
    let text = format!("Kernel {} deleted.", outcome.kernel_name);
    print_outcome(opts, &outcome, &text, warnings)
}

pub async fn cmd_check_kernel(opts: &GlobalOpts, args: &KernelNameArgs) -> Result<()> {
    let packages = opts.host().kernel_packages(&args.kernel_name).await?;
    if opts.json {
        return print_success(
            opts,
            json!({"kernel_name": args.kernel_name, "packages": packages}),
            vec![],
        );
    }
    let width = packages.keys().map(String::len).max().unwrap_or(0).max("PACKAGE".len());
    let mut lines = vec![format!("{:<width$} VERSION", "PACKAGE")];
    for (name, version) in &packages {
        lines.push(format!("{name:<width$} {version}"));
    }
    print_success(opts, json!(lines.join("\n")), vec![])
}
