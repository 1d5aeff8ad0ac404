//! `horus check` command. Exits 1 when any entry is an `ERROR`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, ValueEnum};
use horus_host::workflow::CheckReport;

use crate::opts::GlobalOpts;
use crate::output::print_success;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Table,
    Json,
    Yaml,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the notebook (.ipynb)
    pub notebook: PathBuf,

    /// Kernel to check against (default: the notebook's kernel)
    #[arg(long)]
    pub kernel_name: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub output: Format,
}

pub async fn cmd_check(opts: &GlobalOpts, args: &CheckArgs) -> Result<ExitCode> {
    let report = opts
        .host()
        .check_notebook(&args.notebook, args.kernel_name.as_deref())
        .await?;

    if opts.json {
        print_success(opts, serde_json::to_value(&report)?, vec![])?;
    } else {
        match args.output {
            Format::Table => println!("{}", table(&report)),
            Format::Json => println!("{}", serde_json::to_string_pretty(&report.items)?),
            Format::Yaml => print!("{}", serde_yaml::to_string(&report.items)?),
        }
    }

    Ok(if report.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn table(report: &CheckReport) -> String {
    let mut lines = vec![format!("{:<8} MESSAGE", "TYPE")];
    for item in &report.items {
        lines.push(format!("{:<8} {}", item.severity.to_string(), item.message));
    }
    lines.join("\n")
}
