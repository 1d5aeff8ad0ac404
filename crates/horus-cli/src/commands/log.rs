//! `horus log` command.

use anyhow::Result;
use serde_json::json;

use super::NotebookArgs;
use crate::opts::GlobalOpts;
use crate::output::print_outcome;

pub async fn cmd_log(opts: &GlobalOpts, args: &NotebookArgs) -> Result<()> {
    let log = opts.host().analysis_log(&args.notebook).await?;
    print_outcome(opts, &json!({ "log": log }), &log, vec![])
}
