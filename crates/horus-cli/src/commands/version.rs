//! `horus version` command.

use anyhow::Result;
use serde_json::json;

use crate::opts::GlobalOpts;
use crate::output::print_outcome;

pub fn cmd_version(opts: &GlobalOpts) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    print_outcome(opts, &json!({ "version": version }), &format!("horus {version}"), vec![])
}
