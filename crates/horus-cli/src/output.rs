//! Shared output helpers for human and JSON modes.
//!
//! Human mode prints a summary to stdout and notices to stderr. JSON mode
//! wraps responses in `{ data, warnings? }`.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use serde_json::{Value, json};

use crate::opts::GlobalOpts;

/// Print `data` in JSON mode, else the value itself.
pub fn print_success(opts: &GlobalOpts, data: Value, warnings: Vec<String>) -> Result<()> {
    if opts.json {
        print_json(data, warnings)
    } else {
        print_notices(&warnings)?;
        print_value(data)
    }
}

/// Print `data` in JSON mode, else the human `summary`.
pub fn print_outcome<T: Serialize>(
    opts: &GlobalOpts,
    data: &T,
    summary: &str,
    warnings: Vec<String>,
) -> Result<()> {
    if opts.json {
        print_json(serde_json::to_value(data)?, warnings)
    } else {
        print_notices(&warnings)?;
        println!("{summary}");
        Ok(())
    }
}

fn print_json(data: Value, warnings: Vec<String>) -> Result<()> {
    let mut root = json!({ "data": data });
    if !warnings.is_empty() {
        root["warnings"] = warnings.into_iter().map(Value::String).collect();
    }
    println!("{}", serde_json::to_string(&root)?);
    Ok(())
}

fn print_notices(warnings: &[String]) -> Result<()> {
    let mut stderr = std::io::stderr();
    for w in warnings {
        writeln!(stderr, "notice: {w}")?;
    }
    Ok(())
}

fn print_value(value: Value) -> Result<()> {
    match value {
        Value::String(s) => println!("{s}"),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}
