//! `horus lock` command.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Args, ValueEnum};
use horus_host::engines::RuntimeOverrides;
use horus_host::engines::thoth::RecommendationType;
use horus_host::workflow::LockOptions;
use horus_host::ResolutionEngine;

use crate::opts::GlobalOpts;
use crate::output::print_outcome;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationArg {
    Latest,
    Stable,
    Performance,
    Security,
}

impl From<RecommendationArg> for RecommendationType {
    fn from(arg: RecommendationArg) -> Self {
        match arg {
            RecommendationArg::Latest => RecommendationType::Latest,
            RecommendationArg::Stable => RecommendationType::Stable,
            RecommendationArg::Performance => RecommendationType::Performance,
            RecommendationArg::Security => RecommendationType::Security,
        }
    }
}

#[derive(Args, Debug)]
pub struct LockArgs {
    /// Path to the notebook (.ipynb)
    pub notebook: PathBuf,

    /// Resolve locally with pipenv instead of the Thoth adviser
    #[arg(long)]
    pub pipenv: bool,

    /// Kernel the lock is made for (default: the notebook's kernel)
    #[arg(long)]
    pub kernel_name: Option<String>,

    /// Seconds to wait for a resolution (env: HORUS_LOCK_TIMEOUT_SECS, default 180)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Ask the adviser for a fresh analysis
    #[arg(long)]
    pub force: bool,

    #[arg(long, value_enum)]
    pub recommendation_type: Option<RecommendationArg>,

    #[arg(long)]
    pub os_name: Option<String>,

    #[arg(long)]
    pub os_version: Option<String>,

    #[arg(long)]
    pub python_version: Option<String>,

    /// Adviser labels, e.g. `team=data,env=prod`
    #[arg(long)]
    pub labels: Option<String>,
}

fn lock_options(args: &LockArgs) -> Result<LockOptions> {
    let labels = match &args.labels {
        Some(text) => parse_labels(text)?,
        None => BTreeMap::new(),
    };
    Ok(LockOptions {
        engine: if args.pipenv {
            ResolutionEngine::Pipenv
        } else {
            ResolutionEngine::Thoth
        },
        kernel_name: args.kernel_name.clone(),
        timeout: args.timeout.map(Duration::from_secs),
        force: args.force,
        overrides: RuntimeOverrides {
            recommendation_type: args.recommendation_type.map(Into::into),
            os_name: args.os_name.clone(),
            os_version: args.os_version.clone(),
            python_version: args.python_version.clone(),
            labels,
        },
    })
}

pub async fn cmd_lock(opts: &GlobalOpts, args: &LockArgs) -> Result<()> {
    let options = lock_options(args)?;
    let summary = opts.host().lock_notebook(&args.notebook, &options).await?;
    let mut warnings = Vec::new();
    if !summary.outcome.persisted {
        warnings.push(format!(
            "lock files could not be stored in the environment of kernel {}",
            summary.kernel_name
        ));
    }
    let mut text = format!(
        "Dependencies locked with {} for kernel {} ({} packages).",
        summary.outcome.engine,
        summary.kernel_name,
        summary.outcome.requirements_lock.packages().count()
    );
    if let Some(id) = &summary.outcome.analysis_id {
        text.push_str(&format!("\nAnalysis id: {id}"));
    }
    print_outcome(opts, &summary, &text, warnings)
}

/// `k=v,k2=v2` into a map; empty segments are skipped.
fn parse_labels(text: &str) -> Result<BTreeMap<String, String>> {
    let mut labels = BTreeMap::new();
    for pair in text.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("label '{pair}' is not of the form key=value");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("label '{pair}' has an empty key");
        }
        labels.insert(key.to_string(), value.trim().to_string());
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(clap::Parser)]
    struct TestCli {
        #[command(flatten)]
        lock: LockArgs,
    }

    fn parse(args: &[&str]) -> LockArgs {
        <TestCli as clap::Parser>::try_parse_from(std::iter::once("lock").chain(args.iter().copied())).unwrap().lock
    }

    #[test]
    fn timeout_defers_to_config_unless_given() {
        let options = lock_options(&parse(&["nb.ipynb"])).unwrap();
        assert_eq!(options.timeout, None);

        let options = lock_options(&parse(&["nb.ipynb", "--timeout", "30", "--pipenv"])).unwrap();
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.engine, ResolutionEngine::Pipenv);
    }

    #[test]
    fn labels_parse() {
        let labels = parse_labels("team=data, env = prod,,").unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["env"], "prod");
        assert!(parse_labels("team").is_err());
        assert!(parse_labels("=x").is_err());
    }
}
