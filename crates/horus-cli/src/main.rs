mod commands;
mod opts;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::check::CheckArgs;
use commands::discover::DiscoverArgs;
use commands::extract::ExtractArgs;
use commands::kernels::KernelNameArgs;
use commands::lock::LockArgs;
use commands::requirements::RequirementsArgs;
use commands::save::SaveArgs;
use commands::serve::ServeArgs;
use commands::set_kernel::SetKernelArgs;
use commands::show::ShowArgs;
use commands::NotebookArgs;
use opts::GlobalOpts;

#[derive(Parser, Debug)]
#[command(name = "horus", version, about = "Dependency management for Jupyter notebooks")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write dependency files stored in a notebook to disk
    Extract(ExtractArgs),

    /// Print dependency files stored in a notebook
    Show(ShowArgs),

    /// Store dependency files from disk in a notebook
    Save(SaveArgs),

    /// Build requirements from the notebook's imports
    Discover(DiscoverArgs),

    /// Check notebook metadata against its lock and kernel
    Check(CheckArgs),

    /// Install the locked dependencies as a kernel and bind the notebook to it
    SetKernel(SetKernelArgs),

    /// List kernels that can be managed
    ListKernels,

    /// Remove a kernel and its environment
    DeleteKernel(KernelNameArgs),

    /// List packages installed in a kernel's environment
    CheckKernel(KernelNameArgs),

    /// Show or edit the notebook's requirements
    Requirements(RequirementsArgs),

    /// Lock the notebook's requirements
    Lock(LockArgs),

    /// Show the log of the analysis that produced the lock
    Log(NotebookArgs),

    /// Print the version
    Version,

    /// Serve the web API until interrupted
    Serve(ServeArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(&cli.opts);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let opts = &cli.opts;
    let done = |result: Result<()>| result.map(|()| ExitCode::SUCCESS);

    match cli.command {
        Command::Extract(args) => done(commands::extract::cmd_extract(opts, &args)),
        Command::Show(args) => done(commands::show::cmd_show(opts, &args)),
        Command::Save(args) => done(commands::save::cmd_save(opts, &args)),
        Command::Discover(args) => done(commands::discover::cmd_discover(opts, &args).await),
        Command::Check(args) => commands::check::cmd_check(opts, &args).await,
        Command::SetKernel(args) => done(commands::set_kernel::cmd_set_kernel(opts, &args).await),
        Command::ListKernels => done(commands::kernels::cmd_list_kernels(opts).await),
        Command::DeleteKernel(args) => done(commands::kernels::cmd_delete_kernel(opts, &args).await),
        Command::CheckKernel(args) => done(commands::kernels::cmd_check_kernel(opts, &args).await),
        Command::Requirements(args) => {
            done(commands::requirements::cmd_requirements(opts, &args).await)
        }
        Command::Lock(args) => done(commands::lock::cmd_lock(opts, &args).await),
        Command::Log(args) => done(commands::log::cmd_log(opts, &args).await),
        Command::Version => done(commands::version::cmd_version(opts)),
        Command::Serve(args) => done(commands::serve::cmd_serve(opts, &args).await),
    }
}

/// Logs go to stderr so command output stays parseable.
fn setup_logging(opts: &GlobalOpts) {
    let level = if opts.debug() { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
