//! `horus serve` command.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Args;
use horus_host::HorusHost;
use horus_host::http::{HttpState, NAMESPACE, spawn_http_server};
use tokio::sync::broadcast;

use crate::opts::GlobalOpts;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (env: HORUS_BIND, default 127.0.0.1:8899)
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

pub async fn cmd_serve(opts: &GlobalOpts, args: &ServeArgs) -> Result<()> {
    let mut config = opts.config();
    if let Some(bind) = args.bind {
        config.http.bind = bind;
    }
    config.http.enabled = true;
    let http = config.http.clone();
    let state = HttpState::new(HorusHost::new(config));

    let (shutdown_tx, _) = broadcast::channel(1);
    let Some(mut server) = spawn_http_server(http.clone(), state, shutdown_tx.clone()) else {
        anyhow::bail!("http server is disabled");
    };
    eprintln!("serving on http://{}{NAMESPACE}", http.bind);

    // The server only stops on its own when it failed to bind or serve.
    let stopped = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listen for ctrl-c")?;
            false
        }
        joined = &mut server => {
            joined.context("join http server")?;
            true
        }
    };
    if stopped {
        anyhow::bail!("http server on {} stopped", http.bind);
    }

    tracing::info!("interrupt received, shutting down");
    let _ = shutdown_tx.send(());
    server.await.context("join http server")?;
    Ok(())
}
