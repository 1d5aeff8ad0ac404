//! JSON web API consumed by the notebook front-end.

pub mod api;

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::HttpServerConfig;
use crate::tasks::TaskRegistry;
use crate::workflow::HorusHost;

/// Prefix every route is mounted under.
pub const NAMESPACE: &str = "/jupyterlab_requirements";

#[derive(Clone)]
pub struct HttpState {
    pub host: HorusHost,
    pub tasks: TaskRegistry,
}

impl HttpState {
    pub fn new(host: HorusHost) -> Self {
        Self {
            host,
            tasks: TaskRegistry::new(),
        }
    }
}

pub fn app(state: HttpState) -> Router {
    Router::new()
        .nest(NAMESPACE, api::router())
        .with_state(state)
}

pub fn spawn_http_server(
    config: HttpServerConfig,
    state: HttpState,
    shutdown_tx: broadcast::Sender<()>,
) -> Option<JoinHandle<()>> {
    if !config.enabled {
        return None;
    }
    let app = app(state);
    Some(tokio::spawn(async move {
        if let Err(err) = serve(config.bind, app, shutdown_tx).await {
            tracing::error!("http server error: {err:#}");
        }
    }))
}

/// Serve `app` until a message arrives on `shutdown_tx`.
pub async fn serve(
    addr: SocketAddr,
    app: Router,
    shutdown_tx: broadcast::Sender<()>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!("HTTP server listening on http://{}{NAMESPACE}", addr);
    let mut shutdown_rx = shutdown_tx.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .with_context(|| format!("serve {addr}"))
}
