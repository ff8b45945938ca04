//! vokabel-worker entry point.
//!
//! Boots the intercepting HTTP listener and serves the MCP control channel on
//! stdio. Logging goes to stderr to avoid interfering with the JSON-RPC
//! protocol on stdout.

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use vokabel_core::AppConfig;

mod error;
mod handler;
mod host;
mod proxy;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let listen_addr = config.listen_addr.clone();
    let host = host::WorkerHost::open(config).await?;

    // Serve pass-through until the first worker takes control.
    if let Err(e) = host.boot_worker().await {
        tracing::error!(error = %e, "initial worker install failed; retry with worker_update");
    }

    let listener = TcpListener::bind(&listen_addr).await?;
    tracing::info!(addr = %listen_addr, "intercepting listener started");
    let app = proxy::app(host.clone());
    let listener_task = tokio::spawn(async move { axum::serve(listener, app).await });

    tracing::info!("Starting control channel on stdio transport");
    let server = serve_server(handler::WorkerControl::new(host.clone()), stdio()).await?;

    tokio::select! {
        quit = server.waiting() => { quit?; }
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
        served = listener_task => {
            served??;
        }
    }

    host.router().settle().await;
    tracing::info!("shut down");
    Ok(())
}
