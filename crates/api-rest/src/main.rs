//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Development and debugging against the router and Swagger UI. It stops on Ctrl-C and does
//! not start the reconciler; production deployments use the workspace's `stash-run` binary.

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stash_core::{CoreConfig, Registry, SHUTDOWN_GRACE_PERIOD};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("STASH_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());

    tracing::info!("-- Starting Stash REST API on {}", addr);

    let registry = Registry::open(Arc::new(CoreConfig::from_env()?)).await?;
    let listener = TcpListener::bind(&addr).await?;

    let shutdown = CancellationToken::new();
    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let served = api_rest::serve(listener, registry.clone(), shutdown, SHUTDOWN_GRACE_PERIOD).await;
    registry.close().await;
    served
}
