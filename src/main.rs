use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stash_core::{CoreConfig, Registry, SHUTDOWN_GRACE_PERIOD};
use std::sync::Arc;

/// Main entry point for the Stash application
///
/// Opens the file registry, starts the reconciler when the snapshot backend is configured and
/// serves the REST API until SIGINT or SIGTERM arrives.
///
/// # Environment Variables
/// - `STASH_REST_ADDR`: REST server address (default: "0.0.0.0:8080")
/// - `STASH_UPLOAD_DIR`, `STASH_MAX_FILE_SIZE`, `STASH_ALLOWED_EXTENSIONS`, `STASH_BACKEND`,
///   `STASH_DATABASE_URL`, `STASH_QUERY_TIMEOUT_SECS`, `STASH_RECONCILE_INTERVAL_MS`:
///   registry settings, see `CoreConfig::from_env`
///
/// # Returns
/// * `Ok(())` - After a clean shutdown
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stash_run=info".parse()?)
                .add_directive("stash_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Arc::new(CoreConfig::from_env()?);
    let rest_addr = std::env::var("STASH_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());

    let registry = Registry::open(cfg.clone()).await?;
    tracing::info!(
        "++ Registry ready ({:?} backend, directory {})",
        cfg.backend(),
        cfg.upload_dir().display()
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let reconciler = registry.spawn_reconciler(shutdown.child_token());

    let listener = TcpListener::bind(&rest_addr).await?;
    tracing::info!("++ Starting Stash REST on {}", rest_addr);

    let served = api_rest::serve(
        listener,
        registry.clone(),
        shutdown.clone(),
        SHUTDOWN_GRACE_PERIOD,
    )
    .await;

    tracing::info!("Shutting down...");
    shutdown.cancel();
    if let Some(handle) = reconciler {
        if let Err(e) = handle.await {
            tracing::warn!("reconciler task ended abnormally: {}", e);
        }
    }
    registry.close().await;

    served?;
    tracing::info!("Shutdown successful! Bye.");
    Ok(())
}

/// Cancels `shutdown` on Ctrl-C, or SIGTERM on unix.
async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
    shutdown.cancel();
}
