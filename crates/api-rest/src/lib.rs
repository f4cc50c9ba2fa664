//! # API REST
//!
//! REST API implementation for Stash.
//!
//! Handles:
//! - HTTP endpoints with axum (`/upload`, `/files`, `/files/:id`)
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (multipart parsing, JSON envelopes, CORS, request tracing)
//! - Serving with a bounded graceful-shutdown window
//!
//! All file semantics live in `stash-core`; handlers only translate registry results into
//! status codes.

#![warn(rust_2018_idioms)]

mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::{HealthRes, JsonResponse, UploadReq};
use stash_core::Registry;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across REST API handlers
#[derive(Clone)]
struct AppState {
    registry: Registry,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::upload_file,
        handlers::list_files,
        handlers::get_file,
        handlers::delete_file,
    ),
    components(schemas(HealthRes, JsonResponse, UploadReq))
)]
struct ApiDoc;

/// Builds the REST router around `registry`.
///
/// Request bodies are capped at the configured maximum file size plus multipart overhead;
/// anything larger is rejected while the form is being read.
pub fn router(registry: Registry) -> Router {
    let body_limit = usize::try_from(registry.config().max_file_size())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(handlers::usage))
        .route("/health", get(handlers::health))
        .route("/upload", post(handlers::upload_file))
        .route("/files", get(handlers::list_files))
        .route(
            "/files/:id",
            get(handlers::get_file).delete(handlers::delete_file),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { registry })
}

/// Serves the REST API until `shutdown` is cancelled.
///
/// After cancellation the server stops accepting connections and gets `grace` to finish
/// in-flight requests; once that runs out the remaining connections are dropped and this
/// returns anyway.
///
/// # Errors
/// Returns an error if the HTTP server fails while running.
pub async fn serve(
    listener: TcpListener,
    registry: Registry,
    shutdown: CancellationToken,
    grace: Duration,
) -> anyhow::Result<()> {
    let app = router(registry);
    let drain = shutdown.clone();

    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { drain.cancelled().await })
            .await
    });

    tokio::select! {
        result = &mut server => return Ok(result??),
        () = shutdown.cancelled() => {}
    }

    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => result??,
        Err(_) => {
            tracing::warn!("server shut down forcefully after {:?}", grace);
            server.abort();
        }
    }

    Ok(())
}
