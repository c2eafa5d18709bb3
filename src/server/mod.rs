//! HTTP surface for the planner UI.
//!
//! Routes:
//! - `GET /health`
//! - `GET|POST /api/counters` (also `/api/likes`)
//! - `GET|POST /api/annotations` (also `/api/custom-details`)
//! - `GET /api/summary`

mod routes;
mod state;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::error::Result;

pub use self::routes::{AnnotationPayload, ApiError, CounterAction, CounterUpdate, CountersQuery};
pub use self::state::AppContext;

use self::routes::{
    handle_get_counters, handle_health, handle_list_annotations, handle_post_annotation, handle_post_counters,
    handle_summary,
};

/// Build the router over a shared context.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let counters = get(handle_get_counters).post(handle_post_counters);
    let annotations = get(handle_list_annotations).post(handle_post_annotation);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/counters", counters.clone())
        .route("/api/likes", counters)
        .route("/api/annotations", annotations.clone())
        .route("/api/custom-details", annotations)
        .route("/api/summary", get(handle_summary))
        .layer(CompressionLayer::new())
        .with_state(ctx)
}

/// Bind `addr` and serve until Ctrl-C or SIGTERM.
pub async fn serve(ctx: Arc<AppContext>, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, backend = %ctx.backend(), "Listening");
    serve_on(listener, ctx, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve_on<F>(listener: TcpListener, ctx: Arc<AppContext>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(ctx)).with_graceful_shutdown(shutdown).await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, finishing in-flight requests");
}
