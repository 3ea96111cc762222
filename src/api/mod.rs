//! Control API
//!
//! ## Endpoints
//!
//! - `GET /monitor?containerid=<id>` - Start a container (restart link in notifications)
//! - `GET /health` - Liveness and queue saturation
//! - `GET /stats` - Ingestion counters and alerted workloads

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{HealthResponse, RestartQuery, StatsResponse};

use std::net::SocketAddr;

use axum::{Router, routing::get};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the router with every route and layer.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/monitor", get(routes::monitor::restart_container))
        .route("/health", get(routes::health::health_check))
        .route("/stats", get(routes::stats::get_stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Spawn the API server
///
/// Binds `bind_addr`, serves in a background task until `shutdown` fires
/// and returns the bound address.
pub async fn spawn_api_server(
    bind_addr: SocketAddr,
    state: ApiState,
    shutdown: CancellationToken,
) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {bind_addr}");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {addr}");

    let app = router(state);
    tokio::spawn(async move {
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await });
        if let Err(e) = serve.await {
            error!("API server error: {e}");
        }
    });

    Ok(addr)
}
