//! HTTP routes.

use std::path::Path;

use axum::extract::State;
use axum::routing::get;
use axum::{middleware, Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::core::store::Identity;
use crate::server::auth::require_operator;
use crate::server::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Liveness check. Never requires authentication.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// The authenticated operator.
pub async fn me(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub workers: usize,
    pub started_at: DateTime<Utc>,
    pub operator: String,
}

/// Server status for the authenticated operator.
pub async fn status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        workers: state.workers,
        started_at: state.started_at,
        operator: identity.username,
    })
}

/// Build the application router.
///
/// Everything except `/health` sits behind [`require_operator`].
pub fn create_router(state: AppState, static_root: &Path) -> Router {
    let protected = Router::new()
        .route("/api/me", get(me))
        .route("/api/status", get(status))
        .nest_service("/static", ServeDir::new(static_root))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_operator,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
