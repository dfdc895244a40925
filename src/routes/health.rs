// src/routes/health.rs
//! Health check endpoint for the weather roll-up service.
//!
//! `GET /health` answers as long as the process is up, and additionally
//! reports whether the store is reachable so an orchestrator can tell a
//! stalled pipeline from a dead one. Follows the Explicit Module Boundary
//! Pattern (EMBP): only the subrouter is exported to the gateway (`mod.rs`).

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;

use crate::Config;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}

/// Handle `GET /health`.
///
/// Returns 200 when a pooled connection can run `SELECT 1`, 503 otherwise.
async fn health(State((pool, _)): State<(PgPool, Config)>) -> (StatusCode, Json<HealthResponse>) {
    // ---
    match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: "up",
            }),
        ),
        Err(e) => {
            tracing::warn!("Health check could not reach database: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    database: "down",
                }),
            )
        }
    }
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<(PgPool, Config)> {
    Router::new().route("/health", get(health))
}
