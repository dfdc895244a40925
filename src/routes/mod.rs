//! HTTP gateway (EMBP): merges the per-file subrouters and attaches state.

use axum::{http::StatusCode, response::IntoResponse, Json, Router};
use serde_json::json;
use sqlx::PgPool;

use crate::Config;

mod health;
mod jobs;

// ---

pub fn router(pool: PgPool, config: Config) -> Router {
    // ---
    Router::new()
        .merge(jobs::router())
        .merge(health::router())
        .fallback(not_found)
        .with_state((pool, config))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}
