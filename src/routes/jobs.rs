//! Manual triggers for the ingestion step and the roll-ups.
//!
//! - `POST /ingest` runs one ingestion cycle now.
//! - `POST /aggregate/{granularity}` recomputes the window the scheduled
//!   trigger for that granularity would cover right now. Only the fixed
//!   current/previous windows are reachable; there is no arbitrary range.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Local;
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, info};

use crate::aggregate;
use crate::ingest;
use crate::window::Granularity;
use crate::Config;

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new()
        .route("/ingest", post(ingest_handler))
        .route("/aggregate/{granularity}", post(aggregate_handler))
}

async fn ingest_handler(State((pool, config)): State<(PgPool, Config)>) -> impl IntoResponse {
    // ---
    info!("POST /ingest - Manual ingestion");

    match ingest::run(&pool, &config.weather_source).await {
        Ok(report) => (StatusCode::OK, Json(report.summary())).into_response(),
        Err(e) => {
            error!("Manual ingestion failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn aggregate_handler(
    Path(granularity): Path<String>,
    State((pool, _)): State<(PgPool, Config)>,
) -> impl IntoResponse {
    // ---
    let granularity = match granularity.parse::<Granularity>() {
        Ok(g) => g,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
        }
    };
    info!("POST /aggregate/{} - Manual aggregation", granularity);

    let now = Local::now().naive_local();
    match aggregate::aggregate_at(&pool, granularity, now).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => {
            error!("Manual aggregation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string(), "window": e.window() })),
            )
                .into_response()
        }
    }
}
