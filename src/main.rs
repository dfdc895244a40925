//! Application entry point for the `weather-rollup` service.
//!
//! This binary orchestrates the full startup sequence:
//! - Initializing structured logging/tracing
//! - Loading configuration from environment variables or `.env`
//! - Establishing a PostgreSQL connection pool
//! - Creating the database schema if it does not exist
//! - Running one ingestion immediately (unless `INGEST_ON_STARTUP=false`)
//! - Starting the recurring ingestion and roll-up triggers
//! - Binding the Axum HTTP server for health checks and manual triggers
//!
//! # Environment Variables
//! - `DATABASE_URL` or `DB_USER`/`DB_PASSWORD`/`DB_HOST`/`DB_PORT`/`DB_NAME`
//! - `WEATHER_SOURCE`, `*_SCHEDULE`, `LISTEN_ADDR` – see [`config`]
//! - `LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `LOG_SPAN_EVENTS` (optional) – span event mode for tracing
use std::env;

use is_terminal::IsTerminal;

use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

use weather_rollup::{config, routes, scheduler, schema};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    tracing::info!("Weather data processor started");

    match dotenv() {
        Ok(_) => tracing::info!("Loaded configuration from .env file"),
        Err(_) => tracing::info!("No .env file found, using environment variables from system"),
    }

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let masked_db = cfg.db.masked();
    tracing::info!("Attempting to connect to database: {}", masked_db);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect_with(cfg.db.connect_options()?)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database '{}': {}", masked_db, e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    if cfg.ingest_on_startup {
        scheduler::run_job(&pool, &cfg.weather_source, scheduler::Job::Ingest).await;
    }

    let _triggers = scheduler::spawn_all(pool.clone(), &cfg);
    tracing::info!("Scheduler started");

    let addr = cfg.listen_addr;
    let app: Router = routes::router(pool, cfg);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `LOG_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, falling back to `LOG_LEVEL`
///
/// Call once at startup before any logging macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("LOG_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
