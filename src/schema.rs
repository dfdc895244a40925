//! Database schema management for `weather-rollup`.
//!
//! Ensures the raw `weather` table and the four summary tables exist before
//! the scheduler starts. Applied once on startup from `main.rs`.
//!
//! Metric columns are `NUMERIC(12,1)`: values are stored already rounded to
//! one decimal and averages are computed in exact decimal arithmetic.

use anyhow::Result;
use sqlx::PgPool;

// ---

const SCHEMA_LOCK_KEY: i64 = 0x5745_4154_4845_52; // "WEATHER"

/// Width of every metric column.
pub const METRIC_TYPE: &str = "NUMERIC(12,1)";

const TABLES: &[&str] = &[
    "weather",
    "weather_hourly",
    "weather_daily",
    "weather_weekly",
    "weather_monthly",
];

const STATEMENTS: &[&str] = &[
    // Append-only raw readings
    r#"
    CREATE TABLE IF NOT EXISTS weather (
        id           BIGSERIAL     PRIMARY KEY,
        measured_at  TIMESTAMP     NOT NULL,
        temperature  NUMERIC(12,1) NOT NULL,
        pressure     NUMERIC(12,1) NOT NULL,
        humidity     NUMERIC(12,1) NOT NULL,
        created_at   TIMESTAMP     NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_weather_measured_at
        ON weather (measured_at);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS weather_hourly (
        date             DATE          NOT NULL,
        hour             SMALLINT      NOT NULL,
        avg_temperature  NUMERIC(12,1) NOT NULL,
        avg_pressure     NUMERIC(12,1) NOT NULL,
        avg_humidity     NUMERIC(12,1) NOT NULL,
        samples_count    INTEGER       NOT NULL,
        updated_at       TIMESTAMP     NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (date, hour)
    );
    "#,
    // sea_temperature is maintained outside this service
    r#"
    CREATE TABLE IF NOT EXISTS weather_daily (
        date             DATE          NOT NULL UNIQUE,
        avg_temperature  NUMERIC(12,1) NOT NULL,
        min_temperature  NUMERIC(12,1) NOT NULL,
        max_temperature  NUMERIC(12,1) NOT NULL,
        avg_pressure     NUMERIC(12,1) NOT NULL,
        min_pressure     NUMERIC(12,1) NOT NULL,
        max_pressure     NUMERIC(12,1) NOT NULL,
        avg_humidity     NUMERIC(12,1) NOT NULL,
        min_humidity     NUMERIC(12,1) NOT NULL,
        max_humidity     NUMERIC(12,1) NOT NULL,
        samples_count    INTEGER       NOT NULL,
        sea_temperature  NUMERIC(4,1),
        updated_at       TIMESTAMP     NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS weather_weekly (
        year             INTEGER       NOT NULL,
        week             SMALLINT      NOT NULL,
        week_start       DATE          NOT NULL,
        week_end         DATE          NOT NULL,
        avg_temperature  NUMERIC(12,1) NOT NULL,
        min_temperature  NUMERIC(12,1) NOT NULL,
        max_temperature  NUMERIC(12,1) NOT NULL,
        avg_pressure     NUMERIC(12,1) NOT NULL,
        min_pressure     NUMERIC(12,1) NOT NULL,
        max_pressure     NUMERIC(12,1) NOT NULL,
        avg_humidity     NUMERIC(12,1) NOT NULL,
        min_humidity     NUMERIC(12,1) NOT NULL,
        max_humidity     NUMERIC(12,1) NOT NULL,
        samples_count    INTEGER       NOT NULL,
        updated_at       TIMESTAMP     NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (year, week)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS weather_monthly (
        year             INTEGER       NOT NULL,
        month            SMALLINT      NOT NULL,
        avg_temperature  NUMERIC(12,1) NOT NULL,
        min_temperature  NUMERIC(12,1) NOT NULL,
        max_temperature  NUMERIC(12,1) NOT NULL,
        avg_pressure     NUMERIC(12,1) NOT NULL,
        min_pressure     NUMERIC(12,1) NOT NULL,
        max_pressure     NUMERIC(12,1) NOT NULL,
        avg_humidity     NUMERIC(12,1) NOT NULL,
        min_humidity     NUMERIC(12,1) NOT NULL,
        max_humidity     NUMERIC(12,1) NOT NULL,
        samples_count    INTEGER       NOT NULL,
        updated_at       TIMESTAMP     NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (year, month)
    );
    "#,
];

/// Create the schema if it does not exist (idempotent).
///
/// Safe to call on every startup; no-op if objects already exist.
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Concurrent CREATE ... IF NOT EXISTS can still collide in pg_type.
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    for statement in STATEMENTS {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    // Tables created with narrower metric columns are widened in place.
    let narrow: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT table_name::text, column_name::text
        FROM information_schema.columns
        WHERE table_schema = current_schema()
          AND table_name = ANY($1)
          AND data_type = 'numeric'
          AND numeric_precision < 12
          AND column_name <> 'sea_temperature'
        "#,
    )
    .bind(TABLES)
    .fetch_all(&mut *tx)
    .await?;

    for (table, column) in narrow {
        tracing::info!(%table, %column, "Widening metric column to {}", METRIC_TYPE);
        sqlx::query(&format!(
            "ALTER TABLE {table} ALTER COLUMN {column} TYPE {METRIC_TYPE}"
        ))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
