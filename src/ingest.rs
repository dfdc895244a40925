//! Ingestion step: load the latest reading, store it, refresh its hour.
//!
//! The raw insert is the durable part. The hourly roll-up that follows is a
//! second, observable step whose failure is reported in [`IngestReport`]
//! rather than failing the ingestion.

use serde::Serialize;
use sqlx::PgPool;

use crate::aggregate::{self, AggregateOutcome};
use crate::error::{AggregateError, IngestError};
use crate::models::{RawWeatherReading, Reading};
use crate::window::Window;

// ---

/// Outcome of one successful ingestion cycle.
#[derive(Debug)]
pub struct IngestReport {
    pub id: i64,
    pub reading: Reading,
    pub hourly: Result<AggregateOutcome, AggregateError>,
}

/// Serializable view of [`IngestReport`] for the HTTP surface.
#[derive(Debug, Serialize)]
pub struct IngestSummary<'a> {
    pub id: i64,
    pub reading: &'a Reading,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly: Option<&'a AggregateOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_error: Option<String>,
}

impl IngestReport {
    pub fn summary(&self) -> IngestSummary<'_> {
        // ---
        IngestSummary {
            id: self.id,
            reading: &self.reading,
            hourly: self.hourly.as_ref().ok(),
            hourly_error: self.hourly.as_ref().err().map(ToString::to_string),
        }
    }
}

/// Fetch the weather document from a file path or an `http(s)://` URL.
pub async fn load_document(source: &str) -> Result<Vec<u8>, IngestError> {
    // ---
    if source.starts_with("http://") || source.starts_with("https://") {
        tracing::debug!(url = source, "Fetching weather document");
        let fetch_err = |source_err| IngestError::Fetch {
            url: source.to_string(),
            source: source_err,
        };
        let response = reqwest::get(source)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_err)?;
        let body = response.bytes().await.map_err(fetch_err)?;
        return Ok(body.to_vec());
    }

    tracing::debug!(path = source, "Reading weather file");
    tokio::fs::read(source).await.map_err(|e| IngestError::Read {
        path: source.to_string(),
        source: e,
    })
}

/// Append one reading to the `weather` table and return its id.
pub async fn store_reading(pool: &PgPool, reading: &Reading) -> Result<i64, IngestError> {
    // ---
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO weather (measured_at, temperature, pressure, humidity)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(reading.measured_at)
    .bind(reading.temperature)
    .bind(reading.pressure)
    .bind(reading.humidity)
    .fetch_one(pool)
    .await
    .map_err(IngestError::Insert)?;

    Ok(id)
}

/// Store `reading`, then recompute the summary of the hour containing it.
pub async fn ingest_reading(pool: &PgPool, reading: Reading) -> Result<IngestReport, IngestError> {
    // ---
    let id = store_reading(pool, &reading).await?;
    tracing::info!(id, measured_at = %reading.measured_at, "Data inserted successfully");

    let hourly = aggregate::aggregate(pool, Window::hour_of(reading.measured_at)).await;
    if let Err(e) = &hourly {
        tracing::warn!(id, "Failed to update hourly averages: {}", e);
    }

    Ok(IngestReport {
        id,
        reading,
        hourly,
    })
}

/// Full ingestion cycle: load, decode, round, store, hourly roll-up.
pub async fn run(pool: &PgPool, source: &str) -> Result<IngestReport, IngestError> {
    // ---
    let bytes = load_document(source).await?;
    let reading = RawWeatherReading::from_json(&bytes)?.to_reading()?;
    ingest_reading(pool, reading).await
}
