//! Error types for the ingestion and aggregation paths.
//!
//! A zero-sample window is not an error: it is reported as
//! [`AggregateOutcome::Empty`](crate::aggregate::AggregateOutcome) instead.

use thiserror::Error;

use crate::window::Window;

// ---

/// Hard failure of one ingestion cycle.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read weather file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch weather document from '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode weather document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("timestamp {0} is not a valid local instant")]
    Timestamp(i64),

    #[error("failed to insert reading: {0}")]
    Insert(#[source] sqlx::Error),
}

/// Failure to compute or store one summary; always names the window.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("{window}: failed to acquire database connection: {source}")]
    Connect {
        window: Window,
        #[source]
        source: sqlx::Error,
    },

    #[error("{window}: failed to calculate statistics: {source}")]
    Query {
        window: Window,
        #[source]
        source: sqlx::Error,
    },

    #[error("{window}: failed to upsert summary: {source}")]
    Write {
        window: Window,
        #[source]
        source: sqlx::Error,
    },
}

impl AggregateError {
    pub fn window(&self) -> &Window {
        match self {
            AggregateError::Connect { window, .. }
            | AggregateError::Query { window, .. }
            | AggregateError::Write { window, .. } => window,
        }
    }
}
