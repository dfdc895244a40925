//! Weather reading ingestion and time-windowed roll-ups.
//!
//! Module layout (leaf to root):
//! - `window`    – pure window boundary calculation per granularity
//! - `models`    – input decoding, rounding, statistics types
//! - `aggregate` – windowed statistics and idempotent summary upserts
//! - `ingest`    – single-reading ingestion with hourly cascade
//! - `scheduler` – recurring cron triggers
//! - `routes`    – HTTP health check and manual triggers
//!
//! `main.rs` only wires these together (EMBP: each module exposes one gateway).

pub mod aggregate;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod schema;
pub mod window;

pub use aggregate::AggregateOutcome;
pub use config::Config;
pub use error::{AggregateError, IngestError};
pub use models::{RawWeatherReading, Reading, WindowStats};
pub use window::{Granularity, Window};
