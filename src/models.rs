//! Simple data models for the weather pipeline.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

// ---

/// Single reading as published in the source JSON document.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWeatherReading {
    // ---
    /// Epoch seconds.
    pub timestamp: i64,
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
}

/// Reading ready for the `weather` table: local wall-clock time and metrics
/// rounded to one decimal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    // ---
    pub measured_at: NaiveDateTime,
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
}

/// Round half away from zero to one decimal place.
///
/// Works on the shortest decimal form of `value`, so `1.15` rounds to `1.2`
/// even though its binary value sits just below the half.
pub fn round_tenth(value: f64) -> f64 {
    // ---
    if !value.is_finite() {
        return value;
    }
    let digits = value.abs().to_string();
    let Some((whole, frac)) = digits.split_once('.') else {
        return value;
    };

    let mut frac = frac.bytes();
    let tenth = frac.next().map_or(0, |b| b - b'0');
    let round_up = frac.next().is_some_and(|b| b >= b'5');

    let Ok(tenths) = format!("{whole}{tenth}").parse::<f64>() else {
        return value;
    };
    let rounded = (tenths + if round_up { 1.0 } else { 0.0 }) / 10.0;
    rounded.copysign(value)
}

impl RawWeatherReading {
    // ---
    pub fn from_json(bytes: &[u8]) -> Result<Self, IngestError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_reading(&self) -> Result<Reading, IngestError> {
        // ---
        let measured_at = DateTime::from_timestamp(self.timestamp, 0)
            .ok_or(IngestError::Timestamp(self.timestamp))?
            .with_timezone(&Local)
            .naive_local();

        Ok(Reading {
            measured_at,
            temperature: round_tenth(self.temperature),
            pressure: round_tenth(self.pressure),
            humidity: round_tenth(self.humidity),
        })
    }
}

/// Average, and optionally extremes, of one metric over a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricStats {
    pub avg: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Statistics of a non-empty window, already rounded to one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStats {
    pub samples_count: i64,
    pub temperature: MetricStats,
    pub pressure: MetricStats,
    pub humidity: MetricStats,
}

impl WindowStats {
    pub fn metrics(&self) -> [(&'static str, &MetricStats); 3] {
        [
            ("temperature", &self.temperature),
            ("pressure", &self.pressure),
            ("humidity", &self.humidity),
        ]
    }
}
