//! Windowed roll-up of raw readings into the summary tables.
//!
//! One routine serves all four granularities. The per-granularity
//! differences (target table, natural key, whether extremes are kept) live in
//! [`SummaryTable`], and the statistics/upsert SQL is generated from it so the
//! granularities cannot drift apart.
//!
//! Averages are rounded by the store (`ROUND(AVG(..), 1)` over `NUMERIC`
//! columns), which keeps the half-away-from-zero rounding exact. Min/max are
//! stored values and already carry one decimal.

use serde::Serialize;
use sqlx::{postgres::PgRow, PgConnection, PgPool, Row};

use crate::error::AggregateError;
use crate::models::{MetricStats, WindowStats};
use crate::window::{Granularity, Window};

// ---

const METRICS: [&str; 3] = ["temperature", "pressure", "humidity"];

/// Shape of a summary table.
#[derive(Debug, Clone, Copy)]
pub struct SummaryTable {
    pub name: &'static str,
    /// Natural key; the conflict target of the upsert.
    pub key_columns: &'static [&'static str],
    /// Non-key columns describing the window itself.
    pub span_columns: &'static [&'static str],
    pub with_extremes: bool,
}

impl SummaryTable {
    pub fn for_granularity(granularity: Granularity) -> Self {
        // ---
        match granularity {
            Granularity::Hour => SummaryTable {
                name: "weather_hourly",
                key_columns: &["date", "hour"],
                span_columns: &[],
                with_extremes: false,
            },
            Granularity::Day => SummaryTable {
                name: "weather_daily",
                key_columns: &["date"],
                span_columns: &[],
                with_extremes: true,
            },
            Granularity::Week => SummaryTable {
                name: "weather_weekly",
                key_columns: &["year", "week"],
                span_columns: &["week_start", "week_end"],
                with_extremes: true,
            },
            Granularity::Month => SummaryTable {
                name: "weather_monthly",
                key_columns: &["year", "month"],
                span_columns: &[],
                with_extremes: true,
            },
        }
    }

    fn stat_columns(&self) -> Vec<String> {
        // ---
        let kinds: &[&str] = if self.with_extremes {
            &["avg", "min", "max"]
        } else {
            &["avg"]
        };
        METRICS
            .iter()
            .flat_map(|metric| kinds.iter().map(move |kind| format!("{kind}_{metric}")))
            .collect()
    }

    /// `SELECT` computing count and rounded statistics over `[$1, $2)`.
    pub fn stats_sql(&self) -> String {
        // ---
        let mut select = vec!["COUNT(*) AS samples_count".to_string()];
        for metric in METRICS {
            select.push(format!("ROUND(AVG({metric}), 1)::float8 AS avg_{metric}"));
            if self.with_extremes {
                select.push(format!("MIN({metric})::float8 AS min_{metric}"));
                select.push(format!("MAX({metric})::float8 AS max_{metric}"));
            }
        }

        format!(
            "SELECT {} FROM weather WHERE measured_at >= $1 AND measured_at < $2",
            select.join(", ")
        )
    }

    /// Insert-or-overwrite keyed on the natural key.
    ///
    /// Only columns listed here are touched on conflict, so anything else on
    /// the row (e.g. `weather_daily.sea_temperature`) survives recomputation.
    pub fn upsert_sql(&self) -> String {
        // ---
        let stats = self.stat_columns();
        let updated: Vec<&str> = self
            .span_columns
            .iter()
            .copied()
            .chain(stats.iter().map(String::as_str))
            .chain(std::iter::once("samples_count"))
            .collect();
        let columns: Vec<&str> = self
            .key_columns
            .iter()
            .copied()
            .chain(updated.iter().copied())
            .collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
        let assignments: Vec<String> = updated
            .iter()
            .map(|col| format!("{col} = EXCLUDED.{col}"))
            .chain(std::iter::once("updated_at = CURRENT_TIMESTAMP".to_string()))
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
            self.name,
            columns.join(", "),
            placeholders.join(", "),
            self.key_columns.join(", "),
            assignments.join(", ")
        )
    }
}

/// Result of a successful aggregation run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AggregateOutcome {
    /// Summary row inserted or overwritten.
    Written { window: Window, stats: WindowStats },
    /// No readings in the window; nothing was written.
    Empty { window: Window },
}

impl AggregateOutcome {
    pub fn window(&self) -> &Window {
        match self {
            AggregateOutcome::Written { window, .. } | AggregateOutcome::Empty { window } => window,
        }
    }
}

/// Compute the statistics of `window` and upsert its summary row.
///
/// Holds one pooled connection for the duration of the call.
pub async fn aggregate(pool: &PgPool, window: Window) -> Result<AggregateOutcome, AggregateError> {
    // ---
    let mut conn = pool
        .acquire()
        .await
        .map_err(|source| AggregateError::Connect { window, source })?;

    let table = SummaryTable::for_granularity(window.granularity());

    let Some(stats) = window_stats(&mut conn, &table, &window)
        .await
        .map_err(|source| AggregateError::Query { window, source })?
    else {
        tracing::info!(%window, "No samples found, skipping");
        return Ok(AggregateOutcome::Empty { window });
    };

    upsert_summary(&mut conn, &table, &window, &stats)
        .await
        .map_err(|source| AggregateError::Write { window, source })?;

    tracing::info!(
        %window,
        samples = stats.samples_count,
        avg_temperature = stats.temperature.avg,
        "Summary updated"
    );
    Ok(AggregateOutcome::Written { window, stats })
}

/// `None` when the window holds no readings.
async fn window_stats(
    conn: &mut PgConnection,
    table: &SummaryTable,
    window: &Window,
) -> Result<Option<WindowStats>, sqlx::Error> {
    // ---
    let (start, end) = window.bounds();
    let sql = table.stats_sql();
    tracing::debug!(%window, %start, %end, "Calculating statistics");

    let row = sqlx::query(&sql)
        .bind(start)
        .bind(end)
        .fetch_one(&mut *conn)
        .await?;

    let samples_count: i64 = row.try_get("samples_count")?;
    if samples_count == 0 {
        return Ok(None);
    }

    Ok(Some(WindowStats {
        samples_count,
        temperature: metric_stats(&row, "temperature", table.with_extremes)?,
        pressure: metric_stats(&row, "pressure", table.with_extremes)?,
        humidity: metric_stats(&row, "humidity", table.with_extremes)?,
    }))
}

fn metric_stats(row: &PgRow, metric: &str, with_extremes: bool) -> Result<MetricStats, sqlx::Error> {
    // ---
    let avg: f64 = row.try_get(format!("avg_{metric}").as_str())?;
    let (min, max) = if with_extremes {
        (
            Some(row.try_get::<f64, _>(format!("min_{metric}").as_str())?),
            Some(row.try_get::<f64, _>(format!("max_{metric}").as_str())?),
        )
    } else {
        (None, None)
    };
    Ok(MetricStats { avg, min, max })
}

async fn upsert_summary(
    conn: &mut PgConnection,
    table: &SummaryTable,
    window: &Window,
    stats: &WindowStats,
) -> Result<(), sqlx::Error> {
    // ---
    let sql = table.upsert_sql();
    let mut query = sqlx::query(&sql);

    // Bind order follows upsert_sql: key columns, span columns, stats, count.
    query = match *window {
        Window::Hour { date, hour } => query.bind(date).bind(hour as i16),
        Window::Day { date } => query.bind(date),
        Window::Week {
            year,
            week,
            start,
            end,
        } => query.bind(year).bind(week as i16).bind(start).bind(end),
        Window::Month { year, month, .. } => query.bind(year).bind(month as i16),
    };

    for (_, metric) in stats.metrics() {
        query = query.bind(metric.avg);
        if table.with_extremes {
            query = query.bind(metric.min).bind(metric.max);
        }
    }

    query
        .bind(samples_count_param(stats.samples_count)?)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// `samples_count` is an `INTEGER` column; a larger count is a write error.
fn samples_count_param(count: i64) -> Result<i32, sqlx::Error> {
    i32::try_from(count).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

/// Run [`aggregate`] for the window `granularity` covers at `now`.
pub async fn aggregate_at(
    pool: &PgPool,
    granularity: Granularity,
    now: chrono::NaiveDateTime,
) -> Result<AggregateOutcome, AggregateError> {
    aggregate(pool, granularity.window_for(now)).await
}
