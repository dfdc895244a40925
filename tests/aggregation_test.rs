//! Roll-up behaviour against a live PostgreSQL.
//!
//! Set `DATABASE_URL` to run these; without it every test returns early.
//! Each test owns a distinct window in the early 1990s and clears it first,
//! so the suite can run in parallel and be re-run against the same database.

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use weather_rollup::{
    aggregate::{self, AggregateOutcome},
    ingest,
    models::round_tenth,
    schema, Granularity, RawWeatherReading, Reading, Window,
};

// ---

async fn test_pool() -> Result<Option<PgPool>> {
    // ---
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return Ok(None);
    };
    let pool = PgPoolOptions::new().max_connections(2).connect(&url).await?;
    schema::create_schema(&pool).await?;
    Ok(Some(pool))
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn reading(measured_at: NaiveDateTime, temperature: f64, pressure: f64, humidity: f64) -> Reading {
    Reading {
        measured_at,
        temperature: round_tenth(temperature),
        pressure: round_tenth(pressure),
        humidity: round_tenth(humidity),
    }
}

/// Remove raw readings in the window and its summary row.
async fn reset(pool: &PgPool, window: &Window) -> Result<()> {
    // ---
    let (start, end) = window.bounds();
    sqlx::query("DELETE FROM weather WHERE measured_at >= $1 AND measured_at < $2")
        .bind(start)
        .bind(end)
        .execute(pool)
        .await?;

    match *window {
        Window::Hour { date, hour } => {
            sqlx::query("DELETE FROM weather_hourly WHERE date = $1 AND hour = $2")
                .bind(date)
                .bind(hour as i16)
                .execute(pool)
                .await?;
        }
        Window::Day { date } => {
            sqlx::query("DELETE FROM weather_daily WHERE date = $1")
                .bind(date)
                .execute(pool)
                .await?;
        }
        Window::Week { year, week, .. } => {
            sqlx::query("DELETE FROM weather_weekly WHERE year = $1 AND week = $2")
                .bind(year)
                .bind(week as i16)
                .execute(pool)
                .await?;
        }
        Window::Month { year, month, .. } => {
            sqlx::query("DELETE FROM weather_monthly WHERE year = $1 AND month = $2")
                .bind(year)
                .bind(month as i16)
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

async fn daily_row(pool: &PgPool, date: NaiveDate) -> Result<Option<(Vec<f64>, i32, Option<f64>)>> {
    // ---
    let row = sqlx::query(
        r#"
        SELECT avg_temperature::float8, min_temperature::float8, max_temperature::float8,
               avg_pressure::float8, min_pressure::float8, max_pressure::float8,
               avg_humidity::float8, min_humidity::float8, max_humidity::float8,
               samples_count, sea_temperature::float8
        FROM weather_daily WHERE date = $1
        "#,
    )
    .bind(date)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else { return Ok(None) };
    let stats = (0..9)
        .map(|i| row.try_get::<f64, _>(i))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some((stats, row.try_get(9)?, row.try_get(10)?)))
}

#[tokio::test]
async fn hourly_average_is_rounded_after_averaging() -> Result<()> {
    // ---
    let Some(pool) = test_pool().await? else { return Ok(()) };
    let window = Window::hour_of(at(1991, 3, 4, 10, 0));
    reset(&pool, &window).await?;

    // Stored as 10.0 and 10.1; their mean 10.05 rounds to 10.1.
    for (minute, temp) in [(5, 10.04), (35, 10.06)] {
        let report = ingest::ingest_reading(&pool, reading(at(1991, 3, 4, 10, minute), temp, 1013.0, 60.0)).await?;
        assert!(report.hourly.is_ok(), "hourly cascade failed: {:?}", report.hourly);
    }

    let row = sqlx::query(
        "SELECT avg_temperature::float8 AS t, avg_pressure::float8 AS p, samples_count \
         FROM weather_hourly WHERE date = $1 AND hour = $2",
    )
    .bind(NaiveDate::from_ymd_opt(1991, 3, 4).unwrap())
    .bind(10i16)
    .fetch_one(&pool)
    .await?;

    assert_eq!(row.try_get::<f64, _>("t")?, 10.1);
    assert_eq!(row.try_get::<f64, _>("p")?, 1013.0);
    assert_eq!(row.try_get::<i32, _>("samples_count")?, 2);
    Ok(())
}

#[tokio::test]
async fn pressure_in_pascal_is_stored() -> Result<()> {
    // ---
    let Some(pool) = test_pool().await? else { return Ok(()) };
    let raw = RawWeatherReading::from_json(
        br#"{"timestamp": 700000000, "temperature": 21.3, "pressure": 101325.0, "humidity": 60}"#,
    )?;
    let reading = raw.to_reading()?;
    let window = Window::hour_of(reading.measured_at);
    reset(&pool, &window).await?;

    let report = ingest::ingest_reading(&pool, reading).await?;

    let stored: f64 = sqlx::query_scalar("SELECT pressure::float8 FROM weather WHERE id = $1")
        .bind(report.id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(stored, 101325.0);

    match report.hourly {
        Ok(AggregateOutcome::Written { stats, .. }) => assert_eq!(stats.pressure.avg, 101325.0),
        other => panic!("expected a written hourly summary, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn hourly_outcome_has_no_extremes() -> Result<()> {
    // ---
    let Some(pool) = test_pool().await? else { return Ok(()) };
    let window = Window::hour_of(at(1991, 3, 5, 23, 0));
    reset(&pool, &window).await?;

    ingest::store_reading(&pool, &reading(at(1991, 3, 5, 23, 59), -2.0, 990.5, 88.0)).await?;
    // Belongs to the next hour.
    ingest::store_reading(&pool, &reading(at(1991, 3, 6, 0, 0), 40.0, 990.5, 88.0)).await?;

    match aggregate::aggregate(&pool, window).await? {
        AggregateOutcome::Written { stats, .. } => {
            assert_eq!(stats.samples_count, 1);
            assert_eq!(stats.temperature.avg, -2.0);
            assert_eq!(stats.temperature.min, None);
            assert_eq!(stats.humidity.max, None);
        }
        other => panic!("expected a written summary, got {:?}", other),
    }

    reset(&pool, &Window::hour_of(at(1991, 3, 6, 0, 0))).await?;
    Ok(())
}

#[tokio::test]
async fn recomputing_a_window_is_idempotent() -> Result<()> {
    // ---
    let Some(pool) = test_pool().await? else { return Ok(()) };
    let window = Window::yesterday(NaiveDate::from_ymd_opt(1991, 4, 11).unwrap());
    reset(&pool, &window).await?;

    for (h, t, p, hum) in [(1, 12.3, 1010.1, 70.0), (9, 18.7, 1011.4, 55.2), (15, 21.2, 1009.9, 48.8)] {
        ingest::store_reading(&pool, &reading(at(1991, 4, 10, h, 0), t, p, hum)).await?;
    }

    let first = aggregate::aggregate(&pool, window).await?;
    let row_first = daily_row(&pool, NaiveDate::from_ymd_opt(1991, 4, 10).unwrap()).await?;
    let second = aggregate::aggregate(&pool, window).await?;
    let row_second = daily_row(&pool, NaiveDate::from_ymd_opt(1991, 4, 10).unwrap()).await?;

    let (AggregateOutcome::Written { stats: a, .. }, AggregateOutcome::Written { stats: b, .. }) = (&first, &second) else {
        panic!("expected written summaries, got {:?} / {:?}", first, second);
    };
    assert_eq!(a, b);
    assert_eq!(row_first, row_second);

    let (stats, samples, _) = row_first.expect("daily row");
    assert_eq!(samples, 3);
    // avg 17.4, min 12.3, max 21.2 for temperature
    assert_eq!(&stats[0..3], &[17.4, 12.3, 21.2]);
    Ok(())
}

#[tokio::test]
async fn empty_window_writes_nothing() -> Result<()> {
    // ---
    let Some(pool) = test_pool().await? else { return Ok(()) };
    let window = Window::yesterday(NaiveDate::from_ymd_opt(1991, 5, 21).unwrap());
    reset(&pool, &window).await?;

    let outcome = aggregate::aggregate(&pool, window).await?;
    assert!(matches!(outcome, AggregateOutcome::Empty { .. }));
    assert_eq!(outcome.window(), &window);
    assert!(daily_row(&pool, NaiveDate::from_ymd_opt(1991, 5, 20).unwrap()).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn daily_recompute_keeps_sea_temperature() -> Result<()> {
    // ---
    let Some(pool) = test_pool().await? else { return Ok(()) };
    let date = NaiveDate::from_ymd_opt(1991, 6, 15).unwrap();
    let window = Window::Day { date };
    reset(&pool, &window).await?;

    ingest::store_reading(&pool, &reading(at(1991, 6, 15, 8, 0), 22.0, 1015.0, 65.0)).await?;
    aggregate::aggregate(&pool, window).await?;

    sqlx::query("UPDATE weather_daily SET sea_temperature = 19.5 WHERE date = $1")
        .bind(date)
        .execute(&pool)
        .await?;

    // Late reading within the same day, then recompute.
    ingest::store_reading(&pool, &reading(at(1991, 6, 15, 20, 0), 24.0, 1014.0, 70.0)).await?;
    aggregate::aggregate(&pool, window).await?;

    let (stats, samples, sea) = daily_row(&pool, date).await?.expect("daily row");
    assert_eq!(samples, 2);
    assert_eq!(stats[0], 23.0);
    assert_eq!(sea, Some(19.5));
    Ok(())
}

#[tokio::test]
async fn weekly_window_from_sunday_covers_previous_iso_week() -> Result<()> {
    // ---
    let Some(pool) = test_pool().await? else { return Ok(()) };
    let window = Granularity::Week.window_for(at(1991, 7, 21, 0, 10));
    assert_eq!(
        window,
        Window::Week {
            year: 1991,
            week: 28,
            start: NaiveDate::from_ymd_opt(1991, 7, 8).unwrap(),
            end: NaiveDate::from_ymd_opt(1991, 7, 14).unwrap(),
        }
    );
    reset(&pool, &window).await?;
    reset(&pool, &Window::Day { date: NaiveDate::from_ymd_opt(1991, 7, 15).unwrap() }).await?;

    ingest::store_reading(&pool, &reading(at(1991, 7, 8, 0, 0), 15.0, 1000.0, 40.0)).await?;
    ingest::store_reading(&pool, &reading(at(1991, 7, 14, 23, 55), 25.0, 1020.0, 60.0)).await?;
    ingest::store_reading(&pool, &reading(at(1991, 7, 15, 0, 0), 99.0, 1099.0, 99.0)).await?;

    aggregate::aggregate(&pool, window).await?;

    let row = sqlx::query(
        "SELECT week_start, week_end, min_temperature::float8 AS lo, max_temperature::float8 AS hi, samples_count \
         FROM weather_weekly WHERE year = 1991 AND week = 28",
    )
    .fetch_one(&pool)
    .await?;

    assert_eq!(row.try_get::<NaiveDate, _>("week_start")?, NaiveDate::from_ymd_opt(1991, 7, 8).unwrap());
    assert_eq!(row.try_get::<NaiveDate, _>("week_end")?, NaiveDate::from_ymd_opt(1991, 7, 14).unwrap());
    assert_eq!(row.try_get::<f64, _>("lo")?, 15.0);
    assert_eq!(row.try_get::<f64, _>("hi")?, 25.0);
    assert_eq!(row.try_get::<i32, _>("samples_count")?, 2);

    reset(&pool, &Window::Day { date: NaiveDate::from_ymd_opt(1991, 7, 15).unwrap() }).await?;
    Ok(())
}

#[tokio::test]
async fn monthly_window_covers_leap_february() -> Result<()> {
    // ---
    let Some(pool) = test_pool().await? else { return Ok(()) };
    let window = Granularity::Month.window_for(at(1992, 3, 1, 0, 15));
    reset(&pool, &window).await?;
    reset(&pool, &Window::Day { date: NaiveDate::from_ymd_opt(1992, 3, 1).unwrap() }).await?;

    ingest::store_reading(&pool, &reading(at(1992, 2, 29, 23, 59), 8.25, 1001.0, 77.0)).await?;
    ingest::store_reading(&pool, &reading(at(1992, 3, 1, 0, 0), 30.0, 1001.0, 77.0)).await?;

    let outcome = aggregate::aggregate(&pool, window).await?;
    let AggregateOutcome::Written { stats, .. } = outcome else {
        panic!("expected a written summary, got {:?}", outcome);
    };
    assert_eq!(stats.samples_count, 1);
    assert_eq!(stats.temperature.avg, 8.3);

    let samples: i32 = sqlx::query_scalar("SELECT samples_count FROM weather_monthly WHERE year = 1992 AND month = 2")
        .fetch_one(&pool)
        .await?;
    assert_eq!(samples, 1);

    reset(&pool, &Window::Day { date: NaiveDate::from_ymd_opt(1992, 3, 1).unwrap() }).await?;
    Ok(())
}
