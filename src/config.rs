//! Configuration loader for the `weather-rollup` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). The resulting [`Config`] is passed explicitly to
//! the scheduler and the HTTP routes; nothing reads the environment later.
//!
use std::{env, net::SocketAddr, str::FromStr};

use anyhow::{anyhow, Result};
use cron::Schedule;
use sqlx::postgres::PgConnectOptions;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Read an optional string environment variable with a default value.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

pub const DEFAULT_INGEST_SCHEDULE: &str = "0 */5 * * * *";
pub const DEFAULT_DAILY_SCHEDULE: &str = "0 5 0 * * *";
pub const DEFAULT_WEEKLY_SCHEDULE: &str = "0 10 0 * * Mon";
pub const DEFAULT_MONTHLY_SCHEDULE: &str = "0 15 0 1 * *";

/// Where the relational store lives.
#[derive(Debug, Clone)]
pub enum DbConfig {
    /// Full connection string from `DATABASE_URL`.
    Url(String),
    Parts {
        host: String,
        port: u16,
        user: String,
        password: String,
        name: String,
    },
}

/// Cron expressions for the four recurring triggers.
#[derive(Debug, Clone)]
pub struct Schedules {
    pub ingest: Schedule,
    pub daily: Schedule,
    pub weekly: Schedule,
    pub monthly: Schedule,
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    pub db: DbConfig,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Path or `http(s)://` URL of the single-reading JSON document.
    pub weather_source: String,

    pub schedules: Schedules,

    /// Run one ingestion before the scheduler starts.
    pub ingest_on_startup: bool,

    pub listen_addr: SocketAddr,
}

/// Parse a six-field cron expression, naming the variable on failure.
pub fn parse_schedule(var_name: &str, expr: &str) -> Result<Schedule> {
    Schedule::from_str(expr).map_err(|e| anyhow!("Invalid {} '{}': {}", var_name, expr, e))
}

fn parse_bool(var_name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(anyhow!("Invalid {}: expected true or false, got '{}'", var_name, value)),
    }
}

/// Load configuration from environment variables with defaults.
///
/// Database (either):
/// - `DATABASE_URL` – PostgreSQL connection string
/// - `DB_USER`, `DB_PASSWORD` (required), `DB_HOST` (default: localhost),
///   `DB_PORT` (default: 5432), `DB_NAME` (default: tene_life)
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `WEATHER_SOURCE` – weather JSON path or URL (default: weather.json)
/// - `INGEST_SCHEDULE`, `DAILY_SCHEDULE`, `WEEKLY_SCHEDULE`, `MONTHLY_SCHEDULE`
/// - `INGEST_ON_STARTUP` (default: true)
/// - `LISTEN_ADDR` (default: 0.0.0.0:8080)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db = match env::var("DATABASE_URL") {
        Ok(url) => DbConfig::Url(url),
        Err(_) => DbConfig::Parts {
            host: env_or!("DB_HOST", "localhost"),
            port: u16::try_from(parse_env_u32!("DB_PORT", 5432))
                .map_err(|e| anyhow!("Invalid DB_PORT: {}", e))?,
            user: require_env!("DB_USER"),
            password: require_env!("DB_PASSWORD"),
            name: env_or!("DB_NAME", "tene_life"),
        },
    };

    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let weather_source = env_or!("WEATHER_SOURCE", "weather.json");

    let schedules = Schedules {
        ingest: parse_schedule(
            "INGEST_SCHEDULE",
            &env_or!("INGEST_SCHEDULE", DEFAULT_INGEST_SCHEDULE),
        )?,
        daily: parse_schedule(
            "DAILY_SCHEDULE",
            &env_or!("DAILY_SCHEDULE", DEFAULT_DAILY_SCHEDULE),
        )?,
        weekly: parse_schedule(
            "WEEKLY_SCHEDULE",
            &env_or!("WEEKLY_SCHEDULE", DEFAULT_WEEKLY_SCHEDULE),
        )?,
        monthly: parse_schedule(
            "MONTHLY_SCHEDULE",
            &env_or!("MONTHLY_SCHEDULE", DEFAULT_MONTHLY_SCHEDULE),
        )?,
    };

    let ingest_on_startup = parse_bool("INGEST_ON_STARTUP", &env_or!("INGEST_ON_STARTUP", "true"))?;

    let listen_addr = env_or!("LISTEN_ADDR", "0.0.0.0:8080")
        .parse::<SocketAddr>()
        .map_err(|e| anyhow!("Invalid LISTEN_ADDR: {}", e))?;

    Ok(Config {
        db,
        db_pool_max,
        weather_source,
        schedules,
        ingest_on_startup,
        listen_addr,
    })
}

impl DbConfig {
    /// Connection options for the pool.
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        // ---
        match self {
            DbConfig::Url(url) => PgConnectOptions::from_str(url)
                .map_err(|e| anyhow!("Invalid DATABASE_URL: {}", e)),
            DbConfig::Parts {
                host,
                port,
                user,
                password,
                name,
            } => Ok(PgConnectOptions::new()
                .host(host)
                .port(*port)
                .username(user)
                .password(password)
                .database(name)),
        }
    }

    /// Human-readable description with the password masked.
    pub fn masked(&self) -> String {
        // ---
        match self {
            DbConfig::Url(url) => mask_url_password(url),
            DbConfig::Parts {
                host,
                port,
                user,
                name,
                ..
            } => format!("{user}:****@{host}:{port}/{name}"),
        }
    }
}

fn mask_url_password(url: &str) -> String {
    // ---
    let userinfo_start = url.find("://").map_or(0, |i| i + 3);
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if colon_pos >= userinfo_start {
                return format!("{}:****{}", &url[..colon_pos], &url[at_pos..]);
            }
        }
    }
    url.to_string()
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the database password while showing all configuration values
    /// that were loaded.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE          : {}", self.db.masked());
        tracing::info!("  DB_POOL_MAX       : {}", self.db_pool_max);
        tracing::info!("  WEATHER_SOURCE    : {}", self.weather_source);
        tracing::info!("  INGEST_SCHEDULE   : {}", self.schedules.ingest);
        tracing::info!("  DAILY_SCHEDULE    : {}", self.schedules.daily);
        tracing::info!("  WEEKLY_SCHEDULE   : {}", self.schedules.weekly);
        tracing::info!("  MONTHLY_SCHEDULE  : {}", self.schedules.monthly);
        tracing::info!("  INGEST_ON_STARTUP : {}", self.ingest_on_startup);
        tracing::info!("  LISTEN_ADDR       : {}", self.listen_addr);
    }
}
