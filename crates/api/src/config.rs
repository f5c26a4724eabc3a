//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `EVENT_BUS_NAME`: bus name stamped on events (default: `"default"`)
/// - `DATABASE_URL`: PostgreSQL URL; unset keeps records in memory
/// - `LOW_STOCK_THRESHOLD`: quantity at or below which deductions warn
/// - `SAGA_STALE_AFTER_SECS`: age at which reconcile compensates a saga
///   (default: `300`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_bus_name: String,
    pub database_url: Option<String>,
    pub low_stock_threshold: Option<i64>,
    pub saga_stale_after: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.log_format),
            event_bus_name: lookup("EVENT_BUS_NAME").unwrap_or(defaults.event_bus_name),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            low_stock_threshold: lookup("LOW_STOCK_THRESHOLD").and_then(|t| t.parse().ok()),
            saga_stale_after: lookup("SAGA_STALE_AFTER_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.saga_stale_after),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            event_bus_name: "default".to_string(),
            database_url: None,
            low_stock_threshold: None,
            saga_stale_after: Duration::from_secs(300),
        }
    }
}
