use std::time::Duration;

const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 25_000;

/// WebSocket API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Redis connection string for the recent-history cache.
    pub redis_url: String,
    /// Port the HTTP/WebSocket server binds to.
    pub port: u16,
    /// Maximum number of pooled database connections.
    pub db_pool_size: usize,
    /// Length each per-room history list is trimmed to after a push.
    pub history_max_len: usize,
    /// Upper bound on entries returned by a single `comment:history` request.
    pub history_default_limit: usize,
    /// Interval between server pings; two silent intervals close the connection.
    pub heartbeat_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_var("DATABASE_URL"),
            redis_url: redis_url_from_env(),
            port: parsed_var("PORT").unwrap_or(8081),
            db_pool_size: parsed_var("DB_POOL_SIZE").unwrap_or(20),
            history_max_len: parsed_var("HISTORY_MAX_LEN").unwrap_or(100),
            history_default_limit: parsed_var("HISTORY_DEFAULT_LIMIT").unwrap_or(50),
            heartbeat_interval: heartbeat_interval(parsed_var("HEARTBEAT_INTERVAL_MS")),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            redis_url: "redis://localhost:6379".to_string(),
            port: 8081,
            db_pool_size: 20,
            history_max_len: 100,
            history_default_limit: 50,
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS),
        }
    }
}

/// `REDIS_URL` wins; otherwise the URL is assembled from `REDIS_HOST`, `REDIS_PORT` and
/// `REDIS_PASSWORD`.
fn redis_url_from_env() -> String {
    if let Some(url) = optional_var("REDIS_URL") {
        return url;
    }

    let host = optional_var("REDIS_HOST").unwrap_or_else(|| "localhost".to_string());
    let port: u16 = parsed_var("REDIS_PORT").unwrap_or(6379);
    build_redis_url(&host, port, optional_var("REDIS_PASSWORD").as_deref())
}

fn build_redis_url(host: &str, port: u16, password: Option<&str>) -> String {
    match password {
        Some(password) => format!("redis://:{password}@{host}:{port}"),
        None => format!("redis://{host}:{port}"),
    }
}

/// Zero would make the ticker spin, so it falls back to the default like an unset value.
fn heartbeat_interval(ms: Option<u64>) -> Duration {
    Duration::from_millis(
        ms.filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_MS),
    )
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    optional_var(name).and_then(|v| v.parse().ok())
}
