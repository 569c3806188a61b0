//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use postbox_core::PipelineConfig;

/// Runtime configuration for postbox-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// SQLite database URL (default: `"sqlite://postbox.db"`).
    /// The file is created if it does not exist; use `"sqlite::memory:"` for
    /// a throwaway store.
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Work queue capacity between request handlers and workers.
    pub queue_capacity: usize,

    /// Number of message-processing worker tasks.
    pub workers: usize,

    /// Attempts per message for transient store failures.
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    pub retry_backoff_ms: u64,

    /// Comma-separated allowed CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("POSTBOX_BIND", "0.0.0.0:3000"),
            database_url: env_or("POSTBOX_DATABASE_URL", "sqlite://postbox.db"),
            log_level: env_or("POSTBOX_LOG", "info"),
            log_json: env_flag("POSTBOX_LOG_JSON", false),
            queue_capacity: parse_env("POSTBOX_QUEUE_CAPACITY", 1024),
            workers: parse_env("POSTBOX_WORKERS", 2),
            max_attempts: parse_env("POSTBOX_MAX_ATTEMPTS", 3),
            retry_backoff_ms: parse_env("POSTBOX_RETRY_BACKOFF_MS", 200),
            cors_allowed_origins: std::env::var("POSTBOX_CORS_ORIGINS").ok(),
            enable_swagger: env_flag("POSTBOX_ENABLE_SWAGGER", true),
        }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            max_attempts: self.max_attempts.max(1),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            ..PipelineConfig::default()
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| parse_flag(&v))
        .unwrap_or(default)
}

fn parse_flag(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}
