//! Application configuration loaded from environment variables.

use std::path::PathBuf;

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for JSON logs, anything else for text
/// - `DATABASE_URL`: PostgreSQL connection string; unset means in-memory storage
/// - `FUNCTIONS_BASE_URL`: remote functions service; unset runs the functions in-process under `/functions`
/// - `FUNCTIONS_KEY`: key sent as `x-functions-key` (and expected by the in-process functions)
/// - `SESSION_TTL_MINUTES`: idle timeout of a login session (default: `30`)
/// - `FILE_STORAGE_ROOT`, `PUBLIC_BASE_URL`, `LOW_STOCK_THRESHOLD`: passed to the in-process functions
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub json_logs: bool,
    pub database_url: Option<String>,
    pub functions_base_url: Option<String>,
    pub functions_key: Option<String>,
    pub session_ttl_minutes: u64,
    pub file_storage_root: Option<PathBuf>,
    pub public_base_url: Option<String>,
    pub low_stock_threshold: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            json_logs: var("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            database_url: var("DATABASE_URL"),
            functions_base_url: var("FUNCTIONS_BASE_URL"),
            functions_key: var("FUNCTIONS_KEY"),
            session_ttl_minutes: var("SESSION_TTL_MINUTES")
                .and_then(|t| t.parse().ok())
                .filter(|t| *t > 0)
                .unwrap_or(defaults.session_ttl_minutes),
            file_storage_root: var("FILE_STORAGE_ROOT").map(PathBuf::from),
            public_base_url: var("PUBLIC_BASE_URL"),
            low_stock_threshold: var("LOW_STOCK_THRESHOLD")
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.low_stock_threshold),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Configuration for the functions service when it runs inside this
    /// process, mounted under `/functions`.
    pub fn embedded_functions(&self) -> functions::config::Config {
        functions::config::Config {
            host: self.host.clone(),
            port: self.port,
            log_level: self.log_level.clone(),
            json_logs: self.json_logs,
            database_url: self.database_url.clone(),
            functions_key: self.functions_key.clone(),
            file_storage_root: self.file_storage_root.clone(),
            public_base_url: self
                .public_base_url
                .clone()
                .unwrap_or_else(|| format!("http://localhost:{}/functions", self.port)),
            low_stock_threshold: self.low_stock_threshold,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            json_logs: false,
            database_url: None,
            functions_base_url: None,
            functions_key: None,
            session_ttl_minutes: 30,
            file_storage_root: None,
            public_base_url: None,
            low_stock_threshold: 10,
        }
    }
}
