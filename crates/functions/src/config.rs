//! Functions service configuration loaded from environment variables.

use std::path::PathBuf;

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `7071`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for JSON logs, anything else for text
/// - `DATABASE_URL`: PostgreSQL connection string; unset means in-memory storage
/// - `FUNCTIONS_KEY`: shared key expected in `x-functions-key`; unset disables the check
/// - `FILE_STORAGE_ROOT`: directory for uploaded files; unset keeps files in memory
/// - `PUBLIC_BASE_URL`: base of the download URLs handed out (default: `http://localhost:7071`)
/// - `LOW_STOCK_THRESHOLD`: default low-stock threshold (default: `10`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub json_logs: bool,
    pub database_url: Option<String>,
    pub functions_key: Option<String>,
    pub file_storage_root: Option<PathBuf>,
    pub public_base_url: String,
    pub low_stock_threshold: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let port = var("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);
        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port,
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            json_logs: var("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            database_url: var("DATABASE_URL"),
            functions_key: var("FUNCTIONS_KEY"),
            file_storage_root: var("FILE_STORAGE_ROOT").map(PathBuf::from),
            public_base_url: var("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{port}")),
            low_stock_threshold: var("LOW_STOCK_THRESHOLD")
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.low_stock_threshold),
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
            port: 7071,
            log_level: "info".to_string(),
            json_logs: false,
            database_url: None,
            functions_key: None,
            file_storage_root: None,
            public_base_url: "http://localhost:7071".to_string(),
            low_stock_threshold: 10,
        }
    }
}
