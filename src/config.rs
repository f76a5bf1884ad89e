//! Configuration management for the routing service
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{env}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Routing workflow configuration
    pub routing: RoutingConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Maximum number of review rounds per schedule
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Review window per reviewer in days; the Nth reviewer's deadline is
    /// round start + N * this value
    #[serde(default = "default_review_period_days")]
    pub review_period_days: i64,

    /// Directory revised documents are written to
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Public URL prefix for stored documents
    #[serde(default = "default_upload_url_prefix")]
    pub upload_url_prefix: String,

    /// Maximum revision upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level / env-filter directive (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 50 }
fn default_min_connections() -> u32 { 5 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_max_rounds() -> u32 { 3 }
fn default_review_period_days() -> i64 { 14 }
fn default_upload_dir() -> String { "uploads".to_string() }
fn default_upload_url_prefix() -> String { "/uploads".to_string() }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "thesis-routing".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/thesis_archive".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            routing: RoutingConfig {
                max_rounds: default_max_rounds(),
                review_period_days: default_review_period_days(),
                upload_dir: default_upload_dir(),
                upload_url_prefix: default_upload_url_prefix(),
                max_upload_bytes: default_max_upload_bytes(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                service_name: default_service_name(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.routing.max_rounds, 3);
        assert_eq!(config.routing.review_period_days, 14);
        assert_eq!(config.routing.max_upload_bytes, 10 * 1024 * 1024);
    }
}
