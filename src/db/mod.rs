//! Database layer for the routing service
//!
//! Provides:
//! - SeaORM entity models
//! - Repository pattern for data access
//! - Connection pool management

pub mod models;
mod repository;

pub use repository::{Repository, RoundWithAssignments, ScheduleBundle};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes and transactional reads)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");

        let primary = Database::connect(Self::options(&config.url, config))
            .await
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to connect to primary: {}", e),
            })?;

        let replica = if let Some(ref read_url) = config.read_url {
            info!("Connecting to read replica...");

            let replica_conn = Database::connect(Self::options(read_url, config))
                .await
                .map_err(|e| AppError::Configuration {
                    message: format!("Failed to connect to replica: {}", e),
                })?;

            Some(replica_conn)
        } else {
            None
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    fn options(url: &str, config: &DatabaseConfig) -> ConnectOptions {
        let mut opts = ConnectOptions::new(url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(true);
        opts
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;

        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::Internal {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::Internal {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }
}
