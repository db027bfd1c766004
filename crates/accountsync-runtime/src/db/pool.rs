use std::time::Duration;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

use accountsync_core::config::DatabaseConfig;
use accountsync_core::error::{Result, UpgradeError};

/// Database connection wrapper providing connection pooling.
#[derive(Clone)]
pub struct Database {
    pool: MySqlPool,
}

impl Database {
    /// Connect using the given configuration.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(UpgradeError::Configuration(
                "database.url is not set".into(),
            ));
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.pool_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| UpgradeError::Database(format!("Failed to connect: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| UpgradeError::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Type alias for the pool type.
pub type DatabasePool = MySqlPool;
