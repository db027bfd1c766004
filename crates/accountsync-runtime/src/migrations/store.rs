use sqlx::MySqlPool;
use tracing::debug;

use accountsync_core::error::{Result, UpgradeError};
use accountsync_core::migration::{BoxFuture, VersionStore};

use super::sink::quote_ident;

/// Version store backed by a single-row MySQL table.
pub struct MySqlVersionStore {
    pool: MySqlPool,
    table: String,
}

impl MySqlVersionStore {
    /// Open the store, creating its table if needed.
    pub async fn open(pool: MySqlPool, table: &str) -> Result<Self> {
        let store = Self {
            pool,
            table: quote_ident(table)?,
        };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TINYINT UNSIGNED NOT NULL PRIMARY KEY,
                version BIGINT NOT NULL,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
            )
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| UpgradeError::Database(format!("Failed to create version table: {}", e)))?;
        debug!(table = %self.table, "Version table ready");
        Ok(())
    }

    async fn load(&self) -> Result<Option<i64>> {
        sqlx::query_scalar::<_, i64>(&format!("SELECT version FROM {} WHERE id = 1", self.table))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| UpgradeError::Database(format!("Failed to read applied version: {}", e)))
    }

    async fn store(&self, version: i64) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO {} (id, version) VALUES (1, ?) ON DUPLICATE KEY UPDATE version = VALUES(version)",
            self.table
        ))
        .bind(version)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            UpgradeError::Database(format!("Failed to record version {}: {}", version, e))
        })?;
        Ok(())
    }
}

impl VersionStore for MySqlVersionStore {
    fn get(&self) -> BoxFuture<'_, Option<i64>> {
        Box::pin(self.load())
    }

    fn set(&self, version: i64) -> BoxFuture<'_, ()> {
        Box::pin(self.store(version))
    }
}
