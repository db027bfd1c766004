use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use accountsync_core::config::LifecycleConfig;
use accountsync_core::error::{Result, UpgradeError};
use accountsync_core::migration::{BoxFuture, ExecutionSink, ExtensionLifecycle, Operation};

/// Lifecycle hooks that run the SQL scripts named in the configuration.
///
/// A hook with no script configured does nothing.
pub struct SqlLifecycle {
    sink: Arc<dyn ExecutionSink>,
    config: LifecycleConfig,
    base_dir: PathBuf,
}

impl SqlLifecycle {
    /// Script paths are resolved against `base_dir`, the extension directory.
    pub fn new(
        sink: Arc<dyn ExecutionSink>,
        config: LifecycleConfig,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sink,
            config,
            base_dir: base_dir.into(),
        }
    }

    async fn run_script(&self, hook: &str, script: Option<&Path>) -> Result<()> {
        let Some(script) = script else {
            debug!(hook, "No script configured");
            return Ok(());
        };

        let path = self.base_dir.join(script);
        let sql = tokio::fs::read_to_string(&path).await.map_err(|e| {
            UpgradeError::NotFound(format!("{} script {:?}: {}", hook, path, e))
        })?;

        info!(hook, script = ?path, "Executing lifecycle script");
        self.sink.execute(&Operation::Sql(sql), None).await
    }
}

impl ExtensionLifecycle for SqlLifecycle {
    fn install(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.run_script("install", self.config.install_sql.as_deref()))
    }

    fn uninstall(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.run_script("uninstall", self.config.uninstall_sql.as_deref()))
    }

    fn enable(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.run_script("enable", self.config.enable_sql.as_deref()))
    }

    fn disable(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.run_script("disable", self.config.disable_sql.as_deref()))
    }
}
