use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;
use tracing_subscriber::EnvFilter;

use accountsync_core::config::{AccountsyncConfig, LoggingConfig};
use accountsync_runtime::migrations::{accountsync_upgrades, load_steps_from_dir};
use accountsync_runtime::{
    Database, MigrationRunner, MySqlExecutionSink, MySqlVersionStore, TracingObserver,
};

/// Options shared by every command that talks to the database.
#[derive(Args)]
pub struct ConnectArgs {
    /// Configuration file path.
    #[arg(short, long, default_value = "accountsync.toml")]
    pub config: String,

    /// Directory holding extra `upgrade_<version>.sql` scripts.
    #[arg(long, default_value = "sql")]
    pub sql_dir: String,
}

/// Everything a command needs to run upgrades.
pub struct UpgradeContext {
    pub config: AccountsyncConfig,
    pub db: Database,
    pub sink: Arc<MySqlExecutionSink>,
    pub runner: MigrationRunner,
}

impl ConnectArgs {
    /// Load configuration, with `.env` applied first.
    pub fn load_config(&self) -> Result<AccountsyncConfig> {
        dotenvy::dotenv().ok();

        if !Path::new(&self.config).exists() {
            anyhow::bail!("Configuration file not found: {}", self.config);
        }

        Ok(AccountsyncConfig::from_file(&self.config)?)
    }

    /// Connect to the database and build a runner over every known step.
    pub async fn connect(&self) -> Result<UpgradeContext> {
        let config = self.load_config()?;
        init_tracing(&config.logging);
        info!("Loaded configuration from {}", self.config);

        let db = Database::from_config(&config.database).await?;
        let store = MySqlVersionStore::open(db.pool().clone(), &config.upgrader.version_table)
            .await
            .context("opening version store")?;
        let sink = Arc::new(MySqlExecutionSink::new(db.pool().clone()));

        let mut steps = accountsync_upgrades();
        steps.extend(load_steps_from_dir(Path::new(&self.sql_dir))?);

        let runner = MigrationRunner::new(steps, Arc::new(store), sink.clone())?
            .with_config(&config.upgrader)?
            .with_observer(Arc::new(TracingObserver));

        Ok(UpgradeContext {
            config,
            db,
            sink,
            runner,
        })
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
