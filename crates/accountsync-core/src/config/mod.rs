mod database;
mod upgrader;

pub use database::DatabaseConfig;
pub use upgrader::{UpgraderConfig, DEFAULT_CHUNK_SIZE};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, UpgradeError};

/// Root configuration for the Accountsync upgrader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsyncConfig {
    /// Database configuration.
    pub database: DatabaseConfig,

    /// Migration runner configuration.
    #[serde(default)]
    pub upgrader: UpgraderConfig,

    /// SQL scripts run by the extension lifecycle hooks.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AccountsyncConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        debug!(path = ?path.as_ref(), "Loading configuration");
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            UpgradeError::Configuration(format!("Failed to read config file: {}", e))
        })?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        let config: Self = toml::from_str(&content)
            .map_err(|e| UpgradeError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.upgrader.validate()?;
        Ok(config)
    }

    /// Configuration with defaults for everything but the database URL.
    pub fn default_with_database_url(url: &str) -> Self {
        Self {
            database: DatabaseConfig {
                url: url.to_string(),
                ..Default::default()
            },
            upgrader: UpgraderConfig::default(),
            lifecycle: LifecycleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// SQL files executed by lifecycle hooks. Paths are relative to the
/// extension base directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default)]
    pub install_sql: Option<PathBuf>,

    #[serde(default)]
    pub uninstall_sql: Option<PathBuf>,

    #[serde(default)]
    pub enable_sql: Option<PathBuf>,

    #[serde(default)]
    pub disable_sql: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Replace `${VAR}` references with values from the environment.
/// Unset variables are left untouched.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
        Ok(re) => re,
        Err(_) => return result,
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AccountsyncConfig::default_with_database_url("mysql://localhost/civicrm");
        assert_eq!(config.upgrader.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.logging.level, "info");
        assert!(config.lifecycle.install_sql.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [database]
            url = "mysql://localhost/civicrm"
        "#;

        let config = AccountsyncConfig::parse_toml(toml).unwrap();
        assert_eq!(config.database.url, "mysql://localhost/civicrm");
        assert_eq!(config.upgrader.version_table, "accountsync_schema_version");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [database]
            url = "mysql://localhost/civicrm"
            pool_size = 2

            [upgrader]
            chunk_size = 100

            [lifecycle]
            install_sql = "sql/install.sql"

            [logging]
            level = "debug"
            json = true
        "#;

        let config = AccountsyncConfig::parse_toml(toml).unwrap();
        assert_eq!(config.database.pool_size, 2);
        assert_eq!(config.upgrader.chunk_size, 100);
        assert_eq!(
            config.lifecycle.install_sql.as_deref(),
            Some(Path::new("sql/install.sql"))
        );
        assert!(config.logging.json);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let toml = r#"
            [database]
            url = "mysql://localhost/civicrm"

            [upgrader]
            chunk_size = 0
        "#;

        let err = AccountsyncConfig::parse_toml(toml).unwrap_err();
        assert!(matches!(err, UpgradeError::Configuration(_)));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("ACCOUNTSYNC_TEST_DB_URL", "mysql://env/civicrm");
        let toml = r#"
            [database]
            url = "${ACCOUNTSYNC_TEST_DB_URL}"
        "#;

        let config = AccountsyncConfig::parse_toml(toml).unwrap();
        assert_eq!(config.database.url, "mysql://env/civicrm");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("accountsync.toml");
        std::fs::write(&path, "[database]\nurl = \"mysql://file/civicrm\"\n").unwrap();

        let config = AccountsyncConfig::from_file(&path).unwrap();
        assert_eq!(config.database.url, "mysql://file/civicrm");
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = AccountsyncConfig::from_file("/nonexistent/accountsync.toml").unwrap_err();
        assert!(matches!(err, UpgradeError::Configuration(_)));
    }
}
