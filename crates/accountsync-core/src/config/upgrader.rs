use serde::{Deserialize, Serialize};

use crate::error::{Result, UpgradeError};

/// Default number of keys covered by one chunk.
pub const DEFAULT_CHUNK_SIZE: u64 = 5000;

/// Migration runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgraderConfig {
    /// Chunk size used by chunked steps that don't set their own.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Table holding the applied version high-water mark.
    #[serde(default = "default_version_table")]
    pub version_table: String,
}

impl Default for UpgraderConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            version_table: default_version_table(),
        }
    }
}

impl UpgraderConfig {
    /// Reject values the runner cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(UpgradeError::Configuration(
                "upgrader.chunk_size must be at least 1".into(),
            ));
        }
        let valid_table = !self.version_table.is_empty()
            && self
                .version_table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_table {
            return Err(UpgradeError::Configuration(format!(
                "Invalid version table name: {:?}",
                self.version_table
            )));
        }
        Ok(())
    }
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_version_table() -> String {
    "accountsync_schema_version".to_string()
}
