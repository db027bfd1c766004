use thiserror::Error;

/// Core error type for upgrade operations.
#[derive(Error, Debug)]
pub enum UpgradeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upgrade {version} failed: {message}")]
    StepExecution { version: i64, message: String },

    #[error("Upgrade {version} failed on chunk [{range_start}, {range_end}]: {message}")]
    ChunkExecution {
        version: i64,
        range_start: i64,
        range_end: i64,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl UpgradeError {
    /// Version of the step this error is attributed to, if any.
    pub fn version(&self) -> Option<i64> {
        match self {
            UpgradeError::StepExecution { version, .. }
            | UpgradeError::ChunkExecution { version, .. } => Some(*version),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for UpgradeError {
    fn from(e: serde_json::Error) -> Self {
        UpgradeError::Serialization(e.to_string())
    }
}

/// Result type alias using UpgradeError.
pub type Result<T> = std::result::Result<T, UpgradeError>;
