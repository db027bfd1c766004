use std::path::Path;

use tracing::debug;

use accountsync_core::error::{Result, UpgradeError};
use accountsync_core::migration::{MigrationStep, Operation};

/// Load extra upgrade steps from a directory of SQL scripts.
///
/// Scripts must be named `upgrade_<version>.sql`, e.g. `upgrade_4201.sql`.
/// The first `--` comment line, if any, becomes the description. Each
/// script runs as one atomic step.
pub fn load_steps_from_dir(dir: &Path) -> Result<Vec<MigrationStep>> {
    if !dir.exists() {
        debug!("Upgrade script directory does not exist: {:?}", dir);
        return Ok(Vec::new());
    }

    let mut steps = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().map(|e| e != "sql").unwrap_or(true) {
            continue;
        }

        let Some(version) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix("upgrade_"))
        else {
            continue;
        };

        let version: i64 = version.parse().map_err(|_| {
            UpgradeError::Configuration(format!("Invalid upgrade script name: {:?}", path))
        })?;

        let sql = std::fs::read_to_string(&path)?;
        let description = sql
            .lines()
            .map(str::trim)
            .find_map(|l| l.strip_prefix("--"))
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("Run upgrade_{}.sql", version));

        steps.push(MigrationStep::atomic(version, description, Operation::Sql(sql)));
    }

    steps.sort_by_key(|s| s.version);

    debug!("Loaded {} upgrade scripts", steps.len());
    Ok(steps)
}
