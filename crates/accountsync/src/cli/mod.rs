mod context;
mod lifecycle;
mod plan;
mod status;
mod upgrade;

pub use lifecycle::LifecycleCommand;
pub use plan::PlanCommand;
pub use status::StatusCommand;
pub use upgrade::UpgradeCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Accountsync schema upgrader
#[derive(Parser)]
#[command(name = "accountsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Apply all pending upgrades.
    Upgrade(UpgradeCommand),

    /// Show applied and pending upgrades.
    Status(StatusCommand),

    /// Show what the next upgrade run would do.
    Plan(PlanCommand),

    /// Run an extension lifecycle hook.
    Lifecycle(LifecycleCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Upgrade(cmd) => cmd.execute().await,
            Commands::Status(cmd) => cmd.execute().await,
            Commands::Plan(cmd) => cmd.execute().await,
            Commands::Lifecycle(cmd) => cmd.execute().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_upgrade() {
        let cli = Cli::try_parse_from(["accountsync", "upgrade", "--config", "custom.toml"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_lifecycle() {
        let cli = Cli::try_parse_from(["accountsync", "lifecycle", "install"]);
        assert!(cli.is_ok());

        let cli = Cli::try_parse_from(["accountsync", "lifecycle", "reinstall"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["accountsync"]).is_err());
    }
}
