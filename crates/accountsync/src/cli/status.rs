use anyhow::Result;
use clap::Parser;
use console::style;

use accountsync_core::migration::StepState;

use super::context::ConnectArgs;

/// Show applied and pending upgrades.
#[derive(Parser)]
pub struct StatusCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

impl StatusCommand {
    pub async fn execute(self) -> Result<()> {
        let ctx = self.connect.connect().await?;
        let status = ctx.runner.status().await;
        ctx.db.close().await;
        let status = status?;

        println!();
        println!(
            "  {}  {} Upgrade Status",
            style("⚒️").bold(),
            style("Accountsync").bold().cyan()
        );
        println!();

        if status.is_empty() {
            println!("  {} No upgrades registered", style("ℹ").blue());
            return Ok(());
        }

        let mut applied = 0;
        for step in &status {
            if step.state == StepState::Applied {
                applied += 1;
                println!(
                    "    {} {} {}",
                    style("✓").green(),
                    style(step.version).cyan(),
                    step.description
                );
            } else {
                println!(
                    "    {} {} {}",
                    style("○").yellow(),
                    style(step.version).yellow(),
                    step.description
                );
            }
        }

        println!();
        println!(
            "  {} {} applied, {} pending",
            style("ℹ").blue(),
            applied,
            status.len() - applied
        );
        println!();
        Ok(())
    }
}
