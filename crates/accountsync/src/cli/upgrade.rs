use anyhow::Result;
use clap::Parser;
use console::style;

use accountsync_core::migration::StepOutcome;

use super::context::ConnectArgs;

/// Apply all pending upgrades.
#[derive(Parser)]
pub struct UpgradeCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl UpgradeCommand {
    pub async fn execute(self) -> Result<()> {
        let ctx = self.connect.connect().await?;

        println!();
        println!(
            "  {}  {} Upgrades",
            style("⚒️").bold(),
            style("Accountsync").bold().cyan()
        );
        println!();
        println!("  {} Running pending upgrades...", style("→").dim());

        let result = ctx.runner.run().await;
        ctx.db.close().await;

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                println!("  {} {}", style("✗").red(), e);
                println!();
                return Err(e.into());
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        if report.applied.is_empty() {
            println!("  {} Schema is up to date", style("ℹ").blue());
        }
        for step in &report.applied {
            let detail = match step.outcome {
                StepOutcome::Chunked { chunks } => format!("{} chunk(s)", chunks),
                StepOutcome::EmptyPopulation => "no rows".to_string(),
                StepOutcome::Tasks { count } => format!("{} task(s)", count),
                StepOutcome::Atomic | StepOutcome::AlreadyApplied => String::new(),
            };
            println!(
                "  {} Applied {} {}",
                style("✓").green(),
                style(step.version).cyan(),
                style(detail).dim()
            );
        }

        println!();
        println!(
            "  {} Schema version: {}",
            style("ℹ").blue(),
            report
                .final_version()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        println!();
        Ok(())
    }
}
