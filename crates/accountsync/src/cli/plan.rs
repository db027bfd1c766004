use anyhow::Result;
use clap::Parser;
use console::style;

use super::context::ConnectArgs;

/// Show what the next upgrade run would do.
#[derive(Parser)]
pub struct PlanCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

impl PlanCommand {
    pub async fn execute(self) -> Result<()> {
        let ctx = self.connect.connect().await?;
        let planned = ctx.runner.preview().await;
        ctx.db.close().await;
        let planned = planned?;

        println!();
        if planned.is_empty() {
            println!("  {} Nothing to do", style("ℹ").blue());
            println!();
            return Ok(());
        }

        println!(
            "  {} {} pending upgrade(s), chunk size {}:",
            style("→").dim(),
            planned.len(),
            ctx.config.upgrader.chunk_size
        );
        for step in &planned {
            let chunks = step
                .chunks
                .map(|n| format!(" ({} chunk(s))", n))
                .unwrap_or_default();
            println!(
                "    {} {}{}",
                style(step.version).yellow(),
                step.description,
                style(chunks).dim()
            );
        }
        println!();
        Ok(())
    }
}
