use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;

use accountsync_core::migration::{ExtensionLifecycle, LifecycleHook};
use accountsync_runtime::SqlLifecycle;

use super::context::ConnectArgs;

/// Run an extension lifecycle hook.
#[derive(Parser)]
pub struct LifecycleCommand {
    /// Hook to run.
    #[arg(value_enum)]
    pub hook: HookArg,

    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Extension base directory; script paths are relative to it.
    #[arg(long, default_value = ".")]
    pub base_dir: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum HookArg {
    Install,
    Uninstall,
    Enable,
    Disable,
}

impl From<HookArg> for LifecycleHook {
    fn from(arg: HookArg) -> Self {
        match arg {
            HookArg::Install => LifecycleHook::Install,
            HookArg::Uninstall => LifecycleHook::Uninstall,
            HookArg::Enable => LifecycleHook::Enable,
            HookArg::Disable => LifecycleHook::Disable,
        }
    }
}

impl LifecycleCommand {
    pub async fn execute(self) -> Result<()> {
        let hook = LifecycleHook::from(self.hook);
        let ctx = self.connect.connect().await?;

        let lifecycle = SqlLifecycle::new(
            ctx.sink.clone(),
            ctx.config.lifecycle.clone(),
            self.base_dir,
        );

        let result = lifecycle.invoke(hook).await;
        ctx.db.close().await;
        result?;

        println!("  {} Ran {} hook", style("✓").green(), hook);
        Ok(())
    }
}
