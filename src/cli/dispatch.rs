use super::cache::{cmd_clear_cache, cmd_stats};
use super::classify::cmd_classify;
use super::env::CliArgs;
use super::heal::cmd_heal;
use super::health::cmd_health;
use super::registry::cmd_registry;
use super::rescan::cmd_rescan;
use super::resolve::cmd_resolve;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Stats => cmd_stats(ctx).await,
        Commands::ClearCache => cmd_clear_cache(ctx).await,
        Commands::Resolve(args) => cmd_resolve(args, ctx).await,
        Commands::Rescan(args) => cmd_rescan(args, ctx).await,
        Commands::Classify(args) => cmd_classify(args, ctx),
        Commands::Registry(args) => cmd_registry(args, ctx).await,
        Commands::Heal(args) => cmd_heal(args, ctx).await,
        Commands::Health => cmd_health(ctx).await,
    }
}
