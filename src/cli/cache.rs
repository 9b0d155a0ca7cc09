use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::context::CliContext;
use soulheal::locator::CacheStats;

#[derive(Serialize)]
struct StatsReport {
    cache_path: Option<String>,
    #[serde(flatten)]
    stats: CacheStats,
}

pub async fn cmd_stats(ctx: &CliContext) -> Result<()> {
    let session = ctx.session().await?;
    let report = StatsReport {
        cache_path: session
            .cache()
            .storage_path()
            .map(|path| path.display().to_string()),
        stats: session.stats(),
    };

    ctx.output().emit(&report, || {
        println!("Strategy Cache");
        println!("==============");
        println!(
            "File: {}",
            report.cache_path.as_deref().unwrap_or("(in memory)")
        );
        println!("Cached descriptions: {}", report.stats.total_cached);
        println!("Successful resolutions: {}", report.stats.successful_strategies);
        println!(
            "Average success rate: {:.2}",
            report.stats.average_success_rate
        );
    })
}

pub async fn cmd_clear_cache(ctx: &CliContext) -> Result<()> {
    let session = ctx.session().await?;
    let removed = session.cache().len();
    session
        .cache()
        .clear()
        .context("Failed to clear strategy cache")?;

    ctx.output().emit(&serde_json::json!({ "removed": removed }), || {
        println!("Cleared {} cached description(s)", removed);
    })
}
