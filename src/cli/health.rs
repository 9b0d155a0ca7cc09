use anyhow::{bail, Result};

use crate::cli::context::CliContext;

pub async fn cmd_health(ctx: &CliContext) -> Result<()> {
    let session = ctx.session().await?;
    let ai = &session.config().ai;

    match session.backend_health().await {
        None => ctx.output().emit(
            &serde_json::json!({ "enabled": false }),
            || println!("Suggestion backend disabled (set ai.enabled or SOULHEAL_AI_ENABLED)"),
        ),
        Some(Ok(())) => ctx.output().emit(
            &serde_json::json!({ "enabled": true, "healthy": true, "url": ai.base_url, "model": ai.model }),
            || println!("Suggestion backend healthy: {} ({})", ai.base_url, ai.model),
        ),
        Some(Err(err)) => bail!("Suggestion backend at {} is unhealthy: {}", ai.base_url, err),
    }
}
