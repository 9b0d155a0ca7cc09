use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, LoadedConfig};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;

    info!("Starting SoulHeal v{}", env!("CARGO_PKG_VERSION"));

    let LoadedConfig { config, path } = load_config(cli.config.as_ref()).await?;
    debug!(
        config = %path.display(),
        cache = %config.cache_path.display(),
        registries = %config.registry_dir.display(),
        ai = config.ai.enabled,
        "configuration resolved"
    );
    let cli_context = CliContext::new(config, path, cli.output.clone());

    dispatch(&cli, &cli_context).await.map_err(|err| {
        error!(config = %cli_context.config_path().display(), "Command failed: {:#}", err);
        err
    })
}
