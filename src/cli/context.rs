use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::fs;
use tokio::sync::OnceCell;

use soulheal::{HealConfig, HealSession};

use super::output::OutputFormat;

pub struct CliContext {
    config: Arc<HealConfig>,
    config_path: PathBuf,
    output: OutputFormat,
    session: OnceCell<Arc<HealSession>>,
}

impl CliContext {
    pub fn new(config: HealConfig, config_path: PathBuf, output: OutputFormat) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            output,
            session: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &HealConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn output(&self) -> &OutputFormat {
        &self.output
    }

    pub async fn session(&self) -> Result<Arc<HealSession>> {
        self.session
            .get_or_try_init(|| async {
                HealSession::open(self.config().clone())
                    .map(Arc::new)
                    .context("Failed to open heal session")
            })
            .await
            .map(Arc::clone)
    }
}

/// Read a saved HTML page
pub async fn read_markup(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read HTML file {}", path.display()))
}
