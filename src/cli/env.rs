use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;
use super::output::OutputFormat;

/// Resilient element resolution and self-healing for UI test steps
#[derive(Parser)]
#[command(name = "soulheal", author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Heal configuration file (YAML)
    #[arg(short, long, value_name = "FILE", env = "SOULHEAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    pub debug: bool,

    /// Render results as text, JSON or YAML
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}
