use clap::Subcommand;

use super::classify::ClassifyArgs;
use super::heal::HealArgs;
use super::registry::RegistryArgs;
use super::rescan::RescanArgs;
use super::resolve::ResolveArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Show strategy cache statistics
    Stats,

    /// Remove every cached strategy (memory and file)
    ClearCache,

    /// Resolve an element description against a saved HTML page
    Resolve(ResolveArgs),

    /// Re-scan a saved HTML page and regenerate its selector registry
    Rescan(RescanArgs),

    /// Classify a raw failure message
    Classify(ClassifyArgs),

    /// List registry pages or show one page's entries
    Registry(RegistryArgs),

    /// Run one healing decision for a failed step
    Heal(HealArgs),

    /// Check that the selector suggestion backend is reachable
    Health,
}
