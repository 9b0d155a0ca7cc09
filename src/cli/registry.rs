use anyhow::{anyhow, Context, Result};
use clap::Args;

use crate::cli::context::CliContext;
use soulheal::registry::SelectorRegistry;

#[derive(Args, Clone, Debug)]
pub struct RegistryArgs {
    /// Page to show; lists every stored page when omitted
    #[arg(long)]
    pub page: Option<String>,
}

pub async fn cmd_registry(args: RegistryArgs, ctx: &CliContext) -> Result<()> {
    let session = ctx.session().await?;
    let store = session.store();

    let Some(page) = args.page else {
        let pages = store.pages().await.context("Failed to list registry pages")?;
        return ctx.output().emit(&pages, || {
            if pages.is_empty() {
                println!("[no registries stored]");
            }
            for page in &pages {
                println!("{}", page);
            }
        });
    };

    let registry = store
        .load(&page)
        .await
        .with_context(|| format!("Failed to load registry '{}'", page))?
        .ok_or_else(|| anyhow!("No registry stored for page '{}'", page))?;

    ctx.output().emit(&registry, || {
        println!(
            "Registry '{}' (generated {})",
            registry.page,
            registry.generated_at.to_rfc3339()
        );
        print_registry(&registry);
    })
}

pub fn print_registry(registry: &SelectorRegistry) {
    if registry.is_empty() {
        println!("[no entries]");
        return;
    }
    println!("{:<28} {:<10} {}", "Name", "Category", "Selector");
    println!("{}", "-".repeat(72));
    for (name, entry) in &registry.entries {
        println!("{:<28} {:<10} {}", name, entry.category.name(), entry.selector);
    }
}
