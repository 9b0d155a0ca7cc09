use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::cli::context::{read_markup, CliContext};
use crate::cli::registry::print_registry;
use soulheal::flow::ScenarioContext;
use soulheal::perceiver::{DocumentPort, PageSnapshot};

#[derive(Args, Clone, Debug)]
pub struct RescanArgs {
    /// Saved HTML page to analyze
    #[arg(long, value_name = "FILE")]
    pub html: PathBuf,

    /// Logical page name of the registry to regenerate
    #[arg(long)]
    pub page: String,
}

pub async fn cmd_rescan(args: RescanArgs, ctx: &CliContext) -> Result<()> {
    let markup = read_markup(&args.html).await?;
    let document: Arc<dyn DocumentPort> = Arc::new(PageSnapshot::from_markup(markup));
    let session = ctx.session().await?;
    let orchestrator = session.orchestrator(Some(document));

    let mut scenario = ScenarioContext::new("cli-rescan");
    let Some(registry) = orchestrator
        .rescan_page(&mut scenario, &args.page)
        .await
        .with_context(|| format!("Failed to rescan page '{}'", args.page))?
    else {
        bail!("Page '{}' was not regenerated", args.page);
    };

    ctx.output().emit(&registry, || {
        println!(
            "Regenerated '{}' from {}",
            registry.page,
            args.html.display()
        );
        print_registry(&registry);
    })
}
