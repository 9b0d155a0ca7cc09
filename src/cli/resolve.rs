use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::cli::context::{read_markup, CliContext};
use soulheal::locator::{ElementDescription, ElementResolver};
use soulheal::perceiver::PageSnapshot;

#[derive(Args, Clone, Debug)]
pub struct ResolveArgs {
    /// Saved HTML page to resolve against
    #[arg(long, value_name = "FILE")]
    pub html: PathBuf,

    /// Visible text of the element
    #[arg(long)]
    pub text: Option<String>,

    /// Placeholder attribute
    #[arg(long)]
    pub placeholder: Option<String>,

    /// aria-label attribute
    #[arg(long)]
    pub aria_label: Option<String>,

    /// Element type (button, email, password, ...)
    #[arg(long = "type")]
    pub element_type: Option<String>,

    /// ARIA role
    #[arg(long)]
    pub role: Option<String>,

    /// Class name
    #[arg(long = "class")]
    pub class_name: Option<String>,

    /// Page context forwarded to the suggestion backend
    #[arg(long, default_value = "")]
    pub context: String,
}

impl ResolveArgs {
    pub fn description(&self) -> ElementDescription {
        ElementDescription {
            text: self.text.clone(),
            placeholder: self.placeholder.clone(),
            aria_label: self.aria_label.clone(),
            element_type: self.element_type.clone(),
            role: self.role.clone(),
            class_name: self.class_name.clone(),
        }
    }
}

pub async fn cmd_resolve(args: ResolveArgs, ctx: &CliContext) -> Result<()> {
    let description = args.description();
    if description.is_empty() {
        bail!("Describe the element with at least one of --text, --placeholder, --aria-label, --type, --role or --class");
    }

    let markup = read_markup(&args.html).await?;
    let document = PageSnapshot::from_markup(markup);
    let session = ctx.session().await?;
    let resolved = session
        .resolver()
        .resolve(&document, &description, &args.context)
        .await
        .context("Element resolution failed")?;

    ctx.output().emit(&resolved, || {
        println!("Resolved <{}> ({})", resolved.handle.tag, resolved.handle.node_id);
        println!(
            "- Strategy: {} {} (priority {})",
            resolved.strategy.kind.name(),
            resolved.strategy.selector,
            resolved.strategy.priority
        );
        println!("- Fingerprint: {}", resolved.fingerprint);
        println!(
            "- Source: {} after {} attempt(s)",
            if resolved.from_cache { "cache" } else { "generated" },
            resolved.attempts
        );
        if let Some(text) = resolved.handle.text.as_deref() {
            println!("- Text: {}", text);
        }
    })
}
