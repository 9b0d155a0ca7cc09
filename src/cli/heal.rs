use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::cli::context::{read_markup, CliContext};
use soulheal::flow::{classify, GuardedStep, ScenarioContext, SelfHealer};
use soulheal::locator::ElementDescription;
use soulheal::perceiver::{DocumentPort, PageSnapshot};

#[derive(Args, Clone, Debug)]
pub struct HealArgs {
    /// Step text, e.g. "I click the login button"
    #[arg(long)]
    pub step: String,

    /// Logical page whose registry the step used
    #[arg(long)]
    pub page: String,

    /// Registry entry the step referenced
    #[arg(long)]
    pub element: Option<String>,

    /// Raw failure message
    #[arg(long)]
    pub error: String,

    /// Saved HTML page; enables re-scans and re-resolution
    #[arg(long, value_name = "FILE")]
    pub html: Option<PathBuf>,

    /// Visible text of the target element
    #[arg(long)]
    pub text: Option<String>,

    /// Element type of the target element
    #[arg(long = "type")]
    pub element_type: Option<String>,
}

pub async fn cmd_heal(args: HealArgs, ctx: &CliContext) -> Result<()> {
    let session = ctx.session().await?;

    let mut step = GuardedStep::new(args.step.clone(), args.page.clone());
    if let Some(element) = &args.element {
        step = step.with_element_ref(element.clone());
    }
    let mut description = ElementDescription::new();
    if let Some(text) = &args.text {
        description = description.with_text(text.clone());
    }
    if let Some(element_type) = &args.element_type {
        description = description.with_type(element_type.clone());
    }
    if !description.is_empty() {
        step = step.with_description(description);
    }

    let document = match &args.html {
        Some(path) => {
            let markup = read_markup(path).await?;
            step = step.with_markup(markup.clone());
            Some(Arc::new(PageSnapshot::from_markup(markup)) as Arc<dyn DocumentPort>)
        }
        None => None,
    };

    let orchestrator = session.orchestrator(document);
    let mut scenario = ScenarioContext::new("cli-heal");
    let kind = classify(&args.error);
    let attempt = scenario.begin_heal();
    let plan = orchestrator
        .heal(&mut scenario, &step.healing_context(&args.error, kind, attempt))
        .await;

    ctx.output().emit(&plan, || {
        println!("Failure kind: {}", kind);
        println!(
            "Recoverable: {} ({})",
            if plan.can_recover { "yes" } else { "no" },
            plan.action
        );
        if let Some(selector) = &plan.proposed_selector {
            println!("Proposed selector: {}", selector);
        }
        if let Some(wait_ms) = plan.wait_ms {
            println!("Wait: {}ms", wait_ms);
        }
        println!("Rationale: {}", plan.rationale);
    })
}
