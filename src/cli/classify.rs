use anyhow::Result;
use clap::Args;

use crate::cli::context::CliContext;
use soulheal::flow::classify;

#[derive(Args, Clone, Debug)]
pub struct ClassifyArgs {
    /// Raw failure message
    pub message: String,
}

pub fn cmd_classify(args: ClassifyArgs, ctx: &CliContext) -> Result<()> {
    let kind = classify(&args.message);
    ctx.output().emit(
        &serde_json::json!({ "message": args.message, "kind": kind }),
        || println!("{}", kind),
    )
}
