//! `strata assemble`: build the structured prompt for one turn.

use std::path::PathBuf;
use std::sync::Arc;

use strata_config::AppConfig;
use strata_context::{OperatingMode, TieredAssembler};

use crate::sources::DirectorySources;

pub struct AssembleArgs {
    pub workspace: PathBuf,
    pub mode: OperatingMode,
    pub message: Option<String>,
    pub model: Option<String>,
    pub json: bool,
}

pub fn run(config: &AppConfig, args: AssembleArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.workspace.is_dir() {
        return Err(format!("Workspace {} is not a directory", args.workspace.display()).into());
    }

    let sources = Arc::new(DirectorySources::new(&args.workspace));
    let mut assembler = TieredAssembler::from_config(sources, config);
    if let Some(model) = &args.model {
        assembler.configure_for_model(model);
    }

    let ctx = assembler.build_structured_context(args.mode, args.message.as_deref());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ctx)?);
        return Ok(());
    }

    println!("{}", ctx.combined);
    println!();
    println!("──────────────────────────────────────────");
    println!("  Mode:       {}", args.mode);
    println!("  Model:      {}", assembler.model());
    println!(
        "  Stable:     {} chars (hash {:016x})",
        ctx.stable.chars().count(),
        ctx.stable_hash
    );
    println!("  Dynamic:    {} chars", ctx.dynamic.chars().count());
    println!(
        "  Tokens:     ~{} ({:.1}% of {})",
        ctx.estimated_tokens,
        ctx.prompt_share * 100.0,
        assembler.model_context_limit()
    );
    let disabled: Vec<&str> = ctx
        .modules
        .entries()
        .iter()
        .filter(|(_, on)| !on)
        .map(|(name, _)| *name)
        .collect();
    if disabled.is_empty() {
        println!("  Disabled:   none");
    } else {
        println!("  Disabled:   {}", disabled.join(", "));
    }

    Ok(())
}
