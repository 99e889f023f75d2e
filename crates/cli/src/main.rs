//! Strata CLI: inspect context windows and assembled prompts.
//!
//! Commands:
//! - `window`   : Build a conversation window from a JSON history file
//! - `assemble` : Assemble the instructional prompt from a workspace directory
//! - `models`   : Show context-window sizes and derived budgets
//! - `config`   : Print the effective (or default) configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use strata_config::AppConfig;
use strata_context::OperatingMode;

mod commands;
mod sources;

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Strata: budgeted context windows and tiered prompts for LLM agents",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.strata/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a conversation window from a JSON history file
    Window {
        /// JSON array of messages
        #[arg(long)]
        history: PathBuf,

        /// Derive the budget from this model's context window
        #[arg(long)]
        model: Option<String>,

        /// Message ID to pin (repeatable)
        #[arg(long = "pin")]
        pins: Vec<String>,

        /// Tokens already used by the system prompt
        #[arg(long, default_value_t = 0)]
        system_tokens: usize,

        /// Print the window as JSON
        #[arg(long)]
        json: bool,
    },

    /// Assemble the instructional prompt from a workspace directory
    Assemble {
        /// Directory holding IDENTITY.md, MEMORY.md, docs/, jobs.toml, ...
        #[arg(long)]
        workspace: PathBuf,

        /// Operating mode: chat, monitor, scheduled_job, sub_task, vision, manual_control
        #[arg(long, default_value = "chat")]
        mode: OperatingMode,

        /// The user's message for this turn
        #[arg(short, long)]
        message: Option<String>,

        /// Override the configured model
        #[arg(long)]
        model: Option<String>,

        /// Print the structured context as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show context-window sizes and derived budgets
    Models {
        /// Model identifiers
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Print built-in defaults instead
        #[arg(long)]
        default: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Window {
            history,
            model,
            pins,
            system_tokens,
            json,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let args = commands::window::WindowArgs {
                history,
                model,
                pins,
                system_tokens,
                json,
            };
            commands::window::run(&config, args)?
        }
        Commands::Assemble {
            workspace,
            mode,
            message,
            model,
            json,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let args = commands::assemble::AssembleArgs {
                workspace,
                mode,
                message,
                model,
                json,
            };
            commands::assemble::run(&config, args)?
        }
        Commands::Models { ids } => {
            let config = load_config(cli.config.as_ref())?;
            commands::models::run(&config, &ids)
        }
        Commands::Config { default } => {
            if default {
                commands::config_cmd::show_default()
            } else {
                let config = load_config(cli.config.as_ref())?;
                commands::config_cmd::show(&config)?
            }
        }
    }

    Ok(())
}
