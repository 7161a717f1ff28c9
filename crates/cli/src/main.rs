//! Sitewright CLI — the main entry point.
//!
//! Commands:
//! - `chat`   — Interactive session, one agent turn per line
//! - `run`    — A single agent turn, printed as JSON
//! - `ask`    — Send one prompt straight to the model
//! - `init`   — Write the default config and system prompt
//! - `tools`  — List the registered tools

use clap::{Parser, Subcommand};

mod commands;

use commands::Overrides;

#[derive(Parser)]
#[command(
    name = "sitewright",
    about = "Sitewright — an LLM agent that inspects and clones websites",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Maximum model calls per turn
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    max_steps: Option<u32>,

    /// Override the configured model
    #[arg(long, global = true)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent interactively
    Chat,

    /// Run a single agent turn and print the outcome as JSON
    Run {
        /// The task for the agent
        #[arg(short, long)]
        message: String,
    },

    /// Send one prompt to the model without the agent loop
    Ask {
        /// The prompt text
        prompt: String,

        /// Wait for the whole reply instead of streaming tokens
        #[arg(long)]
        no_stream: bool,
    },

    /// Write the default config.toml and system_prompt.md
    Init,

    /// List the registered tools
    Tools,
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

    let overrides = Overrides {
        max_steps: cli.max_steps,
        model: cli.model,
    };

    match cli.command {
        Commands::Chat => commands::chat::run(&overrides).await?,
        Commands::Run { message } => commands::run::run(&overrides, &message).await?,
        Commands::Ask { prompt, no_stream } => commands::ask::run(&overrides, &prompt, !no_stream).await?,
        Commands::Init => commands::init::run().await?,
        Commands::Tools => commands::tools::run(&overrides).await?,
    }

    Ok(())
}
