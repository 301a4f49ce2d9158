//! Codewright - conversational coding agent
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;

use clap::Parser;
use codewright::{Config, Orchestrator, ProviderType, Repl};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Codewright - conversational coding agent
#[derive(Parser, Debug)]
#[command(name = "codewright")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to start with
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// LLM provider (ollama or openrouter)
    #[arg(long)]
    provider: Option<String>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,

    /// Project root the tools operate in
    #[arg(long, short = 'w')]
    workspace: Option<PathBuf>,

    /// Session snapshot file
    #[arg(long)]
    session: Option<PathBuf>,

    /// Do not load or save the session automatically
    #[arg(long)]
    no_autosave: bool,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    init_config: bool,
}

fn parse_provider(name: &str) -> anyhow::Result<ProviderType> {
    match name.to_lowercase().as_str() {
        "ollama" => Ok(ProviderType::Ollama),
        "openrouter" => Ok(ProviderType::OpenRouter),
        other => anyhow::bail!("unknown provider '{}': expected ollama or openrouter", other),
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "warn,codewright=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides. An explicit model also beats the autosaved session.
    let pinned_model = args.model.clone();
    if let Some(ref model) = args.model {
        config.models.active = model.clone();
    }

    if let Some(ref provider) = args.provider {
        config.provider = parse_provider(provider)?;
    }

    if let Some(ref workspace) = args.workspace {
        config.agent.workspace = workspace.clone();
    }

    if let Some(ref session) = args.session {
        config.agent.session_file = session.clone();
    }

    if args.debug {
        config.agent.debug = true;
    }

    if args.no_autosave {
        config.agent.autosave = false;
    }

    init_logging(config.agent.debug);

    if args.init_config {
        let path = config.save()?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        let session_path = config.session_path();
        let autosave = config.agent.autosave;

        let mut agent = Orchestrator::new(config)?;
        if autosave {
            agent.resume(&session_path, pinned_model.as_deref())?;
        }
        agent.initialize().await?;

        let response = agent.submit(&prompt).await?;
        println!("{}", response);

        if autosave {
            agent.save(&session_path)?;
        }
        return Ok(());
    }

    // Interactive REPL mode
    let mut repl = Repl::with_config(config)?.with_pinned_model(pinned_model);
    repl.run().await?;

    Ok(())
}
