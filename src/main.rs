//! # AA Chat CLI (`aa-chat`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `aa-chat serve` | Start the web chat server |
//! | `aa-chat chat` | Chat in the terminal |
//! | `aa-chat ask "<question>"` | Ask one question and print the answer |
//!
//! Secrets are read from the environment: `LLAMACLOUD_API_KEY`,
//! `OPENROUTER_API_KEY`, `PIPELINE_ID`, and optionally `APP_PASSWORD`.
//!
//! ```bash
//! export LLAMACLOUD_API_KEY=... OPENROUTER_API_KEY=... PIPELINE_ID=...
//! aa-chat serve --config ./config/aa-chat.toml
//! aa-chat ask "What is step 4?"
//! ```

use aa_chat::{config, server, terminal};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "./config/aa-chat.toml";

/// AA Chat — ask questions about Alcoholics Anonymous literature.
#[derive(Parser)]
#[command(
    name = "aa-chat",
    about = "AA Chat — ask questions about Alcoholics Anonymous literature",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/aa-chat.toml`; if that file does not exist the
    /// built-in defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web chat server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,

    /// Chat in the terminal.
    ///
    /// Reads one question per line. `/history` prints the transcript and
    /// `/quit` ends the session.
    Chat,

    /// Ask a single question and print the answer.
    Ask {
        /// The question.
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (config_path, allow_missing) = match cli.config {
        Some(path) => (path, false),
        None => (PathBuf::from(DEFAULT_CONFIG), true),
    };
    let cfg = config::load_config(&config_path, allow_missing)?;
    let secrets = config::Secrets::from_env()?;
    tracing::debug!(?secrets, variant = cfg.chat.variant.as_str(), "configuration loaded");

    match cli.command {
        Commands::Serve => server::run_server(&cfg, &secrets).await?,
        Commands::Chat => terminal::run_chat(&cfg, &secrets).await?,
        Commands::Ask { question } => terminal::run_ask(&cfg, &secrets, &question).await?,
    }

    Ok(())
}
