mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use notegate::config::NotegateConfig;

#[derive(Parser)]
#[command(name = "notegate", version, about = "Loopback control server for a markdown notes vault")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the control server on 127.0.0.1 and run until Ctrl-C
    Serve,
    /// Check a path against the configured vault without touching the disk
    CheckPath {
        /// Vault-relative path to validate
        path: String,
        /// Validate as a folder rather than a note
        #[arg(long)]
        folder: bool,
    },
    /// Report configuration and collaborator status
    Doctor,
    /// Build or refresh the search index
    Index,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = NotegateConfig::load()?;

    // Log to stderr so stdout stays clean for command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => cli::serve::serve(config).await?,
        Command::CheckPath { path, folder } => cli::check_path::check_path(&config, &path, folder)?,
        Command::Doctor => cli::doctor::doctor(&config).await?,
        Command::Index => cli::index::index(&config).await?,
    }

    Ok(())
}
