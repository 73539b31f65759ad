use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
mod command;
mod config;
mod diff;
mod error;
mod generator;
mod process;
mod prompt;
mod provision;
mod review;
mod server;

use cli::{Cli, Commands};
use config::Storage;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging. Stdout is reserved for user interaction, so logs
    // go to stderr.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let repo = cli::resolve_repo_root(cli.repo.clone())?;
    let storage = Storage::new(cli.cache_dir.clone())?;

    let mut config = storage.load_config();
    if let Some(model) = cli.model.clone() {
        config.model = model;
    }

    match cli.command {
        Some(Commands::Setup) => command::run_setup(&repo, &storage, &config).await,
        Some(Commands::Status) => command::run_status(&repo, &storage, &config),
        Some(Commands::Generate) | None => command::run_generate(&repo, &storage, &config).await,
    }
}
