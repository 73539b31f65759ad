use clap::{Parser, Subcommand};

/// commitgen - generate commit messages for staged changes with a local model
#[derive(Parser)]
#[command(name = "commitgen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Repository root (auto-detects the enclosing git root if absent)
    #[arg(short = 'C', long)]
    pub repo: Option<String>,

    /// Model to use (overrides the configured one)
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Directory for config and transient artifacts. Defaults to ~/.commitgen
    #[arg(long)]
    pub cache_dir: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a commit message from the staged changes (default)
    Generate,
    /// Provision the environment and pull the model
    Setup,
    /// Show environment and tool readiness
    Status,
}
