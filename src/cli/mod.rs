//! Command-line interface.

pub mod serve;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "conduit",
    version,
    about = "Multi-chain JSON-RPC router and load balancer"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the router
    Serve(ServeArgs),
    /// Validate a chain configuration file and exit
    Check(CheckArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Path of the configuration file
    #[arg(short, long, default_value = "conduit.toml")]
    pub config: PathBuf,

    /// Override the listen port
    #[arg(long)]
    pub port: Option<u16>,

    /// Override the listen host
    #[arg(long)]
    pub host: Option<String>,

    /// Override the base log level
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override the chain configuration file
    #[arg(long)]
    pub chains_file: Option<PathBuf>,

    /// Disable periodic health probing
    #[arg(long)]
    pub no_health_check: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Chain configuration file to validate
    #[arg(default_value = "chains.json")]
    pub file: PathBuf,
}

/// Validate a chain file and describe what it contains.
pub fn handle_check(args: &CheckArgs) -> Result<String, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(&args.file)?;
    let chains = crate::chains::parse_chains(&raw)?;
    let urls: usize = chains.iter().map(|chain| chain.urls.len()).sum();
    Ok(format!(
        "{}: {} chains, {} upstream URLs",
        args.file.display(),
        chains.len(),
        urls
    ))
}
