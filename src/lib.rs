pub mod config;
pub mod credential;
pub mod preflight;
pub mod session;
pub mod transfer;
pub mod validate;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "hoprelay",
    version,
    about = "Relay exercise directories between the local workstation, the Orion gateway, and the Scirouter cluster host"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull the shared exercise directories from Scirouter down to the local root
    Pull,
    /// Push the local exercise directories up to Scirouter
    Push,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::TransferConfig::from_env()?;

    match cli.command {
        Commands::Pull => transfer::pull(&config)?,
        Commands::Push => transfer::push(&config)?,
    }
    Ok(())
}
