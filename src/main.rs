use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use soar_traffic::commands;

#[derive(Parser)]
#[command(name = "soar-traffic", version = env!("CARGO_PKG_VERSION"), about = "Airborne traffic fusion core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the traffic fusion core: ingest, fuse, and serve GDL90/FLARM-NMEA output.
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Configuration file management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default configuration file.
    Init {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the effective configuration.
    Show {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => commands::handle_run(config).await,
        Command::Config { action } => match action {
            ConfigAction::Init { config } => commands::handle_config_init(config),
            ConfigAction::Show { config } => commands::handle_config_show(config),
        },
    }
}
