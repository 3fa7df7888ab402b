//! SLAMD Discovery - Main Entry Point

use clap::Parser;
use slamd_discovery::cli::{cmd_run, cmd_validate, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slamd_discovery=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { data, config, output, top } => {
            cmd_run(&data, &config, output.as_deref(), top)?;
        }
        Commands::Validate { data, config } => {
            cmd_validate(&data, &config)?;
        }
    }

    Ok(())
}
