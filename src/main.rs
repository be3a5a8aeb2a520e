//! logsift - Main Entry Point
//!
//! Serves the detection endpoint, or runs detection on a log file.

use clap::Parser;
use logsift::cli::{cmd_detect, cmd_score, cmd_serve, Cli, Commands};
use logsift::server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `detect` output stays pipeable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logsift=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port, host }) => {
            cmd_serve(&host, port).await?;
        }
        Some(Commands::Detect { input, json, model }) => {
            cmd_detect(input.as_deref(), json, model.to_config())?;
        }
        Some(Commands::Score { input, contamination, model }) => {
            cmd_score(input.as_deref(), contamination, model.to_config())?;
        }
        None => {
            // Default: serve with environment configuration
            let config = ServerConfig::default();
            cmd_serve(&config.host, config.port).await?;
        }
    }

    Ok(())
}
