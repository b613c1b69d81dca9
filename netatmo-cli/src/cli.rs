use anyhow::Context;
use clap::{Parser, Subcommand};
use netatmo_core::{Collector, Config};
use std::path::PathBuf;
use tracing::info;

use crate::prompt::TerminalPrompt;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "netatmo", version, about = "Export Netatmo weather station readings to OpenTelemetry")]
pub struct Cli {
    /// Path to the config file (created with defaults when missing).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one collection cycle (default).
    Collect,

    /// Obtain a new refresh token through the browser, even if one is stored.
    ///
    /// Without a terminal the code is read as one line from stdin.
    Authorize,

    /// Write the default config file if it does not exist and print its path.
    InitConfig,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };

        let config = Config::load_or_create(&config_path)?;
        info!(path = %config_path.display(), "Configuration loaded");

        match self.command.unwrap_or(Command::Collect) {
            Command::Collect => {
                let collector = Collector::new(config, Box::new(TerminalPrompt));
                let report = collector.run_once().await?;
                info!(
                    readings = report.readings.len(),
                    recorded = report.recorded,
                    telemetry = %report.telemetry,
                    "Collection cycle finished"
                );
            }
            Command::Authorize => {
                let collector = Collector::new(config, Box::new(TerminalPrompt));
                let mut credentials = collector.load_credentials();
                collector
                    .authorize(&mut credentials)
                    .await
                    .context("Authorization failed")?;
                println!("Refresh token stored in {}", collector.config().files.env_file.display());
            }
            Command::InitConfig => {
                println!("{}", config_path.display());
            }
        }

        Ok(())
    }
}
