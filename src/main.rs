use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use casebridge::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "casebridge",
    about = "Kafka-to-TheHive incident pusher with HBase event enrichment",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (consume loop + metrics listener)
    Serve {
        /// Path to the TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Parse the config file and print the effective configuration
    CheckConfig {
        /// Path to the TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(&path),
        None => Ok(AppConfig::load_or_default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let config = load_config(config)?;
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                        tracing_subscriber::EnvFilter::new(config.logging.level.clone())
                    }),
                )
                .init();

            tracing::info!("starting casebridge daemon");
            if let Err(err) = casebridge::serve(config).await {
                // Leave the offset where it is; the supervisor restarts us
                // and Kafka redelivers from the last committed message.
                tracing::error!(error = %err, "pipeline failed");
                std::process::exit(1);
            }
        }
        Commands::CheckConfig { config } => {
            let config = load_config(config)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
