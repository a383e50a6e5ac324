//! Conveyor CLI tool.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(about = "Conveyor delivery pipeline CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a pipeline configuration
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "conveyor.kdl")]
        path: String,
    },
    /// Run the pipeline once against a local repository
    Run {
        /// Path to the configuration file
        #[arg(long, default_value = "conveyor.kdl")]
        config: String,
        /// Repository to build
        #[arg(long, default_value = ".")]
        repo: String,
        /// Commit sha to build instead of the repository head
        #[arg(long)]
        sha: Option<String>,
        /// Directory for run artifacts
        #[arg(long, default_value = ".conveyor/artifacts")]
        artifacts: String,
    },
    /// Serve the webhook endpoint and run the pipeline on qualifying pushes
    Serve {
        /// Path to the configuration file
        #[arg(long, default_value = "conveyor.kdl")]
        config: String,
        /// Repository to build
        #[arg(long, default_value = ".")]
        repo: String,
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: String,
        /// Webhook shared secret; signatures are unchecked when unset
        #[arg(long, env = "CONVEYOR_WEBHOOK_SECRET")]
        secret: Option<String>,
        /// Directory for run artifacts
        #[arg(long, default_value = ".conveyor/artifacts")]
        artifacts: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
        Commands::Run {
            config,
            repo,
            sha,
            artifacts,
        } => {
            commands::run::run_local(&config, &repo, sha, &artifacts).await?;
        }
        Commands::Serve {
            config,
            repo,
            addr,
            secret,
            artifacts,
        } => {
            commands::serve::serve(&config, &repo, &addr, secret, &artifacts).await?;
        }
    }

    Ok(())
}
