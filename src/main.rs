use anyhow::Result;
use chat_rag::commands::{cleanup, show_status};
use chat_rag::config::{Config, get_config_dir, run_interactive_config, show_config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "chat-rag")]
#[command(about = "Retrieval-augmented answers over chat history and uploaded documents")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the databases
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Start the HTTP API and background workers
    Serve,
    /// Show connectivity, index size and queue state
    Status,
    /// Remove finished tasks and compact storage
    Cleanup {
        /// Only remove tasks finished more than this many seconds ago
        #[arg(long)]
        older_than: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Serve => {
            let config = Config::load(&config_dir)?;
            chat_rag::server::serve(&config).await?;
        }
        Commands::Status => {
            show_status(&Config::load(&config_dir)?).await?;
        }
        Commands::Cleanup { older_than } => {
            cleanup(
                &Config::load(&config_dir)?,
                older_than.map(Duration::from_secs),
            )
            .await?;
        }
    }

    Ok(())
}
