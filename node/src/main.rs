//! STOWAGE Host Binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stowage_core::HostConfig;
use stowage_node::HostBuilder;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stowage-node")]
#[command(about = "STOWAGE Host - storage host bookkeeping daemon")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the host
    Run {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// API listen address
        #[arg(long)]
        api_addr: Option<String>,

        /// Data directory
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Write the default configuration
    InitConfig {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            api_addr,
            data_dir,
        } => {
            let config = match config {
                Some(path) => HostConfig::load(&path)?,
                None => HostConfig::default(),
            };
            init_logging(&config.log_level);

            let mut builder = HostBuilder::new().config(config);
            if let Some(data_dir) = data_dir {
                builder = builder.data_dir(data_dir);
            }
            if let Some(addr) = api_addr {
                builder = builder.api_addr(&addr);
            }

            let host = builder.build()?;
            info!("Data directory: {}", host.runtime().config().data_dir.display());
            host.start().await?;
        }

        Commands::InitConfig { output } => {
            let json = serde_json::to_string_pretty(&HostConfig::default())?;
            std::fs::write(&output, &json)?;
            println!("Configuration saved to: {}", output.display());
        }
    }

    Ok(())
}
