//! inkrelay - Streaming LLM relay with SSE normalization
//!
//! A small proxy that accepts generation requests from a browser writing
//! tool and relays them to OpenAI-compatible or Ollama endpoints, emitting
//! one uniform SSE stream regardless of upstream dialect.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inkrelay::config::Config;
use inkrelay::relay::run_server;

#[derive(Parser)]
#[command(name = "inkrelay")]
#[command(about = "Streaming LLM relay with SSE normalization")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "inkrelay.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "inkrelay.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkrelay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            tracing::info!(config = %config, "Loading configuration");
            let mut config = Config::load(&config)?;

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            run_server(config).await
        }

        Commands::Check { config } => {
            let config = Config::from_file(&config)?;
            println!("Configuration OK");
            println!("  listen:          {}", config.server.listen);
            println!("  allowed origins: {}", config.cors.allowed_origins.join(", "));
            println!("  upstream timeout: {}s", config.upstream.timeout_secs);
            Ok(())
        }
    }
}
