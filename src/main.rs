mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use itinera::config::ItineraConfig;

#[derive(Parser)]
#[command(name = "itinera", version, about = "Grounded travel Q&A over a hybrid vector + graph knowledge base")]
struct Cli {
    /// Path to a config file (defaults to ~/.itinera/config.toml)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive question loop on the terminal
    Chat {
        /// Number of vector hits per question
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Answer a single question
    Ask {
        query: String,
        /// Number of vector hits
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the assembled prompt instead of calling the generator
        #[arg(long)]
        dry_run: bool,
    },
    /// Start the MCP server
    Serve {
        /// Override the configured transport: stdio or http
        #[arg(long)]
        transport: Option<String>,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Check the knowledge database and model files
    Doctor,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.itinera/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ItineraConfig::load_from(path)?,
        None => ItineraConfig::load()?,
    };

    // Log to stderr so stdout stays clean for answers and MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Chat { top_k } => {
            let k = top_k.unwrap_or(config.retrieval.top_k);
            cli::chat::chat(&config, k).await?;
        }
        Command::Ask {
            query,
            top_k,
            dry_run,
        } => {
            let k = top_k.unwrap_or(config.retrieval.top_k);
            cli::ask::ask(&config, &query, k, dry_run).await?;
        }
        Command::Serve { transport } => {
            let transport = transport.unwrap_or_else(|| config.server.transport.clone());
            match transport.as_str() {
                "stdio" => server::serve_stdio(config).await?,
                "http" => server::serve_http(config).await?,
                other => anyhow::bail!("unknown transport: {other}. Supported: stdio, http"),
            }
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
        Command::Doctor => {
            cli::doctor::doctor(&config)?;
        }
    }

    Ok(())
}
