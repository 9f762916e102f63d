use clap::{Parser, Subcommand};
use rag_chatbot::Result;
use rag_chatbot::commands::{ask, ingest, serve, show_config, show_status, write_config};
use rag_chatbot::config::{Config, resolve_config_dir};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "rag_chatbot=info,tower_http=info";

#[derive(Parser)]
#[command(name = "rag-chatbot")]
#[command(about = "Chat with your PDF documents using retrieval-augmented generation")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to ~/.rag-chatbot)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web UI with chat and document upload tabs
    Serve {
        /// Address to bind, overriding SERVER_HOST
        #[arg(long)]
        host: Option<String>,
        /// Port to bind, overriding SERVER_PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Add PDF files to the document collection
    Ingest {
        /// PDF files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Ask a single question about the ingested documents
    Ask {
        question: String,
    },
    /// Check the embedding service, language model and vector store
    Status,
    /// Show or write the effective configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(resolve_config_dir(cli.config_dir)?)?;

    match cli.command {
        Commands::Serve { host, port } => {
            serve(config, host, port).await?;
        }
        Commands::Ingest { files } => {
            ingest(&config, &files).await?;
        }
        Commands::Ask { question } => {
            ask(&config, &question).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                write_config(&config)?;
            }
        }
    }

    Ok(())
}
