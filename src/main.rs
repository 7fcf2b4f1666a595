//! Insider Graph CLI - main entry point

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use insider_graph::{commands, metrics, Config};

#[derive(Parser)]
#[command(name = "insider_graph")]
#[command(about = "News knowledge graph with GraphRAG question answering", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a YAML config file (defaults to ./config.yml, then ../config.yml)
    #[arg(short, long, env = "INSIDER_GRAPH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API and run scheduled ingestion (default)
    Serve,

    /// Run one ingestion pass over the configured feed
    Ingest,

    /// Push the built-in demo articles through the pipeline
    Simulate {
        /// Only process the first N demo articles
        #[arg(short, long)]
        limit: Option<usize>,

        /// Pause between articles in milliseconds
        #[arg(long, default_value = "1000")]
        delay_ms: u64,
    },

    /// Ask the graph a question
    Ask {
        /// The question
        question: String,
    },

    /// Show store statistics and a few sample entities
    Check,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Serve => "serve",
            Commands::Ingest => "ingest",
            Commands::Simulate { .. } => "simulate",
            Commands::Ask { .. } => "ask",
            Commands::Check => "check",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("insider_graph=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from_file(path)?,
        None => Config::new(),
    };
    let command = cli.command.unwrap_or(Commands::Serve);

    let command_name = command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(command, config).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(command: Commands, config: Config) -> anyhow::Result<()> {
    match command {
        Commands::Serve => {
            commands::serve::run(config).await?;
        }
        Commands::Ingest => {
            commands::ingest::run(config).await?;
        }
        Commands::Simulate { limit, delay_ms } => {
            commands::simulate::run(config, limit, Duration::from_millis(delay_ms)).await?;
        }
        Commands::Ask { question } => {
            commands::ask::run(config, &question).await?;
        }
        Commands::Check => {
            commands::check::run(config).await?;
        }
    }

    Ok(())
}
