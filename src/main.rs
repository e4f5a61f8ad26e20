use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mcp_debate_trainer::{
    config::Config,
    generators::{ChallengerClient, DefenderClient},
    server::{AppState, McpServer},
    storage::SqliteStorage,
};

#[derive(Parser, Debug)]
#[command(name = "mcp-debate-trainer", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server over stdio (the default)
    Serve,
    /// Initialize the database, run migrations, and exit
    InitDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::InitDb => init_db(config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "MCP Debate Trainer Server starting..."
    );

    // Initialize storage
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    // Initialize generator clients
    let challenger = match ChallengerClient::new(&config.challenger, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %config.challenger.base_url, "Challenger client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize challenger client");
            return Err(e.into());
        }
    };

    let defender = match DefenderClient::new(&config.defender, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %config.defender.base_url, "Defender client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize defender client");
            return Err(e.into());
        }
    };

    // Create application state
    let state = Arc::new(AppState::new(config, storage, challenger, defender));

    // Start MCP server
    let server = McpServer::new(state);

    info!("Server ready, waiting for requests on stdin...");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn init_db(config: Config) -> anyhow::Result<()> {
    info!(path = %config.database.path.display(), "Initializing database...");

    let storage = SqliteStorage::new(&config.database).await?;

    let tables: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(storage.pool())
            .await?;

    for (name,) in &tables {
        info!(table = %name, "Table ready");
    }

    info!("Database migrations applied successfully");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        mcp_debate_trainer::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        mcp_debate_trainer::config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
