//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state management

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;

use crate::config::Config;
use crate::generators::{ChallengerClient, DefenderClient};
use crate::orchestrator::TurnOrchestrator;
use crate::storage::SqliteStorage;

/// Application state shared across handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage backend.
    pub storage: SqliteStorage,
    /// Challenger backend client, kept for health checks.
    pub challenger: Arc<ChallengerClient>,
    /// Defender backend client, kept for health checks.
    pub defender: Arc<DefenderClient>,
    /// The debate turn orchestrator.
    pub orchestrator: TurnOrchestrator,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: Config,
        storage: SqliteStorage,
        challenger: ChallengerClient,
        defender: DefenderClient,
    ) -> Self {
        let challenger = Arc::new(challenger);
        let defender = Arc::new(defender);
        let orchestrator = TurnOrchestrator::new(
            storage.clone(),
            challenger.clone(),
            defender.clone(),
        );

        Self {
            config,
            storage,
            challenger,
            defender,
            orchestrator,
        }
    }
}

/// Shared, reference-counted application state.
pub type SharedState = Arc<AppState>;
