//! # MCP Debate Trainer Server
//!
//! A Model Context Protocol (MCP) server for turn-based debate practice.
//! A human argues either side of a topic against an AI opponent; the server
//! persists each session's message log and orchestrates whose turn it is,
//! which generation backend to call, and what to append.
//!
//! ## Features
//!
//! - **Role-fixed sessions**: each session pins the human to the apologist
//!   or skeptic side for its whole lifetime
//! - **Turn orchestration**: derived-state classification decides, per turn,
//!   whether to open, follow up, defend, or wait for the human
//! - **Expert coaching**: in apologist mode, a model answer can be proposed
//!   and adopted as the human's own turn
//! - **Two generation backends**: a challenger for skeptical questions and a
//!   defender for apologetic responses
//! - **Per-session serialization**: concurrent submissions for one session
//!   queue instead of racing into duplicate AI turns
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → MCP Server (Rust) → Challenger / Defender (HTTP)
//!                    ↓
//!              SQLite (Sessions, Messages)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mcp_debate_trainer::{Config, AppState, McpServer};
//! use mcp_debate_trainer::generators::{ChallengerClient, DefenderClient};
//! use mcp_debate_trainer::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let challenger = ChallengerClient::new(&config.challenger, config.request.clone())?;
//!     let defender = DefenderClient::new(&config.defender, config.request.clone())?;
//!     let state = Arc::new(AppState::new(config, storage, challenger, defender));
//!     let server = McpServer::new(state);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration management for the MCP server.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Challenger and defender generation backends.
pub mod generators;
/// Turn orchestration: state classification and generator dispatch.
pub mod orchestrator;
/// System prompts for the generation backends.
pub mod prompts;
/// MCP server implementation and request handling.
pub mod server;
/// SQLite storage layer for persistence.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use orchestrator::{NextAction, TurnAction, TurnOrchestrator, TurnOutcome};
pub use server::{AppState, McpServer, SharedState};
