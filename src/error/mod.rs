use thiserror::Error;

use crate::storage::DebateMessage;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Errors from the upstream text-generation backends
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("{backend} unavailable: {message} (retries: {retries})")]
    Unavailable {
        backend: &'static str,
        message: String,
        retries: u32,
    },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("{backend} returned an empty completion")]
    EmptyCompletion { backend: &'static str },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Turn-orchestration errors surfaced to the request layer
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Debate session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Action {action} not valid for this session: {reason}")]
    InvalidRoleTransition { action: String, reason: String },

    #[error("No prior challenge found in session {session_id}")]
    NoPriorChallengeFound { session_id: String },

    #[error("Message content is required for {action}")]
    MissingContent { action: String },

    #[error("Generation failed: {0}")]
    Generation(#[from] GeneratorError),

    /// The compound expert-adoption turn committed its first append and then
    /// failed to generate the follow-up. The appended message is never rolled
    /// back; callers retry only the generation step.
    #[error("Turn partially completed, follow-up generation failed: {source}")]
    TurnIncomplete {
        appended: Box<DebateMessage>,
        #[source]
        source: GeneratorError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<OrchestratorError> for McpError {
    fn from(err: OrchestratorError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for generator calls
pub type GeneratorResult<T> = Result<T, GeneratorError>;

/// Result type alias for turn orchestration
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;
