use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::SharedState;
use crate::error::{McpError, McpResult, OrchestratorError};
use crate::generators::{Challenger, Defender};
use crate::orchestrator::TurnAction;
use crate::storage::{DebateSession, Storage};

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        "debate_start" => handle_debate_start(state, arguments).await,
        "debate_list" => handle_debate_list(state, arguments).await,
        "debate_messages" => handle_debate_messages(state, arguments).await,
        "debate_turn" => handle_debate_turn(state, arguments).await,
        "health_check" => handle_health_check(state).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

/// Handle debate_start: create a session with a fixed topic and role
async fn handle_debate_start(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct StartParams {
        user_id: String,
        topic: String,
        #[serde(default)]
        is_user_apologist: bool,
    }

    let params: StartParams = parse_arguments("debate_start", arguments)?;

    if params.topic.trim().is_empty() {
        return Err(McpError::InvalidParameters {
            tool_name: "debate_start".to_string(),
            message: "topic cannot be empty".to_string(),
        });
    }

    let session = DebateSession::new(params.user_id, params.topic, params.is_user_apologist);
    state
        .storage
        .create_session(&session)
        .await
        .map_err(|e| McpError::ExecutionFailed {
            message: e.to_string(),
        })?;

    info!(session_id = %session.id, "Debate session created");

    serde_json::to_value(session).map_err(McpError::Json)
}

/// Handle debate_list: a user's sessions, most recently updated first
async fn handle_debate_list(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct ListParams {
        user_id: String,
    }

    let params: ListParams = parse_arguments("debate_list", arguments)?;

    let sessions = state
        .storage
        .get_user_sessions(&params.user_id)
        .await
        .map_err(|e| McpError::ExecutionFailed {
            message: e.to_string(),
        })?;

    serde_json::to_value(sessions).map_err(McpError::Json)
}

/// Handle debate_messages: a session's ordered transcript
async fn handle_debate_messages(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct MessagesParams {
        session_id: String,
    }

    let params: MessagesParams = parse_arguments("debate_messages", arguments)?;

    let messages = state
        .storage
        .get_session_messages(&params.session_id)
        .await
        .map_err(|e| McpError::ExecutionFailed {
            message: e.to_string(),
        })?;

    serde_json::to_value(messages).map_err(McpError::Json)
}

/// Handle debate_turn: the single turn-processing operation
async fn handle_debate_turn(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct TurnParams {
        session_id: String,
        action: TurnAction,
        #[serde(default)]
        content: Option<String>,
    }

    let params: TurnParams = parse_arguments("debate_turn", arguments)?;

    match state
        .orchestrator
        .process_turn(&params.session_id, params.content.as_deref(), params.action)
        .await
    {
        Ok(outcome) => serde_json::to_value(outcome).map_err(McpError::Json),
        // Partial success: a message committed before the follow-up
        // generation failed. Callers must not re-submit the committed
        // message, so it rides along in the structured error body.
        Err(OrchestratorError::TurnIncomplete { appended, source }) => {
            let detail = json!({
                "error": "turn_incomplete",
                "message": source.to_string(),
                "appended": *appended,
            });
            Err(McpError::ExecutionFailed {
                message: detail.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Handle health_check: probe both generator backends
async fn handle_health_check(state: &SharedState) -> McpResult<Value> {
    let (challenger_healthy, defender_healthy) = tokio::join!(
        state.challenger.health_check(),
        state.defender.health_check()
    );

    let healthy = challenger_healthy && defender_healthy;

    Ok(json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "services": {
            "challenger": {
                "status": if challenger_healthy { "healthy" } else { "unhealthy" },
            },
            "defender": {
                "status": if defender_healthy { "healthy" } else { "unhealthy" },
            },
        },
    }))
}

/// Parse tool arguments into a typed parameter struct
fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}
