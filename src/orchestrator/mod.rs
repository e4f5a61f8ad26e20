//! The debate turn orchestrator.
//!
//! Given a session's fixed role and its message history, [`TurnOrchestrator`]
//! decides what the next conversational action is, invokes the matching
//! generator backend, and persists the results. All turn processing for one
//! session is serialized; different sessions proceed concurrently.

mod transition;

pub use transition::{classify, NextStep, Role};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::generators::{Challenger, Defender};
use crate::prompts::NO_ATTEMPT_PLACEHOLDER;
use crate::storage::{DebateMessage, DebateSession, SenderType, SqliteStorage, Storage};

/// A caller-requested debate action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnAction {
    /// Start (or re-enter) the debate; generates the opening challenge for
    /// apologist sessions with an empty history.
    Begin,
    /// Submit the human's next message.
    UserMessage,
    /// Request an expert-response proposal (apologist mode only).
    GetExpertResponse,
    /// Adopt a previously proposed expert response as the human's turn.
    UseExpertResponse,
}

impl std::fmt::Display for TurnAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TurnAction::Begin => "begin",
            TurnAction::UserMessage => "user_message",
            TurnAction::GetExpertResponse => "get_expert_response",
            TurnAction::UseExpertResponse => "use_expert_response",
        };
        write!(f, "{}", name)
    }
}

/// What the caller should do after a completed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    /// The human owes the next message.
    AwaitingUserInput,
    /// An AI turn is owed but has not been generated yet.
    AiResponsePending,
    /// The human owes the next message and may request expert help.
    ExpertAvailable,
}

/// Result of one orchestrated turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// Messages appended to the log by this turn, in append order.
    pub appended: Vec<DebateMessage>,
    /// What the caller should do next.
    pub next_action: NextAction,
    /// Proposed expert content. Returned, not persisted; the caller adopts
    /// it with [`TurnAction::UseExpertResponse`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_expert: Option<String>,
}

/// Per-session async locks keyed by session id.
///
/// Entries are weak so locks vanish with their last in-flight turn; the map
/// is pruned opportunistically once it grows.
#[derive(Default)]
struct SessionLocks {
    inner: Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    fn acquire(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if locks.len() > 128 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(session_id).and_then(Weak::upgrade) {
            return existing;
        }

        let lock = Arc::new(tokio::sync::Mutex::new(()));
        locks.insert(session_id.to_string(), Arc::downgrade(&lock));
        lock
    }
}

/// Orchestrates debate turns: classifies state, dispatches to the right
/// generator, and appends results to the session log.
pub struct TurnOrchestrator {
    storage: SqliteStorage,
    challenger: Arc<dyn Challenger>,
    defender: Arc<dyn Defender>,
    locks: SessionLocks,
}

impl TurnOrchestrator {
    /// Create a new orchestrator over the given storage and backends.
    pub fn new(
        storage: SqliteStorage,
        challenger: Arc<dyn Challenger>,
        defender: Arc<dyn Defender>,
    ) -> Self {
        Self {
            storage,
            challenger,
            defender,
            locks: SessionLocks::default(),
        }
    }

    /// Process one turn for a session.
    ///
    /// The whole read-history, generate, append sequence runs under the
    /// session's lock, so concurrent submissions for the same session
    /// serialize instead of racing into duplicate AI turns.
    pub async fn process_turn(
        &self,
        session_id: &str,
        content: Option<&str>,
        action: TurnAction,
    ) -> OrchestratorResult<TurnOutcome> {
        let lock = self.locks.acquire(session_id);
        let _guard = lock.lock().await;

        let session = self
            .storage
            .get_session(session_id)
            .await?
            .ok_or_else(|| OrchestratorError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        let role = Role::from_session(session.is_user_apologist);
        let history = self.storage.get_session_messages(session_id).await?;

        check_alternation(session_id, &history);

        debug!(
            session_id = %session_id,
            role = %role,
            action = %action,
            history_len = history.len(),
            "Processing turn"
        );

        match action {
            TurnAction::Begin => self.begin(&session, role, &history).await,
            TurnAction::UserMessage => {
                let content = require_content(content, action)?;
                self.user_message(&session, role, &history, content).await
            }
            TurnAction::GetExpertResponse => self.expert_proposal(&session, role, &history).await,
            TurnAction::UseExpertResponse => {
                let content = require_content(content, action)?;
                self.adopt_expert(&session, role, &history, content).await
            }
        }
    }

    /// Start a debate. Only an apologist session with an empty history
    /// generates anything; re-entry on a non-empty session is idempotent.
    async fn begin(
        &self,
        session: &DebateSession,
        role: Role,
        history: &[DebateMessage],
    ) -> OrchestratorResult<TurnOutcome> {
        let last = last_conversational(history);

        if !history.is_empty() {
            return Ok(TurnOutcome {
                appended: Vec::new(),
                next_action: idle_next_action(role, last),
                proposed_expert: None,
            });
        }

        match role {
            Role::Apologist => {
                let opening = self.challenger.generate_opening(&session.topic).await?;
                let message = self
                    .append(DebateMessage::new(&session.id, opening, SenderType::Ai))
                    .await?;

                info!(session_id = %session.id, "Opening challenge appended");

                Ok(TurnOutcome {
                    appended: vec![message],
                    next_action: NextAction::AwaitingUserInput,
                    proposed_expert: None,
                })
            }
            // The skeptic session opens with the human's question.
            Role::Skeptic => Ok(TurnOutcome {
                appended: Vec::new(),
                next_action: NextAction::AwaitingUserInput,
                proposed_expert: None,
            }),
        }
    }

    /// Persist the human's message and generate the AI's reply.
    async fn user_message(
        &self,
        session: &DebateSession,
        role: Role,
        history: &[DebateMessage],
        content: &str,
    ) -> OrchestratorResult<TurnOutcome> {
        match role {
            Role::Apologist => {
                // Validate before any append: a follow-up needs the prior
                // challenge to respond to.
                let prior_question = last_of(history, SenderType::Ai)
                    .ok_or_else(|| OrchestratorError::NoPriorChallengeFound {
                        session_id: session.id.clone(),
                    })?
                    .content
                    .clone();

                let user_msg = self
                    .append(DebateMessage::new(&session.id, content, SenderType::User))
                    .await?;

                let follow_up = match self
                    .challenger
                    .generate_follow_up(&prior_question, content, &session.topic)
                    .await
                {
                    Ok(text) => text,
                    Err(e) => {
                        return Err(OrchestratorError::TurnIncomplete {
                            appended: Box::new(user_msg),
                            source: e,
                        })
                    }
                };

                let ai_msg = self
                    .append(DebateMessage::new(&session.id, follow_up, SenderType::Ai))
                    .await?;

                Ok(TurnOutcome {
                    appended: vec![user_msg, ai_msg],
                    next_action: NextAction::ExpertAvailable,
                    proposed_expert: None,
                })
            }
            Role::Skeptic => {
                let user_msg = self
                    .append(DebateMessage::new(&session.id, content, SenderType::User))
                    .await?;

                // History context is the log as it stood before this turn;
                // the new content rides along as the live question.
                let defense = match self
                    .defender
                    .generate_response(content, history, &session.topic)
                    .await
                {
                    Ok(text) => text,
                    Err(e) => {
                        return Err(OrchestratorError::TurnIncomplete {
                            appended: Box::new(user_msg),
                            source: e,
                        })
                    }
                };

                let ai_msg = self
                    .append(DebateMessage::new(&session.id, defense, SenderType::Ai))
                    .await?;

                Ok(TurnOutcome {
                    appended: vec![user_msg, ai_msg],
                    next_action: NextAction::AwaitingUserInput,
                    proposed_expert: None,
                })
            }
        }
    }

    /// Produce an expert-response proposal without touching the log.
    async fn expert_proposal(
        &self,
        session: &DebateSession,
        role: Role,
        history: &[DebateMessage],
    ) -> OrchestratorResult<TurnOutcome> {
        if role != Role::Apologist {
            return Err(OrchestratorError::InvalidRoleTransition {
                action: TurnAction::GetExpertResponse.to_string(),
                reason: "expert responses are only available in apologist mode".to_string(),
            });
        }

        let question = last_of(history, SenderType::Ai)
            .ok_or_else(|| OrchestratorError::NoPriorChallengeFound {
                session_id: session.id.clone(),
            })?
            .content
            .clone();

        let attempt = last_of(history, SenderType::User)
            .map(|m| m.content.clone())
            .unwrap_or_else(|| NO_ATTEMPT_PLACEHOLDER.to_string());

        let proposal = self
            .defender
            .generate_expert_response(&question, &attempt, history, &session.topic)
            .await?;

        info!(session_id = %session.id, "Expert response proposed");

        Ok(TurnOutcome {
            appended: Vec::new(),
            next_action: NextAction::ExpertAvailable,
            proposed_expert: Some(proposal),
        })
    }

    /// Adopt an expert proposal as the human's turn and generate the next
    /// challenge.
    ///
    /// Compound and deliberately non-transactional: the adopted message is
    /// committed first and never rolled back. A follow-up generation failure
    /// surfaces as [`OrchestratorError::TurnIncomplete`] carrying the
    /// committed message so callers retry only the generation.
    async fn adopt_expert(
        &self,
        session: &DebateSession,
        role: Role,
        history: &[DebateMessage],
        content: &str,
    ) -> OrchestratorResult<TurnOutcome> {
        if role != Role::Apologist {
            return Err(OrchestratorError::InvalidRoleTransition {
                action: TurnAction::UseExpertResponse.to_string(),
                reason: "expert responses are only available in apologist mode".to_string(),
            });
        }

        let prior_question = last_of(history, SenderType::Ai)
            .ok_or_else(|| OrchestratorError::NoPriorChallengeFound {
                session_id: session.id.clone(),
            })?
            .content
            .clone();

        let user_msg = self
            .append(
                DebateMessage::new(&session.id, content, SenderType::User).with_expert_marker(),
            )
            .await?;

        let follow_up = match self
            .challenger
            .generate_follow_up(&prior_question, content, &session.topic)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    session_id = %session.id,
                    message_id = %user_msg.id,
                    "Adopted expert response committed but follow-up generation failed"
                );
                return Err(OrchestratorError::TurnIncomplete {
                    appended: Box::new(user_msg),
                    source: e,
                });
            }
        };

        let ai_msg = self
            .append(DebateMessage::new(&session.id, follow_up, SenderType::Ai))
            .await?;

        Ok(TurnOutcome {
            appended: vec![user_msg, ai_msg],
            next_action: NextAction::ExpertAvailable,
            proposed_expert: None,
        })
    }

    /// Append a message and bump the session's `updated_at`.
    async fn append(&self, message: DebateMessage) -> OrchestratorResult<DebateMessage> {
        self.storage.create_message(&message).await?;
        self.storage.touch_session(&message.session_id).await?;
        Ok(message)
    }
}

/// Last message with USER/AI semantics; legacy EXPERT rows are skipped.
fn last_conversational(history: &[DebateMessage]) -> Option<SenderType> {
    history
        .iter()
        .rev()
        .find(|m| m.sender_type != SenderType::Expert)
        .map(|m| m.sender_type)
}

/// Last message of the given sender type.
fn last_of(history: &[DebateMessage], sender: SenderType) -> Option<&DebateMessage> {
    history.iter().rev().find(|m| m.sender_type == sender)
}

/// Next action for a turn that performed no generation.
fn idle_next_action(role: Role, last: Option<SenderType>) -> NextAction {
    match classify(role, last) {
        NextStep::OpeningChallenge | NextStep::FollowUpChallenge | NextStep::DefendReply => {
            NextAction::AiResponsePending
        }
        NextStep::AwaitUser => match role {
            Role::Apologist if last.is_some() => NextAction::ExpertAvailable,
            _ => NextAction::AwaitingUserInput,
        },
    }
}

fn require_content<'a>(
    content: Option<&'a str>,
    action: TurnAction,
) -> OrchestratorResult<&'a str> {
    match content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(OrchestratorError::MissingContent {
            action: action.to_string(),
        }),
    }
}

/// Defensive alternation check: USER and AI must alternate once the session
/// is non-empty. Violations are logged and processing continues from the
/// last message's type; this is never fatal.
fn check_alternation(session_id: &str, history: &[DebateMessage]) {
    let conversational: Vec<&DebateMessage> = history
        .iter()
        .filter(|m| m.sender_type != SenderType::Expert)
        .collect();

    for pair in conversational.windows(2) {
        if pair[0].sender_type == pair[1].sender_type {
            warn!(
                session_id = %session_id,
                first = %pair[0].id,
                second = %pair[1].id,
                sender = %pair[0].sender_type,
                "History violates alternation invariant; continuing from last message"
            );
        }
    }
}
