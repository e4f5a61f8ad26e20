//! Storage layer for debate session persistence.
//!
//! This module provides SQLite-based storage for debate sessions and their
//! append-only message logs.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageResult;

/// A debate session pairing one user with the AI opponent on a fixed topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateSession {
    /// Unique session identifier.
    pub id: String,
    /// Owning user identifier (opaque to this crate).
    pub user_id: String,
    /// The debate topic, fixed at creation.
    pub topic: String,
    /// Which side the human argues. True means the human defends the topic
    /// and the AI challenges; false is the reverse. Never changes after
    /// creation.
    pub is_user_apologist: bool,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session last received a turn.
    pub updated_at: DateTime<Utc>,
}

/// A single turn in a session's append-only message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateMessage {
    /// Unique message identifier.
    pub id: String,
    /// Parent session ID.
    pub session_id: String,
    /// The message text.
    pub content: String,
    /// Who produced the message.
    pub sender_type: SenderType,
    /// Display marker set when a user adopted an expert-generated response
    /// as their own turn. Not a distinct sender type.
    #[serde(default)]
    pub is_expert_response: bool,
    /// When the message was appended.
    pub created_at: DateTime<Utc>,
}

/// The author of a debate message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SenderType {
    /// The human participant.
    User,
    /// The AI opponent.
    Ai,
    /// Legacy display tag for expert proposals. The orchestrator never
    /// persists this; adopted proposals are stored as [`SenderType::User`]
    /// with the expert marker.
    Expert,
}

impl std::fmt::Display for SenderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SenderType::User => write!(f, "USER"),
            SenderType::Ai => write!(f, "AI"),
            SenderType::Expert => write!(f, "EXPERT"),
        }
    }
}

impl std::str::FromStr for SenderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USER" => Ok(SenderType::User),
            "AI" => Ok(SenderType::Ai),
            "EXPERT" => Ok(SenderType::Expert),
            _ => Err(format!("Unknown sender type: {}", s)),
        }
    }
}

impl DebateSession {
    /// Create a new session owned by `user_id` on `topic`.
    pub fn new(user_id: impl Into<String>, topic: impl Into<String>, is_user_apologist: bool) -> Self {
        let now = Utc::now();
        Self {
            id: format!("debate-{}", Uuid::new_v4()),
            user_id: user_id.into(),
            topic: topic.into(),
            is_user_apologist,
            created_at: now,
            updated_at: now,
        }
    }
}

impl DebateMessage {
    /// Create a new message in `session_id`.
    pub fn new(
        session_id: impl Into<String>,
        content: impl Into<String>,
        sender_type: SenderType,
    ) -> Self {
        Self {
            id: format!("msg-{}", Uuid::new_v4()),
            session_id: session_id.into(),
            content: content.into(),
            sender_type,
            is_expert_response: false,
            created_at: Utc::now(),
        }
    }

    /// Mark this message as adopted expert content.
    pub fn with_expert_marker(mut self) -> Self {
        self.is_expert_response = true;
        self
    }
}

/// Storage trait for database operations.
///
/// Messages are append-only; sessions are immutable apart from their
/// `updated_at` stamp.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist a new debate session.
    async fn create_session(&self, session: &DebateSession) -> StorageResult<()>;

    /// Fetch a session by ID.
    async fn get_session(&self, id: &str) -> StorageResult<Option<DebateSession>>;

    /// Fetch all sessions owned by a user, most recently updated first.
    async fn get_user_sessions(&self, user_id: &str) -> StorageResult<Vec<DebateSession>>;

    /// Bump a session's `updated_at` to now.
    async fn touch_session(&self, id: &str) -> StorageResult<()>;

    /// Append a message to a session's log.
    async fn create_message(&self, message: &DebateMessage) -> StorageResult<()>;

    /// Fetch a session's messages in creation order. Ties on `created_at`
    /// resolve in insertion order.
    async fn get_session_messages(&self, session_id: &str) -> StorageResult<Vec<DebateMessage>>;

    /// Fetch the most recently appended message of a session, if any.
    async fn get_latest_message(&self, session_id: &str) -> StorageResult<Option<DebateMessage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_type_roundtrip() {
        for (variant, text) in [
            (SenderType::User, "USER"),
            (SenderType::Ai, "AI"),
            (SenderType::Expert, "EXPERT"),
        ] {
            assert_eq!(variant.to_string(), text);
            assert_eq!(text.parse::<SenderType>().unwrap(), variant);
        }

        assert!("GHOST".parse::<SenderType>().is_err());
    }

    #[test]
    fn test_session_new_sets_timestamps() {
        let session = DebateSession::new("user-1", "the problem of evil", true);
        assert!(session.id.starts_with("debate-"));
        assert_eq!(session.created_at, session.updated_at);
        assert!(session.is_user_apologist);
    }

    #[test]
    fn test_message_expert_marker() {
        let msg = DebateMessage::new("sess-1", "text", SenderType::User);
        assert!(!msg.is_expert_response);

        let adopted = msg.with_expert_marker();
        assert!(adopted.is_expert_response);
        assert_eq!(adopted.sender_type, SenderType::User);
    }
}
