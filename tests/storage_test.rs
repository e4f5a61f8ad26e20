//! Integration tests for the SQLite storage layer
//!
//! Tests database operations using an in-memory SQLite database.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use mcp_debate_trainer::config::DatabaseConfig;
use mcp_debate_trainer::storage::{
    DebateMessage, DebateSession, SenderType, SqliteStorage, Storage,
};

/// Create an in-memory storage instance for testing
async fn create_test_storage() -> SqliteStorage {
    SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage")
}

#[tokio::test]
async fn test_file_backed_storage_creates_parent_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = DatabaseConfig {
        path: dir.path().join("nested").join("debates.db"),
        max_connections: 1,
    };

    let storage = SqliteStorage::new(&config).await.expect("storage");

    let session = DebateSession::new("user-1", "topic", true);
    storage.create_session(&session).await.unwrap();
    let retrieved = storage.get_session(&session.id).await.unwrap();
    assert_eq!(retrieved.unwrap().id, session.id);
}

#[cfg(test)]
mod session_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_create_session() {
        let storage = create_test_storage().await;

        let session = DebateSession::new("user-1", "the problem of evil", true);
        let result = storage.create_session(&session).await;

        assert!(result.is_ok(), "Should create session successfully");
    }

    #[tokio::test]
    async fn test_get_session() {
        let storage = create_test_storage().await;

        let session = DebateSession::new("user-1", "the problem of evil", true);
        storage.create_session(&session).await.unwrap();

        let retrieved = storage.get_session(&session.id).await.unwrap();

        assert!(retrieved.is_some(), "Session should exist");
        let retrieved = retrieved.unwrap();
        assert_eq!(retrieved.id, session.id);
        assert_eq!(retrieved.topic, "the problem of evil");
        assert!(retrieved.is_user_apologist);
    }

    #[tokio::test]
    async fn test_get_nonexistent_session() {
        let storage = create_test_storage().await;

        let result = storage.get_session("nonexistent-id").await.unwrap();

        assert!(
            result.is_none(),
            "Should return None for nonexistent session"
        );
    }

    #[tokio::test]
    async fn test_get_user_sessions_ordered_by_recency() {
        let storage = create_test_storage().await;

        let mut older = DebateSession::new("user-1", "first topic", true);
        older.created_at = Utc::now() - Duration::minutes(10);
        older.updated_at = older.created_at;
        let newer = DebateSession::new("user-1", "second topic", false);
        let other_user = DebateSession::new("user-2", "unrelated", true);

        storage.create_session(&older).await.unwrap();
        storage.create_session(&newer).await.unwrap();
        storage.create_session(&other_user).await.unwrap();

        let sessions = storage.get_user_sessions("user-1").await.unwrap();

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].topic, "second topic");
        assert_eq!(sessions[1].topic, "first topic");
    }

    #[tokio::test]
    async fn test_touch_session_bumps_updated_at() {
        let storage = create_test_storage().await;

        let mut session = DebateSession::new("user-1", "topic", true);
        session.updated_at = Utc::now() - Duration::minutes(5);
        session.created_at = session.updated_at;
        storage.create_session(&session).await.unwrap();

        storage.touch_session(&session.id).await.unwrap();

        let retrieved = storage.get_session(&session.id).await.unwrap().unwrap();
        assert!(retrieved.updated_at > session.updated_at);
        assert_eq!(retrieved.created_at.timestamp(), session.created_at.timestamp());
    }

    #[tokio::test]
    async fn test_touch_nonexistent_session_fails() {
        let storage = create_test_storage().await;

        let result = storage.touch_session("nonexistent-id").await;

        assert!(result.is_err(), "Touching a missing session should fail");
    }
}

#[cfg(test)]
mod message_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn storage_with_session() -> (SqliteStorage, DebateSession) {
        let storage = create_test_storage().await;
        let session = DebateSession::new("user-1", "topic", true);
        storage.create_session(&session).await.unwrap();
        (storage, session)
    }

    #[tokio::test]
    async fn test_create_and_read_message() {
        let (storage, session) = storage_with_session().await;

        let message = DebateMessage::new(&session.id, "opening question", SenderType::Ai);
        storage.create_message(&message).await.unwrap();

        let messages = storage.get_session_messages(&session.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "opening question");
        assert_eq!(messages[0].sender_type, SenderType::Ai);
        assert!(!messages[0].is_expert_response);
    }

    #[tokio::test]
    async fn test_message_requires_existing_session() {
        let storage = create_test_storage().await;

        let message = DebateMessage::new("missing-session", "text", SenderType::User);
        let result = storage.create_message(&message).await;

        assert!(result.is_err(), "FK constraint should reject the message");
    }

    #[tokio::test]
    async fn test_messages_ordered_by_creation() {
        let (storage, session) = storage_with_session().await;

        let mut first = DebateMessage::new(&session.id, "first", SenderType::Ai);
        first.created_at = Utc::now() - Duration::seconds(30);
        let mut second = DebateMessage::new(&session.id, "second", SenderType::User);
        second.created_at = Utc::now() - Duration::seconds(20);
        let third = DebateMessage::new(&session.id, "third", SenderType::Ai);

        // Insert out of order
        storage.create_message(&third).await.unwrap();
        storage.create_message(&first).await.unwrap();
        storage.create_message(&second).await.unwrap();

        let messages = storage.get_session_messages(&session.id).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_created_at_ties_resolve_in_insertion_order() {
        let (storage, session) = storage_with_session().await;

        let stamp = Utc::now();
        for content in ["a", "b", "c"] {
            let mut message = DebateMessage::new(&session.id, content, SenderType::User);
            message.created_at = stamp;
            storage.create_message(&message).await.unwrap();
        }

        let messages = storage.get_session_messages(&session.id).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);

        let latest = storage.get_latest_message(&session.id).await.unwrap();
        assert_eq!(latest.unwrap().content, "c");
    }

    #[tokio::test]
    async fn test_repeated_reads_are_identical() {
        let (storage, session) = storage_with_session().await;

        for content in ["q", "a", "q2"] {
            let sender = if content.starts_with('q') {
                SenderType::Ai
            } else {
                SenderType::User
            };
            storage
                .create_message(&DebateMessage::new(&session.id, content, sender))
                .await
                .unwrap();
        }

        let first_read = storage.get_session_messages(&session.id).await.unwrap();
        let second_read = storage.get_session_messages(&session.id).await.unwrap();

        let ids_first: Vec<&str> = first_read.iter().map(|m| m.id.as_str()).collect();
        let ids_second: Vec<&str> = second_read.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids_first, ids_second);
    }

    #[tokio::test]
    async fn test_latest_message_empty_session() {
        let (storage, session) = storage_with_session().await;

        let latest = storage.get_latest_message(&session.id).await.unwrap();
        assert!(latest.is_none());
    }

    #[tokio::test]
    async fn test_expert_marker_round_trips() {
        let (storage, session) = storage_with_session().await;

        let adopted =
            DebateMessage::new(&session.id, "expert text", SenderType::User).with_expert_marker();
        storage.create_message(&adopted).await.unwrap();

        let messages = storage.get_session_messages(&session.id).await.unwrap();
        assert!(messages[0].is_expert_response);
        assert_eq!(messages[0].sender_type, SenderType::User);
    }

    #[tokio::test]
    async fn test_messages_scoped_to_session() {
        let (storage, session) = storage_with_session().await;
        let other = DebateSession::new("user-2", "other topic", false);
        storage.create_session(&other).await.unwrap();

        storage
            .create_message(&DebateMessage::new(&session.id, "mine", SenderType::Ai))
            .await
            .unwrap();
        storage
            .create_message(&DebateMessage::new(&other.id, "theirs", SenderType::User))
            .await
            .unwrap();

        let messages = storage.get_session_messages(&session.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "mine");
    }
}
