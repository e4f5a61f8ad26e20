use async_trait::async_trait;
use chrono::Utc;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use super::{DebateMessage, DebateSession, SenderType, Storage};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory storage instance, used by tests and `init-db` dry runs
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_session(&self, session: &DebateSession) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO debate_sessions (id, user_id, topic, is_user_apologist, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.topic)
        .bind(session.is_user_apologist)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_session(&self, id: &str) -> StorageResult<Option<DebateSession>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, topic, is_user_apologist, created_at, updated_at
            FROM debate_sessions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_user_sessions(&self, user_id: &str) -> StorageResult<Vec<DebateSession>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, topic, is_user_apologist, created_at, updated_at
            FROM debate_sessions
            WHERE user_id = ?
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn touch_session(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE debate_sessions
            SET updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::SessionNotFound {
                session_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn create_message(&self, message: &DebateMessage) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO debate_messages (id, session_id, content, sender_type, is_expert_response, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.session_id)
        .bind(&message.content)
        .bind(message.sender_type.to_string())
        .bind(message.is_expert_response)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_session_messages(&self, session_id: &str) -> StorageResult<Vec<DebateMessage>> {
        // rowid breaks created_at ties in insertion order
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, content, sender_type, is_expert_response, created_at
            FROM debate_messages
            WHERE session_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn get_latest_message(&self, session_id: &str) -> StorageResult<Option<DebateMessage>> {
        let row: Option<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, content, sender_type, is_expert_response, created_at
            FROM debate_messages
            WHERE session_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    topic: String,
    is_user_apologist: bool,
    created_at: String,
    updated_at: String,
}

impl From<SessionRow> for DebateSession {
    fn from(row: SessionRow) -> Self {
        use chrono::DateTime;

        Self {
            id: row.id,
            user_id: row.user_id,
            topic: row.topic,
            is_user_apologist: row.is_user_apologist,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
            updated_at: DateTime::parse_from_rfc3339(&row.updated_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    session_id: String,
    content: String,
    sender_type: String,
    is_expert_response: bool,
    created_at: String,
}

impl From<MessageRow> for DebateMessage {
    fn from(row: MessageRow) -> Self {
        use chrono::DateTime;

        Self {
            id: row.id,
            session_id: row.session_id,
            content: row.content,
            // Unknown tags would mean a hand-edited database; treat them as AI
            // rather than dropping the row.
            sender_type: row.sender_type.parse().unwrap_or(SenderType::Ai),
            is_expert_response: row.is_expert_response,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
        }
    }
}
