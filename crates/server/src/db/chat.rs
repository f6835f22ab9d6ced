//! Database operations for chat sessions and messages.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use larder_core::{ChatMessageId, ChatRole, ChatSessionId, UserId};

use super::RepositoryError;
use crate::models::{ChatMessage, ChatSession};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` chat session queries.
#[derive(Debug, sqlx::FromRow)]
struct ChatSessionRow {
    id: Uuid,
    user_id: Uuid,
    title: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ChatSessionRow> for ChatSession {
    fn from(row: ChatSessionRow) -> Self {
        Self {
            id: ChatSessionId::new(row.id),
            user_id: UserId::new(row.user_id),
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for `PostgreSQL` chat message queries.
#[derive(Debug, sqlx::FromRow)]
struct ChatMessageRow {
    id: Uuid,
    chat_session_id: Uuid,
    role: ChatRole,
    content: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<ChatMessageRow> for ChatMessage {
    fn from(row: ChatMessageRow) -> Self {
        Self {
            id: ChatMessageId::new(row.id),
            chat_session_id: ChatSessionId::new(row.chat_session_id),
            role: row.role,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for chat database operations.
pub struct ChatRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ChatRepository<'a> {
    /// Create a new chat repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a new chat session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_session(
        &self,
        user_id: UserId,
        title: Option<&str>,
    ) -> Result<ChatSession, RepositoryError> {
        let row = sqlx::query_as::<_, ChatSessionRow>(
            r"
            INSERT INTO larder.chat_session (id, user_id, title)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, title, created_at, updated_at
            ",
        )
        .bind(ChatSessionId::generate())
        .bind(user_id)
        .bind(title)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Get a chat session owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_session(
        &self,
        user_id: UserId,
        id: ChatSessionId,
    ) -> Result<Option<ChatSession>, RepositoryError> {
        let row = sqlx::query_as::<_, ChatSessionRow>(
            r"
            SELECT id, user_id, title, created_at, updated_at
            FROM larder.chat_session
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List chat sessions for a user.
    ///
    /// Returns sessions ordered by last update (most recent first).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_sessions(&self, user_id: UserId) -> Result<Vec<ChatSession>, RepositoryError> {
        let rows = sqlx::query_as::<_, ChatSessionRow>(
            r"
            SELECT id, user_id, title, created_at, updated_at
            FROM larder.chat_session
            WHERE user_id = $1
            ORDER BY updated_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Bump a session's `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the session doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn touch_session(&self, id: ChatSessionId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE larder.chat_session
            SET updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Add a message to a chat session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_message(
        &self,
        chat_session_id: ChatSessionId,
        role: ChatRole,
        content: serde_json::Value,
    ) -> Result<ChatMessage, RepositoryError> {
        // clock_timestamp() keeps messages written in quick succession ordered.
        let row = sqlx::query_as::<_, ChatMessageRow>(
            r"
            INSERT INTO larder.chat_message (id, chat_session_id, role, content, created_at)
            VALUES ($1, $2, $3, $4, clock_timestamp())
            RETURNING id, chat_session_id, role, content, created_at
            ",
        )
        .bind(ChatMessageId::generate())
        .bind(chat_session_id)
        .bind(role)
        .bind(content)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Get all messages for a chat session.
    ///
    /// Returns messages ordered by creation time (oldest first).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_messages(
        &self,
        chat_session_id: ChatSessionId,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ChatMessageRow>(
            r"
            SELECT id, chat_session_id, role, content, created_at
            FROM larder.chat_message
            WHERE chat_session_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(chat_session_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete a chat session owned by `user_id` and all its messages.
    ///
    /// # Returns
    ///
    /// Returns `true` if the session was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_session(
        &self,
        user_id: UserId,
        id: ChatSessionId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM larder.chat_session WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
