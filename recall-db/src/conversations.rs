//! Conversations and chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::DbResult;

/// Role of a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Conversation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub title: Option<String>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Message record. `sources` holds the citations of an assistant turn as
/// a JSON array for audit/history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub role: MessageRole,
    pub content: String,
    pub sources: Option<String>,
    pub latency_ms: Option<f64>,
    pub created_at: DateTime<Utc>,
}

fn from_timestamp(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

/// Conversation repository for database operations
pub struct ConversationRepository;

impl ConversationRepository {
    pub async fn create(pool: &SqlitePool, title: Option<&str>) -> DbResult<Conversation> {
        let now = Utc::now().timestamp();
        let result =
            sqlx::query("INSERT INTO conversations (title, created_at, updated_at) VALUES (?, ?, ?)")
                .bind(title)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await?;

        Ok(Conversation {
            id: result.last_insert_rowid(),
            title: title.map(str::to_string),
            is_archived: false,
            created_at: from_timestamp(now),
            updated_at: from_timestamp(now),
        })
    }

    pub async fn get(pool: &SqlitePool, id: i64) -> DbResult<Option<Conversation>> {
        let row: Option<(i64, Option<String>, i64, i64, i64)> = sqlx::query_as(
            "SELECT id, title, is_archived, created_at, updated_at FROM conversations WHERE id = ? LIMIT 1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(id, title, is_archived, created_at, updated_at)| Conversation {
            id,
            title,
            is_archived: is_archived != 0,
            created_at: from_timestamp(created_at),
            updated_at: from_timestamp(updated_at),
        }))
    }

    /// Non-archived conversations, most recently updated first.
    pub async fn list(pool: &SqlitePool) -> DbResult<Vec<Conversation>> {
        let rows: Vec<(i64, Option<String>, i64, i64, i64)> = sqlx::query_as(
            "SELECT id, title, is_archived, created_at, updated_at FROM conversations \
             WHERE is_archived = 0 ORDER BY updated_at DESC, id DESC",
        )
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, title, is_archived, created_at, updated_at)| Conversation {
                id,
                title,
                is_archived: is_archived != 0,
                created_at: from_timestamp(created_at),
                updated_at: from_timestamp(updated_at),
            })
            .collect())
    }

    pub async fn touch(pool: &SqlitePool, id: i64) -> DbResult<()> {
        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Delete a conversation (messages cascade). Returns whether a row was
    /// removed.
    pub async fn delete(pool: &SqlitePool, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Message repository for database operations
pub struct MessageRepository;

impl MessageRepository {
    pub async fn insert(
        pool: &SqlitePool,
        conversation_id: i64,
        role: MessageRole,
        content: &str,
        sources: Option<&str>,
        latency_ms: Option<f64>,
    ) -> DbResult<Message> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"INSERT INTO messages (conversation_id, role, content, sources, latency_ms, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(conversation_id)
        .bind(role.to_string())
        .bind(content)
        .bind(sources)
        .bind(latency_ms)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(Message {
            id: result.last_insert_rowid(),
            conversation_id,
            role,
            content: content.to_string(),
            sources: sources.map(str::to_string),
            latency_ms,
            created_at: from_timestamp(now),
        })
    }

    /// Messages of a conversation in insertion order.
    pub async fn list_for_conversation(
        pool: &SqlitePool,
        conversation_id: i64,
    ) -> DbResult<Vec<Message>> {
        let rows: Vec<(i64, i64, String, String, Option<String>, Option<f64>, i64)> =
            sqlx::query_as(
                r#"SELECT id, conversation_id, role, content, sources, latency_ms, created_at
                   FROM messages WHERE conversation_id = ? ORDER BY id ASC"#,
            )
            .bind(conversation_id)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, conversation_id, role, content, sources, latency_ms, created_at)| Message {
                    id,
                    conversation_id,
                    role: role.parse().unwrap_or(MessageRole::User),
                    content,
                    sources,
                    latency_ms,
                    created_at: from_timestamp(created_at),
                },
            )
            .collect())
    }

    pub async fn count_for_conversation(pool: &SqlitePool, conversation_id: i64) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_one(pool)
            .await?;

        Ok(row.0)
    }

    /// Messages created at or after `since`, across all conversations
    /// (digest input).
    pub async fn count_since(pool: &SqlitePool, since: DateTime<Utc>) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE created_at >= ?")
            .bind(since.timestamp())
            .fetch_one(pool)
            .await?;

        Ok(row.0)
    }
}
