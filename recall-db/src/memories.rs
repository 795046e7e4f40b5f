//! Long-term memories: facts, preferences, insights, digests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::DbResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Fact,
    Preference,
    Insight,
    Digest,
    Note,
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryType::Fact => write!(f, "fact"),
            MemoryType::Preference => write!(f, "preference"),
            MemoryType::Insight => write!(f, "insight"),
            MemoryType::Digest => write!(f, "digest"),
            MemoryType::Note => write!(f, "note"),
        }
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fact" => Ok(MemoryType::Fact),
            "preference" => Ok(MemoryType::Preference),
            "insight" => Ok(MemoryType::Insight),
            "digest" => Ok(MemoryType::Digest),
            "note" => Ok(MemoryType::Note),
            _ => Err(format!("Unknown memory type: {}", s)),
        }
    }
}

/// Memory record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub memory_type: MemoryType,
    pub source_document_id: Option<i64>,
    pub source_conversation_id: Option<i64>,
    pub importance_score: f64,
    pub tags: Option<String>,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a memory row
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub title: String,
    pub content: String,
    pub memory_type: MemoryType,
    pub source_document_id: Option<i64>,
    pub source_conversation_id: Option<i64>,
    pub importance_score: f64,
    pub tags: Option<Vec<String>>,
}

type MemoryRow = (
    i64,
    String,
    String,
    String,
    Option<i64>,
    Option<i64>,
    f64,
    Option<String>,
    i64,
    i64,
    i64,
);

const MEMORY_COLUMNS: &str = "id, title, content, memory_type, source_document_id, \
     source_conversation_id, importance_score, tags, is_pinned, created_at, updated_at";

fn map_memory(row: MemoryRow) -> Memory {
    let (
        id,
        title,
        content,
        memory_type,
        source_document_id,
        source_conversation_id,
        importance_score,
        tags,
        is_pinned,
        created_at,
        updated_at,
    ) = row;
    Memory {
        id,
        title,
        content,
        memory_type: memory_type.parse().unwrap_or(MemoryType::Note),
        source_document_id,
        source_conversation_id,
        importance_score,
        tags,
        is_pinned: is_pinned != 0,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
        updated_at: DateTime::from_timestamp(updated_at, 0).unwrap_or_else(Utc::now),
    }
}

/// Memory repository for database operations
pub struct MemoryRepository;

impl MemoryRepository {
    pub async fn insert(pool: &SqlitePool, new: NewMemory) -> DbResult<Memory> {
        let now = Utc::now().timestamp();
        let tags_json = match &new.tags {
            Some(tags) if !tags.is_empty() => Some(serde_json::to_string(tags).unwrap_or_default()),
            _ => None,
        };

        let result = sqlx::query(
            r#"INSERT INTO memories
               (title, content, memory_type, source_document_id, source_conversation_id, importance_score, tags, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&new.title)
        .bind(&new.content)
        .bind(new.memory_type.to_string())
        .bind(new.source_document_id)
        .bind(new.source_conversation_id)
        .bind(new.importance_score)
        .bind(&tags_json)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        let id = result.last_insert_rowid();
        Self::get(pool, id)
            .await?
            .ok_or_else(|| sqlx::Error::RowNotFound.into())
    }

    pub async fn get(pool: &SqlitePool, id: i64) -> DbResult<Option<Memory>> {
        let row: Option<MemoryRow> = sqlx::query_as(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ? LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(map_memory))
    }

    /// Pinned memories, most important first (digest input).
    pub async fn list_pinned(pool: &SqlitePool, limit: i64) -> DbResult<Vec<Memory>> {
        let rows: Vec<MemoryRow> = sqlx::query_as(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE is_pinned = 1 \
             ORDER BY importance_score DESC, id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(map_memory).collect())
    }

    pub async fn set_pinned(pool: &SqlitePool, id: i64, pinned: bool) -> DbResult<()> {
        sqlx::query("UPDATE memories SET is_pinned = ?, updated_at = ? WHERE id = ?")
            .bind(pinned as i64)
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM memories WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
