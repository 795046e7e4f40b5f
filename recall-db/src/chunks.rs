//! Persisted text chunks backing the vector index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::DbResult;

/// Chunk row. `vector_id` is set once the chunk's embedding has been
/// stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: i64,
    pub document_id: i64,
    pub chunk_index: i64,
    pub content: String,
    pub word_count: i64,
    pub page_number: Option<i64>,
    pub vector_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

type ChunkRow = (
    i64,
    i64,
    i64,
    String,
    i64,
    Option<i64>,
    Option<String>,
    i64,
);

fn map_chunk(row: ChunkRow) -> DocumentChunk {
    let (id, document_id, chunk_index, content, word_count, page_number, vector_id, created_at) =
        row;
    DocumentChunk {
        id,
        document_id,
        chunk_index,
        content,
        word_count,
        page_number,
        vector_id,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
    }
}

/// Chunk repository for database operations
pub struct ChunkRepository;

impl ChunkRepository {
    /// Insert a chunk row and return its row id.
    pub async fn insert(
        pool: &SqlitePool,
        document_id: i64,
        chunk_index: i64,
        content: &str,
        word_count: i64,
        page_number: Option<i64>,
    ) -> DbResult<i64> {
        let result = sqlx::query(
            r#"INSERT INTO document_chunks
               (document_id, chunk_index, content, word_count, page_number, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(document_id)
        .bind(chunk_index)
        .bind(content)
        .bind(word_count)
        .bind(page_number)
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Attach the vector-store id to a chunk row.
    pub async fn set_vector_id(pool: &SqlitePool, chunk_id: i64, vector_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE document_chunks SET vector_id = ? WHERE id = ?")
            .bind(vector_id)
            .bind(chunk_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Chunks of a document in index order.
    pub async fn list_for_document(
        pool: &SqlitePool,
        document_id: i64,
    ) -> DbResult<Vec<DocumentChunk>> {
        let rows: Vec<ChunkRow> = sqlx::query_as(
            r#"SELECT id, document_id, chunk_index, content, word_count, page_number, vector_id, created_at
               FROM document_chunks WHERE document_id = ? ORDER BY chunk_index ASC"#,
        )
        .bind(document_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(map_chunk).collect())
    }

    /// Remove all chunk rows of a document (used by reprocessing; normal
    /// deletion cascades from the document row).
    pub async fn delete_for_document(pool: &SqlitePool, document_id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Number of chunk rows persisted for a document.
    pub async fn count_for_document(pool: &SqlitePool, document_id: i64) -> DbResult<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM document_chunks WHERE document_id = ?")
                .bind(document_id)
                .fetch_one(pool)
                .await?;

        Ok(row.0)
    }
}
