//! Document lifecycle operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// Document lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Pending => write!(f, "pending"),
            DocumentStatus::Processing => write!(f, "processing"),
            DocumentStatus::Ready => write!(f, "ready"),
            DocumentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DocumentStatus::Pending),
            "processing" => Ok(DocumentStatus::Processing),
            "ready" => Ok(DocumentStatus::Ready),
            "failed" => Ok(DocumentStatus::Failed),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// Declared document type, derived from the filename extension
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Txt,
    Docx,
    Md,
    Unknown,
}

impl DocumentType {
    /// Map a filename to its declared type by extension.
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename
            .rsplit('.')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => DocumentType::Pdf,
            "txt" => DocumentType::Txt,
            "docx" => DocumentType::Docx,
            "md" => DocumentType::Md,
            _ => DocumentType::Unknown,
        }
    }

    /// Whether this type can be ingested.
    pub fn is_supported(&self) -> bool {
        !matches!(self, DocumentType::Unknown)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentType::Pdf => write!(f, "pdf"),
            DocumentType::Txt => write!(f, "txt"),
            DocumentType::Docx => write!(f, "docx"),
            DocumentType::Md => write!(f, "md"),
            DocumentType::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(DocumentType::Pdf),
            "txt" => Ok(DocumentType::Txt),
            "docx" => Ok(DocumentType::Docx),
            "md" => Ok(DocumentType::Md),
            "unknown" => Ok(DocumentType::Unknown),
            _ => Err(format!("Unknown document type: {}", s)),
        }
    }
}

/// Document record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub doc_type: DocumentType,
    pub status: DocumentStatus,
    pub chunk_count: i64,
    pub tags: Option<String>,
    pub error_message: Option<String>,
    pub is_watched: bool,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a document row
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub doc_type: DocumentType,
    pub content_hash: String,
    pub tags: Option<Vec<String>>,
    pub is_watched: bool,
}

fn from_timestamp(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

type DocumentRow = (
    i64,
    String,
    String,
    String,
    i64,
    String,
    String,
    i64,
    Option<String>,
    Option<String>,
    i64,
    String,
    i64,
    i64,
);

const DOCUMENT_COLUMNS: &str = "id, title, filename, file_path, file_size, doc_type, status, \
     chunk_count, tags, error_message, is_watched, content_hash, created_at, updated_at";

fn map_document(row: DocumentRow) -> Document {
    let (
        id,
        title,
        filename,
        file_path,
        file_size,
        doc_type,
        status,
        chunk_count,
        tags,
        error_message,
        is_watched,
        content_hash,
        created_at,
        updated_at,
    ) = row;
    Document {
        id,
        title,
        filename,
        file_path,
        file_size,
        doc_type: doc_type.parse().unwrap_or(DocumentType::Unknown),
        status: status.parse().unwrap_or(DocumentStatus::Failed),
        chunk_count,
        tags,
        error_message,
        is_watched: is_watched != 0,
        content_hash,
        created_at: from_timestamp(created_at),
        updated_at: from_timestamp(updated_at),
    }
}

/// Document repository for database operations
pub struct DocumentRepository;

impl DocumentRepository {
    /// Insert a new document in `processing` state and return the full row.
    pub async fn create(pool: &SqlitePool, new: NewDocument) -> DbResult<Document> {
        let now = Utc::now().timestamp();
        let tags_json = match &new.tags {
            Some(tags) if !tags.is_empty() => Some(serde_json::to_string(tags).unwrap_or_default()),
            _ => None,
        };

        let result = sqlx::query(
            r#"INSERT INTO documents
               (title, filename, file_path, file_size, doc_type, status, tags, is_watched, content_hash, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&new.title)
        .bind(&new.filename)
        .bind(&new.file_path)
        .bind(new.file_size)
        .bind(new.doc_type.to_string())
        .bind(DocumentStatus::Processing.to_string())
        .bind(&tags_json)
        .bind(new.is_watched as i64)
        .bind(&new.content_hash)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Created document {} ({})", id, new.filename);

        Self::get(pool, id)
            .await?
            .ok_or_else(|| sqlx::Error::RowNotFound.into())
    }

    /// Fetch a document by id.
    pub async fn get(pool: &SqlitePool, id: i64) -> DbResult<Option<Document>> {
        let row: Option<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ? LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(map_document))
    }

    /// Fetch a document by its content hash (the dedup key).
    pub async fn find_by_hash(pool: &SqlitePool, content_hash: &str) -> DbResult<Option<Document>> {
        let row: Option<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE content_hash = ? LIMIT 1"
        ))
        .bind(content_hash)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(map_document))
    }

    /// All documents, newest first.
    pub async fn list(pool: &SqlitePool) -> DbResult<Vec<Document>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(map_document).collect())
    }

    /// Ready documents created at or after `since` (digest input).
    pub async fn list_ready_since(
        pool: &SqlitePool,
        since: DateTime<Utc>,
    ) -> DbResult<Vec<Document>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE status = ? AND created_at >= ? ORDER BY created_at DESC"
        ))
        .bind(DocumentStatus::Ready.to_string())
        .bind(since.timestamp())
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(map_document).collect())
    }

    /// Mark a document ready. Status, chunk count and error message are
    /// updated together in one statement.
    pub async fn mark_ready(pool: &SqlitePool, id: i64, chunk_count: i64) -> DbResult<()> {
        sqlx::query(
            "UPDATE documents SET status = ?, chunk_count = ?, error_message = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(DocumentStatus::Ready.to_string())
        .bind(chunk_count)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Mark a document failed, retaining the error message. The chunk count
    /// persisted so far is left untouched.
    pub async fn mark_failed(pool: &SqlitePool, id: i64, error: &str) -> DbResult<()> {
        sqlx::query("UPDATE documents SET status = ?, error_message = ?, updated_at = ? WHERE id = ?")
            .bind(DocumentStatus::Failed.to_string())
            .bind(error)
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Record how many chunk rows were persisted for the document.
    pub async fn set_chunk_count(pool: &SqlitePool, id: i64, chunk_count: i64) -> DbResult<()> {
        sqlx::query("UPDATE documents SET chunk_count = ?, updated_at = ? WHERE id = ?")
            .bind(chunk_count)
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Reset a document for reprocessing: back to `processing`, prior error
    /// and chunk count cleared.
    pub async fn reset_for_processing(pool: &SqlitePool, id: i64) -> DbResult<()> {
        sqlx::query(
            "UPDATE documents SET status = ?, chunk_count = 0, error_message = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(DocumentStatus::Processing.to_string())
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Delete a document row (chunk rows cascade). Returns whether a row
    /// was removed.
    pub async fn delete(pool: &SqlitePool, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
