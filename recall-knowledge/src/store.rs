//! Vector index over document chunks, backed by sqlite-vec.
//!
//! Each record pairs a deterministic chunk id with its embedding and the
//! metadata needed to assemble citations. The embedding dimension is fixed
//! by the embedding model; it is recorded on first write and later vectors
//! must match it.

use std::path::Path;
use std::sync::OnceLock;

use libsqlite3_sys::{SQLITE_OK, sqlite3, sqlite3_api_routines, sqlite3_auto_extension};
use sqlite_vec::sqlite3_vec_init;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::errors::{KnowledgeError, KnowledgeResult};

static SQLITE_VEC_INIT_RC: OnceLock<i32> = OnceLock::new();

/// Sentinel stored when a chunk has no page attribution.
pub const NO_PAGE: i64 = -1;

/// Metadata stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorMetadata {
    pub document_id: i64,
    pub document_title: String,
    pub chunk_index: i64,
    pub word_count: i64,
    /// `NO_PAGE` when the chunk carries no page number.
    pub page_number: i64,
}

/// A nearest-neighbour match. `score` is 1 − cosine distance, in [0, 1]
/// for non-degenerate vectors.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub metadata: VectorMetadata,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct VectorStore {
    pool: SqlitePool,
}

impl VectorStore {
    /// Open (or create) the vector index at `db_path`. When
    /// `embedding_dim` is known up front the vec table is created eagerly;
    /// otherwise it is sized from the first stored vector.
    pub async fn open(db_path: &Path, embedding_dim: Option<usize>) -> KnowledgeResult<Self> {
        init_sqlite_vec_once()?;
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA synchronous = NORMAL")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await?;

        create_schema(&pool).await?;
        if let Some(dim) = embedding_dim {
            ensure_vec_table(&pool, dim).await?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of indexed vectors.
    pub async fn count(&self) -> KnowledgeResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Insert or overwrite the record under `id`.
    pub async fn upsert(
        &self,
        id: &str,
        embedding: &[f32],
        content: &str,
        metadata: &VectorMetadata,
    ) -> KnowledgeResult<()> {
        self.check_dimension(embedding.len()).await?;

        sqlx::query(
            r#"INSERT INTO vectors (id, document_id, document_title, chunk_index, word_count, page_number, content)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   document_id=excluded.document_id,
                   document_title=excluded.document_title,
                   chunk_index=excluded.chunk_index,
                   word_count=excluded.word_count,
                   page_number=excluded.page_number,
                   content=excluded.content"#,
        )
        .bind(id)
        .bind(metadata.document_id)
        .bind(&metadata.document_title)
        .bind(metadata.chunk_index)
        .bind(metadata.word_count)
        .bind(metadata.page_number)
        .bind(content)
        .execute(&self.pool)
        .await?;

        let (rowid,): (i64,) = sqlx::query_as("SELECT rowid FROM vectors WHERE id = ? LIMIT 1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        let payload = serde_json::to_string(embedding)
            .map_err(|e| KnowledgeError::Embedding(format!("embedding serialize failed: {e}")))?;

        sqlx::query("INSERT OR REPLACE INTO chunk_vec(rowid, embedding) VALUES (?, ?)")
            .bind(rowid)
            .bind(payload)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Nearest-neighbour search. Results are sorted by score descending,
    /// hold at most `top_k` entries (clamped to the index size) and never
    /// score below `score_threshold`. An empty index yields an empty vec.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        score_threshold: f32,
        allowed_document_ids: Option<&[i64]>,
    ) -> KnowledgeResult<Vec<SearchHit>> {
        let indexed = self.count().await?;
        if indexed == 0 {
            return Ok(Vec::new());
        }
        let limit = top_k.min(indexed as usize);
        if limit == 0 {
            return Ok(Vec::new());
        }
        if let Some(ids) = allowed_document_ids
            && ids.is_empty()
        {
            return Ok(Vec::new());
        }

        let payload = serde_json::to_string(query_embedding)
            .map_err(|e| KnowledgeError::Embedding(format!("embedding serialize failed: {e}")))?;

        type HitRow = (String, String, i64, String, i64, i64, i64, f32);
        let rows: Vec<HitRow> = if let Some(ids) = allowed_document_ids {
            let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let sql = format!(
                "SELECT m.id, m.content, m.document_id, m.document_title, m.chunk_index, m.word_count, m.page_number, v.distance
                 FROM chunk_vec v
                 JOIN vectors m ON m.rowid = v.rowid
                 WHERE v.embedding MATCH ? AND m.document_id IN ({placeholders})
                 ORDER BY v.distance ASC
                 LIMIT ?"
            );
            let mut query = sqlx::query_as::<_, HitRow>(&sql).bind(&payload);
            for id in ids {
                query = query.bind(id);
            }
            query.bind(limit as i64).fetch_all(&self.pool).await?
        } else {
            sqlx::query_as::<_, HitRow>(
                r#"SELECT m.id, m.content, m.document_id, m.document_title, m.chunk_index, m.word_count, m.page_number, v.distance
                   FROM chunk_vec v
                   JOIN vectors m ON m.rowid = v.rowid
                   WHERE v.embedding MATCH ?
                   ORDER BY v.distance ASC
                   LIMIT ?"#,
            )
            .bind(&payload)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?
        };

        let hits = rows
            .into_iter()
            .map(
                |(id, content, document_id, document_title, chunk_index, word_count, page_number, distance)| {
                    SearchHit {
                        id,
                        content,
                        metadata: VectorMetadata {
                            document_id,
                            document_title,
                            chunk_index,
                            word_count,
                            page_number,
                        },
                        score: 1.0 - distance,
                    }
                },
            )
            .filter(|hit| hit.score >= score_threshold)
            .collect();

        Ok(hits)
    }

    /// Remove every vector belonging to `document_id`. Returns how many
    /// records were removed; zero matches is not an error.
    pub async fn delete_by_document(&self, document_id: i64) -> KnowledgeResult<u64> {
        let rowids: Vec<(i64,)> = sqlx::query_as("SELECT rowid FROM vectors WHERE document_id = ?")
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;

        if !rowids.is_empty() {
            let placeholders = rowids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let sql = format!("DELETE FROM chunk_vec WHERE rowid IN ({placeholders})");
            let mut query = sqlx::query(&sql);
            for (rowid,) in &rowids {
                query = query.bind(rowid);
            }
            query.execute(&self.pool).await?;
        }

        let result = sqlx::query("DELETE FROM vectors WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Validate the vector dimension against the index, creating the vec
    /// table when this is the first write.
    async fn check_dimension(&self, dim: usize) -> KnowledgeResult<()> {
        match stored_dimension(&self.pool).await? {
            Some(expected) if expected != dim => {
                Err(KnowledgeError::EmbeddingDimMismatch { expected, actual: dim })
            }
            Some(_) => Ok(()),
            None => ensure_vec_table(&self.pool, dim).await,
        }
    }
}

fn init_sqlite_vec_once() -> KnowledgeResult<()> {
    let rc = *SQLITE_VEC_INIT_RC.get_or_init(|| unsafe {
        type SqliteVecInitFn =
            unsafe extern "C" fn(*mut sqlite3, *mut *const i8, *const sqlite3_api_routines) -> i32;

        sqlite3_auto_extension(Some(std::mem::transmute::<*const (), SqliteVecInitFn>(
            sqlite3_vec_init as *const (),
        )))
    });

    if rc == SQLITE_OK {
        Ok(())
    } else {
        Err(KnowledgeError::SqliteVec(format!(
            "sqlite-vec init failed with code {rc}"
        )))
    }
}

async fn create_schema(pool: &SqlitePool) -> KnowledgeResult<()> {
    sqlx::query("CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
        .execute(pool)
        .await?;
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS vectors (
               id TEXT PRIMARY KEY,
               document_id INTEGER NOT NULL,
               document_title TEXT NOT NULL,
               chunk_index INTEGER NOT NULL,
               word_count INTEGER NOT NULL DEFAULT 0,
               page_number INTEGER NOT NULL DEFAULT -1,
               content TEXT NOT NULL
           )"#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_document ON vectors(document_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn stored_dimension(pool: &SqlitePool) -> KnowledgeResult<Option<usize>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT value FROM meta WHERE key = 'embedding_dim' LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(row.and_then(|(value,)| value.parse::<usize>().ok()))
}

async fn ensure_vec_table(pool: &SqlitePool, dimension: usize) -> KnowledgeResult<()> {
    let table_exists: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'chunk_vec'",
    )
    .fetch_optional(pool)
    .await?;

    if table_exists.is_none() {
        let create_sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS chunk_vec USING vec0(embedding float[{}] distance_metric=cosine)",
            dimension
        );
        sqlx::query(&create_sql).execute(pool).await?;
    }

    sqlx::query("INSERT OR REPLACE INTO meta (key, value) VALUES ('embedding_dim', ?)")
        .bind(dimension.to_string())
        .execute(pool)
        .await?;

    Ok(())
}
