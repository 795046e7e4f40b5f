#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("missing data directory")]
    MissingDataDir,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("database error: {0}")]
    Db(#[from] recall_db::DbError),
    #[error("sqlite-vec initialization error: {0}")]
    SqliteVec(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unsupported document type: {0}")]
    UnsupportedType(String),
    #[error("document appears to be empty or unreadable")]
    EmptyDocument,
    #[error("no text chunks generated from document")]
    NoChunks,
    #[error("text extraction failed: {0}")]
    Extraction(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimMismatch { expected: usize, actual: usize },
    #[error("generation error: {0}")]
    Generation(String),
    #[error("unknown document: {0}")]
    DocumentNotFound(i64),
    #[error("unknown conversation: {0}")]
    ConversationNotFound(i64),
    #[error("invalid job schedule: {0}")]
    Schedule(String),
}

pub type KnowledgeResult<T> = Result<T, KnowledgeError>;
