//! recall-db: relational storage for the recall knowledge base.
//!
//! This crate provides database operations for:
//! - Document lifecycle tracking (pending/processing/ready/failed)
//! - Persisted text chunks backing the vector index
//! - Conversations and chat messages with attached citations
//! - Long-term memories (facts, preferences, digests)

pub mod chunks;
pub mod conversations;
pub mod db;
pub mod documents;
pub mod error;
pub mod memories;
mod sqlite_runtime;

pub use chunks::{ChunkRepository, DocumentChunk};
pub use conversations::{
    Conversation, ConversationRepository, Message, MessageRepository, MessageRole,
};
pub use db::RecallDb;
pub use documents::{Document, DocumentRepository, DocumentStatus, DocumentType, NewDocument};
pub use error::{DbError, DbResult};
pub use memories::{Memory, MemoryRepository, MemoryType, NewMemory};

// Re-export test helpers when running tests or when test-helpers feature is enabled
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
