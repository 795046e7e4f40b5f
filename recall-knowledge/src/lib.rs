//! Ingestion and retrieval pipeline for the recall knowledge base.

pub mod bootstrap;
pub mod chat;
pub mod chunker;
pub mod digest;
pub mod embeddings;
pub mod errors;
pub mod extract;
pub mod generation;
pub mod ids;
pub mod ingest;
pub mod jobs;
pub mod retrieve;
pub mod store;

pub use bootstrap::open_stores;
pub use chat::{ChatEvent, ChatService};
pub use chunker::{TextChunk, chunk_text};
pub use digest::DigestService;
pub use embeddings::EmbeddingClient;
pub use errors::{KnowledgeError, KnowledgeResult};
pub use generation::{ChatTurn, GenerationClient, GenerationOptions};
pub use ingest::IngestionPipeline;
pub use jobs::ScheduledJobs;
pub use retrieve::{Citation, RetrievalPipeline, build_context_block};
pub use store::{SearchHit, VectorMetadata, VectorStore};
