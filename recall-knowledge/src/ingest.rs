//! Document ingestion: dedup, extraction, chunking, embedding, storage.
//!
//! One pipeline instance is constructed at startup and shared; it holds the
//! relational pool, the vector store and the embedding client. Callers must
//! not ingest or reprocess the same document id concurrently; different
//! documents are safe side by side.

use std::path::Path;

use recall_core::Settings;
use recall_db::{
    ChunkRepository, Document, DocumentRepository, DocumentType, NewDocument, RecallDb,
};
use tracing::{error, info, warn};

use crate::chunker::chunk_text;
use crate::embeddings::EmbeddingClient;
use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::extract::extract_text;
use crate::ids::{file_sha256, vector_id};
use crate::store::{NO_PAGE, VectorMetadata, VectorStore};

#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    db: RecallDb,
    store: VectorStore,
    embedder: EmbeddingClient,
    settings: Settings,
}

impl IngestionPipeline {
    pub fn new(
        db: RecallDb,
        store: VectorStore,
        embedder: EmbeddingClient,
        settings: Settings,
    ) -> Self {
        Self {
            db,
            store,
            embedder,
            settings,
        }
    }

    /// Ingest a file. Returns the existing document unchanged when the
    /// file's content hash is already known.
    pub async fn ingest_file(
        &self,
        file_path: &Path,
        original_filename: &str,
        title: Option<&str>,
        tags: Option<Vec<String>>,
        is_watched: bool,
    ) -> KnowledgeResult<Document> {
        let file_path = tokio::fs::canonicalize(file_path).await?;
        let filename = Path::new(original_filename)
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or(original_filename)
            .to_string();

        let doc_type = DocumentType::from_filename(&filename);
        if !doc_type.is_supported() {
            return Err(KnowledgeError::UnsupportedType(
                filename.rsplit('.').next().unwrap_or("").to_string(),
            ));
        }

        let content_hash = file_sha256(&file_path).await?;
        let pool = self.db.pool();
        if let Some(existing) = DocumentRepository::find_by_hash(pool, &content_hash).await? {
            info!(
                "Document already exists: {} (hash match for {})",
                existing.id, filename
            );
            return Ok(existing);
        }

        let file_size = tokio::fs::metadata(&file_path).await?.len() as i64;
        let title = title
            .map(str::to_string)
            .or_else(|| {
                Path::new(&filename)
                    .file_stem()
                    .and_then(|v| v.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| filename.clone());

        let document = DocumentRepository::create(
            pool,
            NewDocument {
                title,
                filename,
                file_path: file_path.to_string_lossy().to_string(),
                file_size,
                doc_type,
                content_hash,
                tags,
                is_watched,
            },
        )
        .await?;

        self.run_pipeline(document).await
    }

    /// Re-run the pipeline for an existing document. Prior error, chunk
    /// count, chunk rows and vectors are cleared first.
    pub async fn reprocess_document(&self, document_id: i64) -> KnowledgeResult<Document> {
        let pool = self.db.pool();
        let document = DocumentRepository::get(pool, document_id)
            .await?
            .ok_or(KnowledgeError::DocumentNotFound(document_id))?;

        DocumentRepository::reset_for_processing(pool, document.id).await?;
        self.store.delete_by_document(document.id).await?;
        ChunkRepository::delete_for_document(pool, document.id).await?;

        let document = DocumentRepository::get(pool, document_id)
            .await?
            .ok_or(KnowledgeError::DocumentNotFound(document_id))?;
        self.run_pipeline(document).await
    }

    /// Delete a document, its vectors and (best effort) its backing file.
    /// Returns whether a document was found.
    pub async fn delete_document(&self, document_id: i64) -> KnowledgeResult<bool> {
        let pool = self.db.pool();
        let Some(document) = DocumentRepository::get(pool, document_id).await? else {
            return Ok(false);
        };

        self.store.delete_by_document(document.id).await?;

        match tokio::fs::remove_file(&document.file_path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("Could not delete file {}: {err}", document.file_path),
        }

        DocumentRepository::delete(pool, document.id).await?;
        Ok(true)
    }

    /// Ingest every supported file in `folder` whose content is not yet
    /// known. Per-file failures do not abort the scan. Returns the number
    /// of newly ingested documents.
    pub async fn scan_folder(&self, folder: &Path) -> KnowledgeResult<usize> {
        if !folder.exists() {
            return Ok(0);
        }

        let pool = self.db.pool();
        let mut ingested = 0;
        let mut entries = tokio::fs::read_dir(folder).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !DocumentType::from_filename(&name).is_supported() {
                continue;
            }

            let path = entry.path();
            let hash = match file_sha256(&path).await {
                Ok(hash) => hash,
                Err(err) => {
                    error!("Failed to hash {name}: {err}");
                    continue;
                }
            };
            if DocumentRepository::find_by_hash(pool, &hash).await?.is_some() {
                continue;
            }

            info!("Ingesting watched file: {name}");
            match self.ingest_file(&path, &name, None, None, true).await {
                Ok(_) => ingested += 1,
                Err(err) => error!("Failed to ingest {name}: {err}"),
            }
        }

        Ok(ingested)
    }

    /// Process the document and record the outcome on its row. The row and
    /// any chunk rows persisted before a failure are retained so the
    /// document can be reprocessed.
    async fn run_pipeline(&self, document: Document) -> KnowledgeResult<Document> {
        let pool = self.db.pool();
        match self.process_document(&document).await {
            Ok(chunk_count) => {
                DocumentRepository::mark_ready(pool, document.id, chunk_count).await?;
                info!("Document {} processed: {} chunks", document.id, chunk_count);
                DocumentRepository::get(pool, document.id)
                    .await?
                    .ok_or(KnowledgeError::DocumentNotFound(document.id))
            }
            Err(err) => {
                error!("Failed to process document {}: {err}", document.id);
                DocumentRepository::mark_failed(pool, document.id, &err.to_string()).await?;
                Err(err)
            }
        }
    }

    async fn process_document(&self, document: &Document) -> KnowledgeResult<i64> {
        info!("Processing document {}: {}", document.id, document.filename);
        let pool = self.db.pool();

        let text = extract_text(Path::new(&document.file_path), document.doc_type).await?;
        if text.trim().is_empty() {
            return Err(KnowledgeError::EmptyDocument);
        }

        let chunks = chunk_text(
            &text,
            self.settings.chunking.chunk_size,
            self.settings.chunking.chunk_overlap,
        );
        if chunks.is_empty() {
            return Err(KnowledgeError::NoChunks);
        }

        // Chunk rows go in before any embedding call so the relational
        // state reflects the intended chunks even if embedding fails
        // partway through.
        let mut chunk_rows = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let row_id = ChunkRepository::insert(
                pool,
                document.id,
                chunk.index as i64,
                &chunk.content,
                chunk.word_count as i64,
                None,
            )
            .await?;
            chunk_rows.push(row_id);
        }
        DocumentRepository::set_chunk_count(pool, document.id, chunks.len() as i64).await?;

        for (chunk, row_id) in chunks.iter().zip(&chunk_rows) {
            let embedding = self.embedder.embed(&chunk.content).await?;
            let id = vector_id(document.id, chunk.index, &chunk.content);
            self.store
                .upsert(
                    &id,
                    &embedding,
                    &chunk.content,
                    &VectorMetadata {
                        document_id: document.id,
                        document_title: document.title.clone(),
                        chunk_index: chunk.index as i64,
                        word_count: chunk.word_count as i64,
                        page_number: NO_PAGE,
                    },
                )
                .await?;
            ChunkRepository::set_vector_id(pool, *row_id, &id).await?;
        }

        Ok(chunks.len() as i64)
    }
}
