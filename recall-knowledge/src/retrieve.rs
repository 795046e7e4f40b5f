//! Query-time retrieval: vector search joined with document metadata,
//! producing ranked citations and the grounding block for the prompt.

use recall_db::{DocumentRepository, RecallDb};
use serde::{Deserialize, Serialize};
use tracing::error;

use recall_core::Settings;

use crate::embeddings::EmbeddingClient;
use crate::errors::KnowledgeResult;
use crate::store::{SearchHit, VectorStore};

/// A retrieval result enriched with source document metadata. Built fresh
/// per query, optionally serialized onto the assistant message for audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub document_id: i64,
    pub document_title: String,
    pub chunk_content: String,
    pub relevance_score: f32,
    pub page_number: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct RetrievalPipeline {
    db: RecallDb,
    store: VectorStore,
    embedder: EmbeddingClient,
    settings: Settings,
}

impl RetrievalPipeline {
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

    /// Retrieve citations for a query. Embedding or search failures degrade
    /// to an empty result instead of failing the chat turn; vector hits
    /// whose document has been deleted since indexing are dropped.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
        allowed_document_ids: Option<&[i64]>,
    ) -> KnowledgeResult<Vec<Citation>> {
        let top_k = top_k.unwrap_or(self.settings.retrieval.top_k);

        let hits = match self.search(query, top_k, allowed_document_ids).await {
            Ok(hits) => hits,
            Err(err) => {
                error!("Retrieval failed: {err}");
                return Ok(Vec::new());
            }
        };

        let pool = self.db.pool();
        let mut citations = Vec::new();
        for hit in hits {
            // The vector index and the relational store are only eventually
            // consistent; a hit may outlive its document.
            let Some(document) = DocumentRepository::get(pool, hit.metadata.document_id).await?
            else {
                continue;
            };

            citations.push(Citation {
                document_id: document.id,
                document_title: document.title,
                chunk_content: hit.content,
                relevance_score: round_score(hit.score),
                page_number: (hit.metadata.page_number >= 0).then_some(hit.metadata.page_number),
            });
        }

        Ok(citations)
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        allowed_document_ids: Option<&[i64]>,
    ) -> KnowledgeResult<Vec<SearchHit>> {
        let embedding = self.embedder.embed(query).await?;
        self.store
            .search(
                &embedding,
                top_k,
                self.settings.retrieval.score_threshold,
                allowed_document_ids,
            )
            .await
    }
}

/// Build the grounding block prepended to the user question. An empty
/// citation list yields an empty string (no context section at all).
pub fn build_context_block(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return String::new();
    }

    let mut parts = vec!["RELEVANT CONTEXT FROM YOUR KNOWLEDGE BASE:\n".to_string()];
    for (position, citation) in citations.iter().enumerate() {
        parts.push(format!(
            "[Source {}: {}]\n{}\n",
            position + 1,
            citation.document_title,
            citation.chunk_content
        ));
    }
    parts.push("\nUse the above context to answer the user's question.".to_string());

    parts.join("\n")
}

fn round_score(score: f32) -> f32 {
    (score * 10_000.0).round() / 10_000.0
}
