//! Periodic digest generation and memory extraction.

use chrono::{Duration, Utc};
use recall_db::{
    Document, DocumentRepository, Memory, MemoryRepository, MemoryType, MessageRepository,
    NewMemory, RecallDb,
};
use serde::Deserialize;
use tracing::debug;

use crate::errors::KnowledgeResult;
use crate::generation::{GenerationClient, GenerationOptions};

const DIGEST_SYSTEM_PROMPT: &str =
    "You are a personal knowledge assistant writing a short daily digest.";
const DIGEST_IMPORTANCE: f64 = 0.6;
const PINNED_MEMORY_LIMIT: i64 = 5;
const MAX_EXTRACTED_MEMORIES: usize = 3;

#[derive(Debug, Clone)]
pub struct DigestService {
    db: RecallDb,
    generator: GenerationClient,
}

impl DigestService {
    pub fn new(db: RecallDb, generator: GenerationClient) -> Self {
        Self { db, generator }
    }

    /// Summarize the last 24 hours of activity and store the result as a
    /// digest memory. Returns the digest text.
    pub async fn generate_daily_digest(&self) -> KnowledgeResult<String> {
        let pool = self.db.pool();
        let now = Utc::now();
        let since = now - Duration::days(1);

        let recent_docs = DocumentRepository::list_ready_since(pool, since).await?;
        let recent_messages = MessageRepository::count_since(pool, since).await?;
        let pinned = MemoryRepository::list_pinned(pool, PINNED_MEMORY_LIMIT).await?;

        let prompt = build_digest_prompt(&now.format("%B %d, %Y").to_string(), &recent_docs, recent_messages, &pinned);
        let digest = self
            .generator
            .generate(
                &prompt,
                Some(DIGEST_SYSTEM_PROMPT),
                &GenerationOptions {
                    temperature: 0.6,
                    max_tokens: 500,
                },
            )
            .await?;

        MemoryRepository::insert(
            pool,
            NewMemory {
                title: format!("Daily Digest - {}", now.format("%B %d, %Y")),
                content: digest.clone(),
                memory_type: MemoryType::Digest,
                source_document_id: None,
                source_conversation_id: None,
                importance_score: DIGEST_IMPORTANCE,
                tags: Some(vec!["digest".to_string(), "auto-generated".to_string()]),
            },
        )
        .await?;

        Ok(digest)
    }

    /// Ask the model for facts worth keeping from a conversation turn and
    /// store them. Malformed model output is treated as "nothing worth
    /// remembering", never as an error.
    pub async fn extract_memories(
        &self,
        conversation_id: i64,
        message_content: &str,
    ) -> KnowledgeResult<Vec<Memory>> {
        let excerpt: String = message_content.chars().take(1000).collect();
        let prompt = format!(
            "Analyze this conversation message and extract any facts, preferences, or insights \
             worth remembering long-term.\n\nMessage: {excerpt}\n\n\
             If there are memorable facts or preferences, list them as a JSON array:\n\
             [{{\"title\": \"...\", \"content\": \"...\", \"type\": \"fact|preference|insight\"}}]\n\n\
             If nothing is worth remembering, return: []\n\n\
             Return ONLY valid JSON, no other text."
        );

        let response = match self
            .generator
            .generate(
                &prompt,
                None,
                &GenerationOptions {
                    temperature: 0.3,
                    max_tokens: 500,
                },
            )
            .await
        {
            Ok(response) => response,
            Err(err) => {
                debug!("Memory extraction skipped: {err}");
                return Ok(Vec::new());
            }
        };

        let pool = self.db.pool();
        let mut stored = Vec::new();
        for suggestion in parse_memory_suggestions(&response) {
            let memory = MemoryRepository::insert(
                pool,
                NewMemory {
                    title: suggestion.title,
                    content: suggestion.content,
                    memory_type: suggestion.kind,
                    source_document_id: None,
                    source_conversation_id: Some(conversation_id),
                    importance_score: 0.5,
                    tags: None,
                },
            )
            .await?;
            stored.push(memory);
        }

        Ok(stored)
    }
}

fn build_digest_prompt(
    date: &str,
    recent_docs: &[Document],
    recent_messages: i64,
    pinned: &[Memory],
) -> String {
    let doc_list = recent_docs
        .iter()
        .map(|doc| format!("- {} ({} chunks)", doc.title, doc.chunk_count))
        .collect::<Vec<_>>()
        .join("\n");
    let memory_list = pinned
        .iter()
        .map(|memory| {
            let excerpt: String = memory.content.chars().take(200).collect();
            format!("- {}: {}", memory.title, excerpt)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Generate a brief daily digest for {date}.\n\n\
         RECENT ACTIVITY (last 24 hours):\n\
         - Documents added: {}\n{}\n\
         - Chat messages exchanged: {recent_messages}\n\n\
         TOP PINNED MEMORIES:\n{}\n\n\
         Write a concise, friendly digest (2-3 paragraphs) that:\n\
         1. Summarizes what was added to the knowledge base\n\
         2. Highlights any important pinned memories\n\
         3. Suggests a follow-up question or topic to explore\n\n\
         Keep it conversational and under 250 words.",
        recent_docs.len(),
        if doc_list.is_empty() { "  (none)".to_string() } else { doc_list },
        if memory_list.is_empty() { "(none yet)".to_string() } else { memory_list },
    )
}

#[derive(Debug, Clone)]
struct MemorySuggestion {
    title: String,
    content: String,
    kind: MemoryType,
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    title: String,
    content: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// Pull a JSON array out of a model response. Anything unparseable yields
/// an empty list.
fn parse_memory_suggestions(response: &str) -> Vec<MemorySuggestion> {
    let Some(start) = response.find('[') else {
        return Vec::new();
    };
    let Some(end) = response.rfind(']') else {
        return Vec::new();
    };
    if end < start {
        return Vec::new();
    }

    let raw: Vec<RawSuggestion> = match serde_json::from_str(&response[start..=end]) {
        Ok(raw) => raw,
        Err(err) => {
            debug!("Memory extraction returned invalid JSON: {err}");
            return Vec::new();
        }
    };

    raw.into_iter()
        .take(MAX_EXTRACTED_MEMORIES)
        .map(|suggestion| MemorySuggestion {
            title: suggestion.title,
            content: suggestion.content,
            kind: suggestion
                .kind
                .as_deref()
                .and_then(|kind| kind.parse().ok())
                .unwrap_or(MemoryType::Insight),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_prompt_lists_documents_and_memories() {
        let prompt = build_digest_prompt("August 08, 2026", &[], 4, &[]);
        assert!(prompt.contains("Documents added: 0"));
        assert!(prompt.contains("(none)"));
        assert!(prompt.contains("Chat messages exchanged: 4"));
        assert!(prompt.contains("(none yet)"));
    }

    #[test]
    fn suggestions_parse_from_surrounded_json() {
        let response = r#"Here you go:
[{"title": "Coffee", "content": "User prefers espresso.", "type": "preference"}]
Hope that helps."#;
        let suggestions = parse_memory_suggestions(response);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].title, "Coffee");
        assert_eq!(suggestions[0].kind, MemoryType::Preference);
    }

    #[test]
    fn suggestions_cap_at_three() {
        let response = r#"[
            {"title": "a", "content": "1", "type": "fact"},
            {"title": "b", "content": "2", "type": "fact"},
            {"title": "c", "content": "3", "type": "fact"},
            {"title": "d", "content": "4", "type": "fact"}
        ]"#;
        assert_eq!(parse_memory_suggestions(response).len(), 3);
    }

    #[test]
    fn garbage_responses_yield_no_suggestions() {
        assert!(parse_memory_suggestions("no json here").is_empty());
        assert!(parse_memory_suggestions("[not valid").is_empty());
        assert!(parse_memory_suggestions("] backwards [").is_empty());
    }

    #[test]
    fn unknown_memory_kind_defaults_to_insight() {
        let response = r#"[{"title": "t", "content": "c", "type": "wisdom"}]"#;
        let suggestions = parse_memory_suggestions(response);
        assert_eq!(suggestions[0].kind, MemoryType::Insight);
    }
}
