//! Retrieval-augmented chat turns over stored conversations.

use std::time::Instant;

use async_stream::try_stream;
use futures::{Stream, StreamExt, pin_mut};
use recall_db::{
    ConversationRepository, Message, MessageRepository, MessageRole, RecallDb,
};
use serde::Serialize;

use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::generation::{ChatTurn, GenerationClient, GenerationOptions};
use crate::retrieve::{Citation, RetrievalPipeline, build_context_block};

pub const SYSTEM_PROMPT: &str = "You are recall, an assistant that answers questions from the \
user's personal knowledge base.\n\
When context from the knowledge base is provided, ground your answer in it and mention the \
source documents naturally. If the context is insufficient, say so honestly instead of \
guessing. Be concise. All data stays on the user's machine.";

const HISTORY_LIMIT: usize = 20;
const TITLE_LIMIT: usize = 60;

/// Incremental output of one chat turn.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Sources { sources: Vec<Citation> },
    Token { content: String },
    Done { conversation_id: i64, message_id: i64 },
}

#[derive(Debug, Clone)]
pub struct ChatService {
    db: RecallDb,
    retrieval: RetrievalPipeline,
    generator: GenerationClient,
}

impl ChatService {
    pub fn new(db: RecallDb, retrieval: RetrievalPipeline, generator: GenerationClient) -> Self {
        Self {
            db,
            retrieval,
            generator,
        }
    }

    /// Run one chat turn. The user message is persisted up front; the
    /// assistant message is persisted only once the generation stream has
    /// run to completion, so a cancelled (dropped) stream never leaves a
    /// half-written turn behind.
    pub fn stream_turn(
        &self,
        conversation_id: Option<i64>,
        user_message: String,
    ) -> impl Stream<Item = KnowledgeResult<ChatEvent>> + '_ {
        try_stream! {
            let started = Instant::now();
            let pool = self.db.pool();

            let conversation = match conversation_id {
                Some(id) => ConversationRepository::get(pool, id)
                    .await?
                    .ok_or(KnowledgeError::ConversationNotFound(id))?,
                None => {
                    let title = truncate_title(&user_message);
                    ConversationRepository::create(pool, Some(&title)).await?
                }
            };

            MessageRepository::insert(
                pool,
                conversation.id,
                MessageRole::User,
                &user_message,
                None,
                None,
            )
            .await?;

            let history = MessageRepository::list_for_conversation(pool, conversation.id).await?;
            let citations = self.retrieval.retrieve(&user_message, None, None).await?;
            if !citations.is_empty() {
                yield ChatEvent::Sources { sources: citations.clone() };
            }

            let context = build_context_block(&citations);
            let messages = build_messages(&user_message, &context, &history);

            let mut full_response = String::new();
            let stream = self
                .generator
                .chat_stream(messages, GenerationOptions::default());
            pin_mut!(stream);
            while let Some(fragment) = stream.next().await {
                let fragment = fragment?;
                full_response.push_str(&fragment);
                yield ChatEvent::Token { content: fragment };
            }

            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            let sources_json = if citations.is_empty() {
                None
            } else {
                serde_json::to_string(&citations).ok()
            };
            let message = MessageRepository::insert(
                pool,
                conversation.id,
                MessageRole::Assistant,
                &full_response,
                sources_json.as_deref(),
                Some(latency_ms),
            )
            .await?;
            ConversationRepository::touch(pool, conversation.id).await?;

            yield ChatEvent::Done {
                conversation_id: conversation.id,
                message_id: message.id,
            };
        }
    }
}

/// Assemble model input: system prompt, recent history, then the user
/// question with the grounding block prepended.
fn build_messages(user_message: &str, context: &str, history: &[Message]) -> Vec<ChatTurn> {
    let mut turns = vec![ChatTurn::system(SYSTEM_PROMPT)];

    // The just-persisted user message is the last history entry; it is
    // sent separately below.
    let prior = &history[..history.len().saturating_sub(1)];
    let skip = prior.len().saturating_sub(HISTORY_LIMIT);
    for message in &prior[skip..] {
        let turn = match message.role {
            MessageRole::User => ChatTurn::user(message.content.clone()),
            MessageRole::Assistant => ChatTurn::assistant(message.content.clone()),
            MessageRole::System => ChatTurn::system(message.content.clone()),
        };
        turns.push(turn);
    }

    if context.is_empty() {
        turns.push(ChatTurn::user(user_message));
    } else {
        turns.push(ChatTurn::user(format!(
            "{context}\n\nUSER QUESTION: {user_message}"
        )));
    }

    turns
}

fn truncate_title(content: &str) -> String {
    if content.chars().count() <= TITLE_LIMIT {
        return content.to_string();
    }
    let head: String = content.chars().take(TITLE_LIMIT).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_truncate_at_sixty_chars() {
        assert_eq!(truncate_title("short"), "short");

        let long = "x".repeat(80);
        let title = truncate_title(&long);
        assert_eq!(title.chars().count(), TITLE_LIMIT + 3);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn context_is_prepended_to_the_user_question() {
        let turns = build_messages("What is recall?", "CONTEXT BLOCK", &[]);
        assert_eq!(turns.first().map(|t| t.role.as_str()), Some("system"));
        let last = turns.last().unwrap();
        assert!(last.content.starts_with("CONTEXT BLOCK"));
        assert!(last.content.ends_with("USER QUESTION: What is recall?"));
    }

    #[test]
    fn without_context_the_question_is_sent_bare() {
        let turns = build_messages("Hello", "", &[]);
        assert_eq!(turns.last().map(|t| t.content.as_str()), Some("Hello"));
    }
}
