//! Chat turn persistence semantics with the model backend unreachable.

use futures::StreamExt;
use tempfile::TempDir;

use recall_core::{OllamaSettings, Settings};
use recall_db::test_helpers::create_test_db;
use recall_db::{ConversationRepository, MessageRepository, MessageRole};
use recall_knowledge::{
    ChatService, EmbeddingClient, GenerationClient, KnowledgeError, RetrievalPipeline, VectorStore,
};

async fn offline_chat(temp: &TempDir) -> (ChatService, recall_db::RecallDb) {
    let db = create_test_db().await.unwrap();
    let store = VectorStore::open(&temp.path().join("index.sqlite3"), Some(4))
        .await
        .unwrap();
    let ollama = OllamaSettings {
        host: "http://127.0.0.1:9".to_string(),
        ..Default::default()
    };
    let retrieval = RetrievalPipeline::new(
        db.clone(),
        store,
        EmbeddingClient::new(&ollama),
        Settings::default(),
    );
    let service = ChatService::new(db.clone(), retrieval, GenerationClient::new(&ollama));
    (service, db)
}

#[tokio::test]
async fn failed_generation_never_persists_a_half_turn() {
    let temp = TempDir::new().unwrap();
    let (service, db) = offline_chat(&temp).await;

    let stream = service.stream_turn(None, "Hello there".to_string());
    futures::pin_mut!(stream);

    let mut saw_error = false;
    while let Some(event) = stream.next().await {
        if event.is_err() {
            saw_error = true;
        }
    }
    assert!(saw_error, "dead backend must surface as a stream error");

    // Retrieval degraded to no context, the conversation and the user
    // message exist, and no assistant message was persisted.
    let conversations = ConversationRepository::list(db.pool()).await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].title.as_deref(), Some("Hello there"));

    let messages = MessageRepository::list_for_conversation(db.pool(), conversations[0].id)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, MessageRole::User);
}

#[tokio::test]
async fn unknown_conversation_is_rejected() {
    let temp = TempDir::new().unwrap();
    let (service, _db) = offline_chat(&temp).await;

    let stream = service.stream_turn(Some(999), "Hi".to_string());
    futures::pin_mut!(stream);

    let first = stream.next().await.unwrap();
    assert!(matches!(first, Err(KnowledgeError::ConversationNotFound(999))));
}
