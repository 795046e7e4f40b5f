use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use recall_db::{
    ChunkRepository, ConversationRepository, DocumentRepository, DocumentStatus, DocumentType,
    MemoryRepository, MemoryType, MessageRepository, MessageRole, NewDocument, NewMemory,
};

async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(":memory:")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

fn sample_document(hash: &str, filename: &str) -> NewDocument {
    NewDocument {
        title: "Sample".to_string(),
        filename: filename.to_string(),
        file_path: format!("/tmp/{filename}"),
        file_size: 42,
        doc_type: DocumentType::Txt,
        content_hash: hash.to_string(),
        tags: None,
        is_watched: false,
    }
}

#[tokio::test]
async fn document_created_in_processing_state() {
    let pool = test_pool().await;
    let doc = DocumentRepository::create(&pool, sample_document("hash-1", "a.txt"))
        .await
        .unwrap();

    assert_eq!(doc.status, DocumentStatus::Processing);
    assert_eq!(doc.chunk_count, 0);
    assert_eq!(doc.doc_type, DocumentType::Txt);
    assert!(doc.error_message.is_none());
}

#[tokio::test]
async fn content_hash_is_unique() {
    let pool = test_pool().await;
    DocumentRepository::create(&pool, sample_document("same-hash", "a.txt"))
        .await
        .unwrap();
    let duplicate = DocumentRepository::create(&pool, sample_document("same-hash", "b.txt")).await;
    assert!(duplicate.is_err(), "second insert with same hash must fail");

    let found = DocumentRepository::find_by_hash(&pool, "same-hash")
        .await
        .unwrap();
    assert!(found.is_some());
    assert_eq!(found.unwrap().filename, "a.txt");
}

#[tokio::test]
async fn ready_and_failed_updates_are_atomic_per_row() {
    let pool = test_pool().await;
    let doc = DocumentRepository::create(&pool, sample_document("hash-2", "a.txt"))
        .await
        .unwrap();

    DocumentRepository::mark_ready(&pool, doc.id, 7).await.unwrap();
    let ready = DocumentRepository::get(&pool, doc.id).await.unwrap().unwrap();
    assert_eq!(ready.status, DocumentStatus::Ready);
    assert_eq!(ready.chunk_count, 7);
    assert!(ready.error_message.is_none());

    DocumentRepository::mark_failed(&pool, doc.id, "embedding backend down")
        .await
        .unwrap();
    let failed = DocumentRepository::get(&pool, doc.id).await.unwrap().unwrap();
    assert_eq!(failed.status, DocumentStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("embedding backend down"));
    // chunk_count from the last successful persist is retained
    assert_eq!(failed.chunk_count, 7);

    DocumentRepository::reset_for_processing(&pool, doc.id)
        .await
        .unwrap();
    let reset = DocumentRepository::get(&pool, doc.id).await.unwrap().unwrap();
    assert_eq!(reset.status, DocumentStatus::Processing);
    assert_eq!(reset.chunk_count, 0);
    assert!(reset.error_message.is_none());
}

#[tokio::test]
async fn deleting_document_cascades_to_chunks() {
    let pool = test_pool().await;
    let doc = DocumentRepository::create(&pool, sample_document("hash-3", "a.txt"))
        .await
        .unwrap();

    for index in 0..3 {
        ChunkRepository::insert(&pool, doc.id, index, "chunk content", 2, None)
            .await
            .unwrap();
    }
    assert_eq!(
        ChunkRepository::count_for_document(&pool, doc.id).await.unwrap(),
        3
    );

    let removed = DocumentRepository::delete(&pool, doc.id).await.unwrap();
    assert!(removed);
    assert_eq!(
        ChunkRepository::count_for_document(&pool, doc.id).await.unwrap(),
        0
    );

    let removed_again = DocumentRepository::delete(&pool, doc.id).await.unwrap();
    assert!(!removed_again);
}

#[tokio::test]
async fn chunk_vector_id_roundtrip() {
    let pool = test_pool().await;
    let doc = DocumentRepository::create(&pool, sample_document("hash-4", "a.txt"))
        .await
        .unwrap();

    let chunk_id = ChunkRepository::insert(&pool, doc.id, 0, "first chunk", 2, None)
        .await
        .unwrap();
    ChunkRepository::set_vector_id(&pool, chunk_id, "abcdef0123456789abcdef0123456789")
        .await
        .unwrap();

    let chunks = ChunkRepository::list_for_document(&pool, doc.id).await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(
        chunks[0].vector_id.as_deref(),
        Some("abcdef0123456789abcdef0123456789")
    );
    assert_eq!(chunks[0].chunk_index, 0);
}

#[tokio::test]
async fn conversation_message_flow() {
    let pool = test_pool().await;
    let conv = ConversationRepository::create(&pool, Some("Notes on Rust"))
        .await
        .unwrap();

    MessageRepository::insert(&pool, conv.id, MessageRole::User, "What is recall?", None, None)
        .await
        .unwrap();
    MessageRepository::insert(
        &pool,
        conv.id,
        MessageRole::Assistant,
        "A knowledge base.",
        Some(r#"[{"document_id":1}]"#),
        Some(12.5),
    )
    .await
    .unwrap();

    let messages = MessageRepository::list_for_conversation(&pool, conv.id)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert!(messages[1].sources.is_some());

    let removed = ConversationRepository::delete(&pool, conv.id).await.unwrap();
    assert!(removed);
    let messages = MessageRepository::list_for_conversation(&pool, conv.id)
        .await
        .unwrap();
    assert!(messages.is_empty(), "messages cascade with the conversation");
}

#[tokio::test]
async fn pinned_memories_ordered_by_importance() {
    let pool = test_pool().await;

    for (title, importance) in [("low", 0.2), ("high", 0.9), ("mid", 0.5)] {
        let memory = MemoryRepository::insert(
            &pool,
            NewMemory {
                title: title.to_string(),
                content: "remembered".to_string(),
                memory_type: MemoryType::Fact,
                source_document_id: None,
                source_conversation_id: None,
                importance_score: importance,
                tags: None,
            },
        )
        .await
        .unwrap();
        MemoryRepository::set_pinned(&pool, memory.id, true).await.unwrap();
    }

    let pinned = MemoryRepository::list_pinned(&pool, 2).await.unwrap();
    assert_eq!(pinned.len(), 2);
    assert_eq!(pinned[0].title, "high");
    assert_eq!(pinned[1].title, "mid");
}
