use tempfile::TempDir;

use recall_knowledge::store::{NO_PAGE, VectorMetadata, VectorStore};
use recall_knowledge::KnowledgeError;

fn metadata(document_id: i64, chunk_index: i64) -> VectorMetadata {
    VectorMetadata {
        document_id,
        document_title: format!("Document {document_id}"),
        chunk_index,
        word_count: 3,
        page_number: NO_PAGE,
    }
}

async fn seeded_store(temp: &TempDir) -> VectorStore {
    let store = VectorStore::open(&temp.path().join("index.sqlite3"), Some(4))
        .await
        .unwrap();

    store
        .upsert("vec-a", &[1.0, 0.0, 0.0, 0.0], "alpha chunk text", &metadata(1, 0))
        .await
        .unwrap();
    store
        .upsert("vec-b", &[0.9, 0.1, 0.0, 0.0], "beta chunk text", &metadata(1, 1))
        .await
        .unwrap();
    store
        .upsert("vec-c", &[0.0, 1.0, 0.0, 0.0], "gamma chunk text", &metadata(2, 0))
        .await
        .unwrap();

    store
}

#[tokio::test]
async fn empty_index_searches_to_nothing() {
    let temp = TempDir::new().unwrap();
    let store = VectorStore::open(&temp.path().join("index.sqlite3"), Some(4))
        .await
        .unwrap();

    let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 5, 0.0, None).await.unwrap();
    assert!(hits.is_empty());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn search_ranks_by_score_and_applies_threshold() {
    let temp = TempDir::new().unwrap();
    let store = seeded_store(&temp).await;

    let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 10, 0.3, None).await.unwrap();

    // vec-c is orthogonal to the query (score 0) and falls below 0.3.
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "vec-a");
    assert_eq!(hits[1].id, "vec-b");
    assert!((hits[0].score - 1.0).abs() < 1e-4);
    assert!(hits[1].score > 0.9 && hits[1].score < 1.0);
    for hit in &hits {
        assert!(hit.score >= 0.3);
    }
}

#[tokio::test]
async fn top_k_is_honoured_and_clamped() {
    let temp = TempDir::new().unwrap();
    let store = seeded_store(&temp).await;

    let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 1, 0.0, None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "vec-a");

    // top_k larger than the index never yields more than the indexed count.
    let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 100, 0.0, None).await.unwrap();
    assert!(hits.len() <= store.count().await.unwrap() as usize);
}

#[tokio::test]
async fn document_filter_restricts_results() {
    let temp = TempDir::new().unwrap();
    let store = seeded_store(&temp).await;

    let hits = store
        .search(&[1.0, 0.0, 0.0, 0.0], 10, 0.0, Some(&[2]))
        .await
        .unwrap();
    assert!(hits.iter().all(|hit| hit.metadata.document_id == 2));

    let hits = store
        .search(&[1.0, 0.0, 0.0, 0.0], 10, 0.0, Some(&[]))
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn upsert_is_idempotent_and_overwrites() {
    let temp = TempDir::new().unwrap();
    let store = seeded_store(&temp).await;
    assert_eq!(store.count().await.unwrap(), 3);

    store
        .upsert(
            "vec-a",
            &[0.0, 0.0, 1.0, 0.0],
            "rewritten chunk text",
            &metadata(1, 0),
        )
        .await
        .unwrap();
    assert_eq!(store.count().await.unwrap(), 3);

    let hits = store.search(&[0.0, 0.0, 1.0, 0.0], 1, 0.5, None).await.unwrap();
    assert_eq!(hits[0].id, "vec-a");
    assert_eq!(hits[0].content, "rewritten chunk text");
}

#[tokio::test]
async fn delete_by_document_removes_every_vector() {
    let temp = TempDir::new().unwrap();
    let store = seeded_store(&temp).await;

    let removed = store.delete_by_document(1).await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(store.count().await.unwrap(), 1);

    let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 10, 0.0, None).await.unwrap();
    assert!(hits.iter().all(|hit| hit.metadata.document_id != 1));

    // Deleting again is a no-op, not an error.
    let removed = store.delete_by_document(1).await.unwrap();
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn dimension_is_fixed_by_first_write() {
    let temp = TempDir::new().unwrap();
    let store = seeded_store(&temp).await;

    let result = store
        .upsert("vec-d", &[1.0, 0.0, 0.0], "short vector", &metadata(3, 0))
        .await;
    assert!(matches!(
        result,
        Err(KnowledgeError::EmbeddingDimMismatch { expected: 4, actual: 3 })
    ));
}

#[tokio::test]
async fn index_persists_across_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.sqlite3");
    {
        let store = VectorStore::open(&path, Some(4)).await.unwrap();
        store
            .upsert("vec-a", &[1.0, 0.0, 0.0, 0.0], "alpha chunk text", &metadata(1, 0))
            .await
            .unwrap();
    }

    let reopened = VectorStore::open(&path, None).await.unwrap();
    assert_eq!(reopened.count().await.unwrap(), 1);
    let hits = reopened
        .search(&[1.0, 0.0, 0.0, 0.0], 5, 0.5, None)
        .await
        .unwrap();
    assert_eq!(hits[0].id, "vec-a");
    assert_eq!(hits[0].metadata.page_number, NO_PAGE);
}
