//! Process-wide store construction from settings.
//!
//! Both stores are opened once at startup and shared by cloning; the
//! pipeline components take them as injected dependencies.

use recall_core::{Settings, app_db_path, index_db_path};
use recall_db::RecallDb;

use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::store::VectorStore;

/// Open the relational database and the vector index at their configured
/// locations.
pub async fn open_stores(settings: &Settings) -> KnowledgeResult<(RecallDb, VectorStore)> {
    let app_db = app_db_path(settings).ok_or(KnowledgeError::MissingDataDir)?;
    let index_db = index_db_path(settings).ok_or(KnowledgeError::MissingDataDir)?;

    let db = RecallDb::open(&app_db).await?;
    let store = VectorStore::open(&index_db, settings.ollama.embedding_dim).await?;

    Ok((db, store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_open_under_the_configured_data_root() {
        let temp = tempfile::tempdir().unwrap();
        let settings = Settings {
            data_root_override: Some(temp.path().join("data")),
            ..Default::default()
        };

        let (_db, store) = open_stores(&settings).await.unwrap();
        assert!(temp.path().join("data").join("recall.sqlite3").exists());
        assert!(temp.path().join("data").join("index.sqlite3").exists());
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
