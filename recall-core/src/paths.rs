use std::path::PathBuf;

use crate::config::Settings;

pub const APP_DB_FILE: &str = "recall.sqlite3";
pub const INDEX_DB_FILE: &str = "index.sqlite3";
pub const UPLOAD_DIR: &str = "uploads";
pub const WATCHED_DIR: &str = "watched";

/// Root data directory. `RECALL_DATA_DIR` takes precedence, then the
/// settings override, then the platform data dir.
pub fn data_root(settings: &Settings) -> Option<PathBuf> {
    if let Ok(override_dir) = std::env::var("RECALL_DATA_DIR") {
        return Some(PathBuf::from(override_dir));
    }
    if let Some(path) = &settings.data_root_override {
        return Some(path.clone());
    }
    dirs::data_dir().map(|dir| dir.join("recall"))
}

/// Relational database file.
pub fn app_db_path(settings: &Settings) -> Option<PathBuf> {
    data_root(settings).map(|root| root.join(APP_DB_FILE))
}

/// Vector index database file.
pub fn index_db_path(settings: &Settings) -> Option<PathBuf> {
    data_root(settings).map(|root| root.join(INDEX_DB_FILE))
}

/// Where uploaded files are stored after ingestion.
pub fn upload_dir(settings: &Settings) -> Option<PathBuf> {
    data_root(settings).map(|root| root.join(UPLOAD_DIR))
}

/// Folder scanned periodically for new documents.
pub fn watched_dir(settings: &Settings) -> Option<PathBuf> {
    data_root(settings).map(|root| root.join(WATCHED_DIR))
}
