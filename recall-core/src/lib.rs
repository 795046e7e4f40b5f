//! Shared configuration for the recall knowledge-base assistant.

pub mod config;
pub mod paths;

pub use config::{
    ChunkingSettings, DigestSettings, OllamaSettings, RetrievalSettings, ScanSettings, Settings,
    SettingsError, load_dotenv,
};
pub use paths::{app_db_path, data_root, index_db_path, upload_dir, watched_dir};
