//! Settings loaded from a TOML file with serde-filled defaults.
//!
//! Non-sensitive configuration lives in `config.toml` inside the data
//! directory (or wherever the caller points `Settings::load`). Every field
//! has a default so an absent file yields a fully usable configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },
    #[error("similarity threshold {0} must be within 0.0..=1.0")]
    ThresholdOutOfRange(f32),
}

/// Load a `.env` file if present. Missing files are fine.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Resolved application settings (all values filled with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub ollama: OllamaSettings,
    #[serde(default)]
    pub chunking: ChunkingSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub digest: DigestSettings,
    #[serde(default)]
    pub scan: ScanSettings,
    /// Override the root data directory for all derived paths.
    /// Primarily for testing.
    #[serde(default)]
    pub data_root_override: Option<PathBuf>,
}

impl Settings {
    /// Read settings from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&raw)?;
        settings.validate()?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(SettingsError::OverlapTooLarge {
                overlap: self.chunking.chunk_overlap,
                size: self.chunking.chunk_size,
            });
        }
        if !(0.0..=1.0).contains(&self.retrieval.score_threshold) {
            return Err(SettingsError::ThresholdOutOfRange(
                self.retrieval.score_threshold,
            ));
        }
        Ok(())
    }
}

/// Ollama endpoint and model selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaSettings {
    #[serde(default = "default_ollama_host")]
    pub host: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    /// Embedding dimension, fixed by the embedding model. When unset the
    /// vector index sizes itself from the first stored vector.
    #[serde(default)]
    pub embedding_dim: Option<usize>,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            llm_model: default_llm_model(),
            embed_model: default_embed_model(),
            embedding_dim: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
        }
    }
}

/// When the daily digest job fires (UTC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestSettings {
    #[serde(default = "default_digest_hour")]
    pub hour: u8,
    #[serde(default)]
    pub minute: u8,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            hour: default_digest_hour(),
            minute: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    #[serde(default = "default_scan_interval")]
    pub interval_seconds: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            interval_seconds: default_scan_interval(),
        }
    }
}

fn default_ollama_host() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_llm_model() -> String {
    "llama3.2".to_string()
}

fn default_embed_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    5
}

fn default_score_threshold() -> f32 {
    0.3
}

fn default_digest_hour() -> u8 {
    8
}

fn default_scan_interval() -> u64 {
    120
}
