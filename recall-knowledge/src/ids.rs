//! Deterministic identifiers and content hashing.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::errors::KnowledgeResult;

const HASH_BLOCK_SIZE: usize = 64 * 1024;

/// Deterministic vector-store id for a chunk. Identical inputs always
/// produce the identical id, so re-ingesting unchanged content upserts
/// in place.
pub fn vector_id(document_id: i64, chunk_index: usize, content: &str) -> String {
    let prefix: String = content.chars().take(100).collect();
    let mut hasher = Sha256::new();
    hasher.update(format!("{document_id}:{chunk_index}:{prefix}").as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..32].to_string()
}

/// SHA-256 of a file's raw bytes, streamed in fixed-size blocks.
pub async fn file_sha256(path: &Path) -> KnowledgeResult<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BLOCK_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_id_is_deterministic() {
        let a = vector_id(1, 0, "some chunk content");
        let b = vector_id(1, 0, "some chunk content");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn vector_id_changes_with_any_input() {
        let base = vector_id(1, 0, "some chunk content");
        assert_ne!(base, vector_id(2, 0, "some chunk content"));
        assert_ne!(base, vector_id(1, 1, "some chunk content"));
        assert_ne!(base, vector_id(1, 0, "other chunk content"));
    }

    #[test]
    fn vector_id_ignores_content_past_100_chars() {
        let head: String = "a".repeat(100);
        let a = vector_id(1, 0, &format!("{head}tail-one"));
        let b = vector_id(1, 0, &format!("{head}tail-two"));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn file_hash_matches_known_digest() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("hello.txt");
        tokio::fs::write(&path, b"hello world").await.unwrap();

        let hash = file_sha256(&path).await.unwrap();
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
