//! Path-keyed object storage for uploaded images.

pub mod local;

use async_trait::async_trait;
use thiserror::Error;

pub use local::LocalObjectStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub size: u64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> StorageResult<StoredObject>;
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;
    async fn delete(&self, key: &str) -> StorageResult<()>;
    fn url_for(&self, key: &str) -> String;
}

/// Rejects keys that could escape the storage root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub const BULLETIN_IMAGE_PREFIX: &str = "anuncios/";

pub fn profile_photo_key(user_id: &str) -> String {
    format!("profile-photos/{}", user_id)
}

pub fn chat_image_key(chat_id: &str, timestamp_ms: i64) -> String {
    format!("chat-images/{}/{}", chat_id, timestamp_ms)
}

pub fn bulletin_image_key(timestamp_ms: i64, filename: &str) -> String {
    format!("{}{}_{}", BULLETIN_IMAGE_PREFIX, timestamp_ms, sanitize_filename(filename))
}

/// Keeps the last path component, then ASCII alphanumerics, `.`, `-` and `_`.
/// Anything else becomes `_`.
fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
