// Object storage collaborator. Media bytes never flow through the feed core;
// posts carry opaque (key, url) pairs produced by an implementation of this
// trait. Replaced media objects are deleted through it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::AppResult;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a blob, returning `(url, key)`.
    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> AppResult<(String, String)>;
    /// Remove a blob. Unknown keys are ignored.
    async fn delete(&self, key: &str) -> AppResult<()>;
    /// Time-limited access URL for a stored blob.
    async fn presign(&self, key: &str, ttl_minutes: u32) -> AppResult<String>;
    async fn exists(&self, key: &str) -> AppResult<bool>;
}

/// In-process object store for tests and local runs.
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
    next_key: AtomicU64,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            next_key: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> AppResult<(String, String)> {
        let key = format!("obj-{}", self.next_key.fetch_add(1, Ordering::SeqCst));
        let url = format!("memory://{}", key);
        self.objects
            .write()
            .await
            .insert(key.clone(), (bytes, content_type.to_string()));
        Ok((url, key))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn presign(&self, key: &str, ttl_minutes: u32) -> AppResult<String> {
        Ok(format!("memory://{}?ttl={}m", key, ttl_minutes))
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_delete_lifecycle() {
        let store = MemoryObjectStore::new();
        let (url, key) = store.upload(vec![1, 2, 3], "image/jpeg").await.unwrap();
        assert!(url.contains(&key));
        assert!(store.exists(&key).await.unwrap());

        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
        // deleting again is a no-op
        store.delete(&key).await.unwrap();
    }
}
