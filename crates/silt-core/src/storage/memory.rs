//! In-memory storage driver

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::ItemId;

use super::ContentDriver;

/// Blob storage in process memory
///
/// Nothing survives a restart; intended for tests and scratch setups.
#[derive(Default)]
pub struct MemoryDriver {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryDriver {
    /// Create an empty driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether no blobs are stored
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ContentDriver for MemoryDriver {
    async fn write(&self, id: &ItemId, content: &[u8]) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(id.as_str(), content.to_vec());
        Ok(())
    }

    async fn read(&self, id: &ItemId) -> Result<Vec<u8>> {
        self.entries
            .lock()
            .await
            .get(&id.as_str())
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Content for item {id}")))
    }

    async fn exists(&self, id: &ItemId) -> Result<bool> {
        Ok(self.entries.lock().await.contains_key(&id.as_str()))
    }

    async fn delete(&self, ids: &[ItemId]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        for id in ids {
            entries.remove(&id.as_str());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_read_roundtrip() {
        let driver = MemoryDriver::new();
        let id = ItemId::new();

        driver.write(&id, b"hello").await.unwrap();
        assert!(driver.exists(&id).await.unwrap());
        assert_eq!(driver.read(&id).await.unwrap(), b"hello");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_replaces_previous_blob() {
        let driver = MemoryDriver::new();
        let id = ItemId::new();

        driver.write(&id, b"one").await.unwrap();
        driver.write(&id, b"two").await.unwrap();
        assert_eq!(driver.read(&id).await.unwrap(), b"two");
        assert_eq!(driver.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_is_idempotent() {
        let driver = MemoryDriver::new();
        let id = ItemId::new();

        driver.write(&id, b"x").await.unwrap();
        driver.delete(&[id]).await.unwrap();
        driver.delete(&[id]).await.unwrap();
        assert!(!driver.exists(&id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_read_missing_is_not_found() {
        let driver = MemoryDriver::new();
        assert!(matches!(
            driver.read(&ItemId::new()).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
