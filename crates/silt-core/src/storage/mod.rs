//! Content storage abstractions
//!
//! An item's blob lives in exactly one driver at a time, identified by the
//! `content_storage_id` recorded on its row. The connector routes reads
//! through an optional fallback driver so a backend migration needs no
//! flag-day cutover.

mod database;
mod filesystem;
mod memory;
mod s3;

use std::sync::Arc;

use libsql::Connection;

use crate::config::{FallbackMode, StorageBackend, StorageConfig, StorageSettings};
use crate::error::{Error, Result};
use crate::models::ItemId;

pub use database::DatabaseDriver;
pub use filesystem::FilesystemDriver;
pub use memory::MemoryDriver;
pub use s3::{S3Config, S3Driver};

/// Physical blob storage operations shared by all backends
#[async_trait::async_trait]
pub trait ContentDriver: Send + Sync {
    /// Store the content bytes for an item, replacing any previous blob
    async fn write(&self, id: &ItemId, content: &[u8]) -> Result<()>;

    /// Load the content bytes for an item
    async fn read(&self, id: &ItemId) -> Result<Vec<u8>>;

    /// Check whether a blob is present for an item
    async fn exists(&self, id: &ItemId) -> Result<bool>;

    /// Remove the blobs for the given items; missing blobs are not an error
    async fn delete(&self, ids: &[ItemId]) -> Result<()>;
}

/// A constructed driver together with its configuration identity
#[derive(Clone)]
pub struct StorageHandle {
    id: String,
    driver: Arc<dyn ContentDriver>,
}

impl StorageHandle {
    /// Wrap a driver under its configuration identity
    pub fn new(id: impl Into<String>, driver: Arc<dyn ContentDriver>) -> Self {
        Self {
            id: id.into(),
            driver,
        }
    }

    /// Build a handle from configuration; the connection backs the
    /// database driver
    pub fn from_config(config: &StorageConfig, conn: &Connection) -> Self {
        let driver: Arc<dyn ContentDriver> = match &config.backend {
            StorageBackend::Filesystem { root } => Arc::new(FilesystemDriver::new(root.clone())),
            StorageBackend::Database => Arc::new(DatabaseDriver::new(conn.clone())),
            StorageBackend::Memory => Arc::new(MemoryDriver::new()),
            StorageBackend::S3(s3) => Arc::new(S3Driver::new(s3.clone())),
        };
        Self::new(config.id.clone(), driver)
    }

    /// Configuration identity of this driver
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The driver itself
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn ContentDriver> {
        &self.driver
    }
}

/// Primary driver plus optional fallback, with migration-aware routing
#[derive(Clone)]
pub struct StorageConnector {
    primary: StorageHandle,
    fallback: Option<(StorageHandle, FallbackMode)>,
}

impl StorageConnector {
    /// Create a connector from already-built handles
    #[must_use]
    pub const fn new(
        primary: StorageHandle,
        fallback: Option<(StorageHandle, FallbackMode)>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Build a connector from storage settings
    pub fn from_settings(settings: &StorageSettings, conn: &Connection) -> Self {
        let primary = StorageHandle::from_config(&settings.primary, conn);
        let fallback = settings
            .fallback
            .as_ref()
            .map(|(config, mode)| (StorageHandle::from_config(config, conn), *mode));
        Self::new(primary, fallback)
    }

    /// Configuration identity new blobs are written under
    #[must_use]
    pub fn primary_id(&self) -> &str {
        self.primary.id()
    }

    /// Write a blob to the primary driver and mirror it to the fallback
    ///
    /// A `ReadWrite` fallback receives the full bytes; a `ReadOnly`
    /// fallback receives a zero-length placeholder signalling that the
    /// content has moved away.
    pub async fn write(&self, id: &ItemId, content: &[u8]) -> Result<()> {
        self.primary.driver.write(id, content).await?;

        if let Some((handle, mode)) = &self.fallback {
            match mode {
                FallbackMode::ReadWrite => handle.driver.write(id, content).await?,
                FallbackMode::ReadOnly => handle.driver.write(id, &[]).await?,
            }
        }

        Ok(())
    }

    /// Read a blob, trying the primary driver first and then the fallback
    pub async fn read(&self, id: &ItemId) -> Result<Vec<u8>> {
        if self.primary.driver.exists(id).await? {
            return self.primary.driver.read(id).await;
        }

        if let Some((handle, _)) = &self.fallback {
            if handle.driver.exists(id).await? {
                tracing::debug!("Content for {id} served from fallback driver {}", handle.id);
                return handle.driver.read(id).await;
            }
        }

        Err(Error::NotFound(format!("Content for item {id}")))
    }

    /// Check whether any active driver holds a blob for the item
    pub async fn exists(&self, id: &ItemId) -> Result<bool> {
        if self.primary.driver.exists(id).await? {
            return Ok(true);
        }
        if let Some((handle, _)) = &self.fallback {
            return handle.driver.exists(id).await;
        }
        Ok(false)
    }

    /// Remove the blobs for the given items from every active driver
    pub async fn delete(&self, ids: &[ItemId]) -> Result<()> {
        self.primary.driver.delete(ids).await?;
        if let Some((handle, _)) = &self.fallback {
            handle.driver.delete(ids).await?;
        }
        Ok(())
    }
}

/// Format a driver failure consistently across backends
pub(crate) fn storage_error(
    operation: &str,
    target: &str,
    error: impl std::fmt::Display,
) -> Error {
    Error::Storage(format!("{operation} failed for {target}: {error}"))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{ContentDriver, Error, ItemId, Result};

    /// Driver whose writes always fail; exercises two-part-commit rollback
    pub struct FailingDriver;

    #[async_trait::async_trait]
    impl ContentDriver for FailingDriver {
        async fn write(&self, id: &ItemId, _content: &[u8]) -> Result<()> {
            Err(Error::Storage(format!("writes disabled for {id}")))
        }

        async fn read(&self, id: &ItemId) -> Result<Vec<u8>> {
            Err(Error::NotFound(format!("Content for item {id}")))
        }

        async fn exists(&self, _id: &ItemId) -> Result<bool> {
            Ok(false)
        }

        async fn delete(&self, _ids: &[ItemId]) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_handle(id: &str) -> (StorageHandle, Arc<MemoryDriver>) {
        let driver = Arc::new(MemoryDriver::new());
        (
            StorageHandle::new(id, driver.clone() as Arc<dyn ContentDriver>),
            driver,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_read_falls_back_when_primary_misses() {
        let (primary, _) = memory_handle("new");
        let (fallback, fallback_driver) = memory_handle("old");
        let id = ItemId::new();
        fallback_driver.write(&id, b"from old backend").await.unwrap();

        let connector =
            StorageConnector::new(primary, Some((fallback, FallbackMode::ReadOnly)));

        assert_eq!(connector.read(&id).await.unwrap(), b"from old backend");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_mirrors_to_read_write_fallback() {
        let (primary, primary_driver) = memory_handle("new");
        let (fallback, fallback_driver) = memory_handle("mirror");
        let connector =
            StorageConnector::new(primary, Some((fallback, FallbackMode::ReadWrite)));

        let id = ItemId::new();
        connector.write(&id, b"payload").await.unwrap();

        assert_eq!(primary_driver.read(&id).await.unwrap(), b"payload");
        assert_eq!(fallback_driver.read(&id).await.unwrap(), b"payload");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_places_placeholder_on_read_only_fallback() {
        let (primary, _) = memory_handle("new");
        let (fallback, fallback_driver) = memory_handle("old");
        let connector =
            StorageConnector::new(primary, Some((fallback, FallbackMode::ReadOnly)));

        let id = ItemId::new();
        connector.write(&id, b"payload").await.unwrap();

        // The old backend sees a zero-length marker, not the content
        assert_eq!(fallback_driver.read(&id).await.unwrap(), Vec::<u8>::new());
        // Routing still serves the real bytes from the primary
        assert_eq!(connector.read(&id).await.unwrap(), b"payload");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_read_missing_everywhere_is_not_found() {
        let (primary, _) = memory_handle("only");
        let connector = StorageConnector::new(primary, None);

        let err = connector.read(&ItemId::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_clears_both_drivers() {
        let (primary, primary_driver) = memory_handle("new");
        let (fallback, fallback_driver) = memory_handle("mirror");
        let connector =
            StorageConnector::new(primary, Some((fallback, FallbackMode::ReadWrite)));

        let id = ItemId::new();
        connector.write(&id, b"payload").await.unwrap();
        connector.delete(&[id]).await.unwrap();

        assert!(!primary_driver.exists(&id).await.unwrap());
        assert!(!fallback_driver.exists(&id).await.unwrap());
    }
}
