//! Local-disk storage driver

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::ItemId;

use super::{storage_error, ContentDriver};

/// Blob storage as files under a root directory
///
/// Files are fanned out into two-character subdirectories so a large store
/// does not put every blob into one directory.
pub struct FilesystemDriver {
    root: PathBuf,
}

impl FilesystemDriver {
    /// Create a driver rooted at the given directory
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self, id: &ItemId) -> PathBuf {
        let name = id.as_str();
        let shard = &name[name.len() - 2..];
        self.root.join(shard).join(name)
    }
}

#[async_trait::async_trait]
impl ContentDriver for FilesystemDriver {
    async fn write(&self, id: &ItemId, content: &[u8]) -> Result<()> {
        let path = self.blob_path(id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| storage_error("create_dir_all", &display(parent), error))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|error| storage_error("write", &display(&path), error))
    }

    async fn read(&self, id: &ItemId) -> Result<Vec<u8>> {
        let path = self.blob_path(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Content for item {id}")))
            }
            Err(error) => Err(storage_error("read", &display(&path), error)),
        }
    }

    async fn exists(&self, id: &ItemId) -> Result<bool> {
        let path = self.blob_path(id);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|error| storage_error("stat", &display(&path), error))
    }

    async fn delete(&self, ids: &[ItemId]) -> Result<()> {
        for id in ids {
            let path = self.blob_path(id);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(error) => return Err(storage_error("remove", &display(&path), error)),
            }
        }
        Ok(())
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_read_roundtrip() {
        let tmp = tempdir().unwrap();
        let driver = FilesystemDriver::new(tmp.path());
        let id = ItemId::new();

        driver.write(&id, b"on disk").await.unwrap();
        assert!(driver.exists(&id).await.unwrap());
        assert_eq!(driver.read(&id).await.unwrap(), b"on disk");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blobs_are_sharded() {
        let tmp = tempdir().unwrap();
        let driver = FilesystemDriver::new(tmp.path());
        let id = ItemId::new();

        driver.write(&id, b"x").await.unwrap();

        let name = id.as_str();
        let expected = tmp.path().join(&name[name.len() - 2..]).join(&name);
        assert!(expected.is_file());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_missing_is_ok() {
        let tmp = tempdir().unwrap();
        let driver = FilesystemDriver::new(tmp.path());
        driver.delete(&[ItemId::new()]).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_read_missing_is_not_found() {
        let tmp = tempdir().unwrap();
        let driver = FilesystemDriver::new(tmp.path());
        assert!(matches!(
            driver.read(&ItemId::new()).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
