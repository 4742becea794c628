//! Database storage driver

use libsql::Connection;

use crate::error::{Error, Result};
use crate::models::ItemId;

use super::ContentDriver;

/// Blob storage in the `item_contents` table of the main database
///
/// Writes issued inside an item-save transaction share that transaction's
/// fate, which makes this the simplest correct backend.
pub struct DatabaseDriver {
    conn: Connection,
}

impl DatabaseDriver {
    /// Create a driver over the given connection
    #[must_use]
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

#[async_trait::async_trait]
impl ContentDriver for DatabaseDriver {
    async fn write(&self, id: &ItemId, content: &[u8]) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO item_contents (item_id, content) VALUES (?, ?)
                 ON CONFLICT (item_id) DO UPDATE SET content = excluded.content",
                libsql::params![id.as_str(), content.to_vec()],
            )
            .await?;
        Ok(())
    }

    async fn read(&self, id: &ItemId) -> Result<Vec<u8>> {
        let mut rows = self
            .conn
            .query(
                "SELECT content FROM item_contents WHERE item_id = ?",
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<Vec<u8>>(0)?),
            None => Err(Error::NotFound(format!("Content for item {id}"))),
        }
    }

    async fn exists(&self, id: &ItemId) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM item_contents WHERE item_id = ?",
                [id.as_str()],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    async fn delete(&self, ids: &[ItemId]) -> Result<()> {
        for id in ids {
            self.conn
                .execute(
                    "DELETE FROM item_contents WHERE item_id = ?",
                    [id.as_str()],
                )
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> (Database, DatabaseDriver) {
        let db = Database::open_in_memory().await.unwrap();
        let driver = DatabaseDriver::new(db.connection().clone());
        (db, driver)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_read_roundtrip() {
        let (_db, driver) = setup().await;
        let id = ItemId::new();

        driver.write(&id, b"in the database").await.unwrap();
        assert!(driver.exists(&id).await.unwrap());
        assert_eq!(driver.read(&id).await.unwrap(), b"in the database");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_replaces_previous_blob() {
        let (_db, driver) = setup().await;
        let id = ItemId::new();

        driver.write(&id, b"one").await.unwrap();
        driver.write(&id, b"two").await.unwrap();
        assert_eq!(driver.read(&id).await.unwrap(), b"two");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_is_idempotent() {
        let (_db, driver) = setup().await;
        let id = ItemId::new();

        driver.write(&id, b"x").await.unwrap();
        driver.delete(&[id]).await.unwrap();
        driver.delete(&[id]).await.unwrap();
        assert!(!driver.exists(&id).await.unwrap());
    }
}
