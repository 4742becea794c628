//! User-item grants
//!
//! A row means "user can read item". Grants must be safely repeatable:
//! propagation can replay a page after a crash, so adding an existing grant
//! succeeds without touching the row and removing a missing one is a no-op.

use libsql::Connection;

use crate::error::{Error, Result};
use crate::models::{ItemId, UserId};

/// Grant repository
pub struct UserItemModel<'a> {
    conn: &'a Connection,
}

impl<'a> UserItemModel<'a> {
    /// Create a model over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Grant a user read access to an item.
    ///
    /// Duplicate grants are absorbed by the unique pair constraint rather
    /// than pre-checked, so concurrent runs cannot race a check-then-act.
    pub async fn add(&self, user_id: &UserId, item_id: &ItemId) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn
            .execute(
                "INSERT INTO user_items (user_id, item_id, created_at, updated_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT (user_id, item_id) DO NOTHING",
                libsql::params![user_id.as_str(), item_id.as_str(), now, now],
            )
            .await?;
        Ok(())
    }

    /// Revoke a user's access to an item; absent grants are a no-op
    pub async fn remove(&self, user_id: &UserId, item_id: &ItemId) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM user_items WHERE user_id = ? AND item_id = ?",
                [user_id.as_str(), item_id.as_str()],
            )
            .await?;
        Ok(())
    }

    /// Remove every grant on an item
    pub async fn remove_by_item(&self, item_id: &ItemId) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM user_items WHERE item_id = ?",
                [item_id.as_str()],
            )
            .await?;
        Ok(())
    }

    /// Whether a grant exists
    pub async fn has(&self, user_id: &UserId, item_id: &ItemId) -> Result<bool> {
        Ok(self.granted_at(user_id, item_id).await?.is_some())
    }

    /// `updated_at` of a grant row, if present.
    ///
    /// Lets callers observe that replaying a grant left the row untouched.
    pub async fn granted_at(&self, user_id: &UserId, item_id: &ItemId) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT updated_at FROM user_items WHERE user_id = ? AND item_id = ?",
                [user_id.as_str(), item_id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// All users granted access to an item
    pub async fn users_for_item(&self, item_id: &ItemId) -> Result<Vec<UserId>> {
        let mut rows = self
            .conn
            .query(
                "SELECT user_id FROM user_items WHERE item_id = ? ORDER BY user_id",
                [item_id.as_str()],
            )
            .await?;

        let mut users = Vec::new();
        while let Some(row) = rows.next().await? {
            users.push(parse_user_id(&row.get::<String>(0)?)?);
        }
        Ok(users)
    }

    /// All items a user has been granted
    pub async fn item_ids_for_user(&self, user_id: &UserId) -> Result<Vec<ItemId>> {
        let mut rows = self
            .conn
            .query(
                "SELECT item_id FROM user_items WHERE user_id = ? ORDER BY item_id",
                [user_id.as_str()],
            )
            .await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(parse_item_id(&row.get::<String>(0)?)?);
        }
        Ok(items)
    }

    /// Items where the given user holds the only grant
    pub async fn exclusively_owned_item_ids(&self, user_id: &UserId) -> Result<Vec<ItemId>> {
        let mut rows = self
            .conn
            .query(
                "SELECT ui.item_id
                 FROM user_items ui
                 WHERE ui.user_id = ?
                   AND (SELECT COUNT(*) FROM user_items other WHERE other.item_id = ui.item_id) = 1
                 ORDER BY ui.item_id",
                [user_id.as_str()],
            )
            .await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(parse_item_id(&row.get::<String>(0)?)?);
        }
        Ok(items)
    }
}

fn parse_user_id(value: &str) -> Result<UserId> {
    value
        .parse()
        .map_err(|_| Error::Database("Invalid user id in user_items".to_string()))
}

fn parse_item_id(value: &str) -> Result<ItemId> {
    value
        .parse()
        .map_err(|_| Error::Database("Invalid item id in user_items".to_string()))
}
