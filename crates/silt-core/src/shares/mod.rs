//! Shares and share membership
//!
//! A share offers one item (a root folder or a single note) to invited
//! users. Which items belong to a share is the client's call, mirrored in
//! `entity.share_id`; who may read them is derived here and by the
//! propagation job.

use libsql::Connection;

use crate::error::{Error, Result};
use crate::items::{parse_item, shared_children, ITEM_COLUMNS};
use crate::models::{
    EntityKind, Item, Share, ShareId, ShareKind, ShareUser, ShareUserId, ShareUserStatus, UserId,
};
use crate::user_items::UserItemModel;

/// Share repository and membership logic
pub struct ShareModel<'a> {
    conn: &'a Connection,
}

impl<'a> ShareModel<'a> {
    /// Create a model over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Share a root folder.
    ///
    /// Idempotent for the same owner and folder; a folder may carry at most
    /// one Folder-type share.
    pub async fn share_folder(&self, owner_id: &UserId, folder_entity_id: &str) -> Result<Share> {
        let item = self.owned_entity(owner_id, folder_entity_id).await?;
        if item.entity.kind != Some(EntityKind::Folder) {
            return Err(Error::Validation(format!(
                "Entity {folder_entity_id} is not a folder"
            )));
        }
        if !item.entity.parent_id.is_empty() {
            return Err(Error::Validation(
                "Only root folders can be shared".to_string(),
            ));
        }

        if let Some(existing) = self.folder_share_for_item(&item).await? {
            if existing.owner_id == *owner_id {
                return Ok(existing);
            }
            return Err(Error::Validation(format!(
                "Folder {folder_entity_id} is already shared by another user"
            )));
        }

        let share = Share {
            id: ShareId::new(),
            kind: ShareKind::Folder,
            owner_id: *owner_id,
            item_id: item.id,
            folder_entity_id: folder_entity_id.to_string(),
            note_entity_id: String::new(),
            created_at: chrono::Utc::now().timestamp_millis(),
            updated_at: chrono::Utc::now().timestamp_millis(),
        };
        self.insert(&share).await?;
        Ok(share)
    }

    /// Share a single note.
    ///
    /// Idempotent for the same owner and note; note shares on one item
    /// coexist independently of any folder share.
    pub async fn share_note(&self, owner_id: &UserId, note_entity_id: &str) -> Result<Share> {
        let item = self.owned_entity(owner_id, note_entity_id).await?;
        if item.entity.kind != Some(EntityKind::Note) {
            return Err(Error::Validation(format!(
                "Entity {note_entity_id} is not a note"
            )));
        }

        if let Some(existing) = self
            .note_share_for_item(owner_id, &item)
            .await?
        {
            return Ok(existing);
        }

        let share = Share {
            id: ShareId::new(),
            kind: ShareKind::Note,
            owner_id: *owner_id,
            item_id: item.id,
            folder_entity_id: String::new(),
            note_entity_id: note_entity_id.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
            updated_at: chrono::Utc::now().timestamp_millis(),
        };
        self.insert(&share).await?;
        Ok(share)
    }

    /// Invite a user to a share with a Waiting membership
    pub async fn add_user(&self, share_id: &ShareId, user_id: &UserId) -> Result<ShareUser> {
        let share = self.load(share_id).await?;
        if share.owner_id == *user_id {
            return Err(Error::Validation(
                "The share owner is already a member".to_string(),
            ));
        }
        if self.share_user(share_id, user_id).await?.is_some() {
            return Err(Error::Validation(format!(
                "User {user_id} is already on share {share_id}"
            )));
        }

        let now = chrono::Utc::now().timestamp_millis();
        let share_user = ShareUser {
            id: ShareUserId::new(),
            share_id: *share_id,
            user_id: *user_id,
            status: ShareUserStatus::Waiting,
            created_at: now,
            updated_at: now,
        };
        self.conn
            .execute(
                "INSERT INTO share_users (id, share_id, user_id, status, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                libsql::params![
                    share_user.id.as_str(),
                    share_user.share_id.as_str(),
                    share_user.user_id.as_str(),
                    share_user.status.as_i64(),
                    share_user.created_at,
                    share_user.updated_at
                ],
            )
            .await?;
        Ok(share_user)
    }

    /// Answer an invitation. Waiting is the only non-terminal state.
    ///
    /// Acceptance bulk-grants every item currently under the share so the
    /// new member sees existing content immediately, without waiting for
    /// propagation to catch up.
    pub async fn set_status(
        &self,
        share_id: &ShareId,
        user_id: &UserId,
        status: ShareUserStatus,
    ) -> Result<()> {
        if status == ShareUserStatus::Waiting {
            return Err(Error::Validation(
                "An invitation cannot be reset to waiting".to_string(),
            ));
        }

        let share = self.load(share_id).await?;
        let share_user = self
            .share_user(share_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("User {user_id} on share {share_id}")))?;
        if share_user.status != ShareUserStatus::Waiting {
            return Err(Error::Validation(
                "The invitation has already been answered".to_string(),
            ));
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = self
            .set_status_in_tx(&share, &share_user, user_id, status)
            .await;
        match result {
            Ok(()) => {
                self.conn.execute("COMMIT", ()).await?;
                Ok(())
            }
            Err(error) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(error)
            }
        }
    }

    async fn set_status_in_tx(
        &self,
        share: &Share,
        share_user: &ShareUser,
        user_id: &UserId,
        status: ShareUserStatus,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn
            .execute(
                "UPDATE share_users SET status = ?, updated_at = ? WHERE id = ?",
                libsql::params![status.as_i64(), now, share_user.id.as_str()],
            )
            .await?;

        if status == ShareUserStatus::Accepted {
            self.bulk_grant(share, user_id).await?;
            tracing::debug!("User {user_id} accepted share {}", share.id);
        }
        Ok(())
    }

    /// One-time grant of everything currently under a share to a new member
    async fn bulk_grant(&self, share: &Share, user_id: &UserId) -> Result<()> {
        let user_items = UserItemModel::new(self.conn);
        user_items.add(user_id, &share.item_id).await?;

        let items = match share.kind {
            ShareKind::Folder => {
                let members = self.all_share_user_ids(share).await?;
                shared_children(self.conn, &members, &share.folder_entity_id).await?
            }
            ShareKind::Note => self.note_companions(share).await?,
        };

        for item in items {
            user_items.add(user_id, &item.id).await?;
        }
        Ok(())
    }

    /// Resource metadata and blob items linked from a shared note
    async fn note_companions(&self, share: &Share) -> Result<Vec<Item>> {
        let mut rows = self
            .conn
            .query(
                "SELECT resource_id FROM item_resources WHERE item_id = ? ORDER BY resource_id",
                [share.item_id.as_str()],
            )
            .await?;

        let mut resource_ids = Vec::new();
        while let Some(row) = rows.next().await? {
            resource_ids.push(row.get::<String>(0)?);
        }

        let mut items = Vec::new();
        for resource_id in resource_ids {
            let sql = format!(
                "SELECT {ITEM_COLUMNS} FROM items
                 WHERE (entity_id = ? OR name = ?) AND owner_id = ?
                 ORDER BY name"
            );
            let mut rows = self
                .conn
                .query(
                    &sql,
                    [
                        resource_id.clone(),
                        format!(".resource/{resource_id}"),
                        share.owner_id.as_str(),
                    ],
                )
                .await?;
            while let Some(row) = rows.next().await? {
                items.push(parse_item(&row)?);
            }
        }
        Ok(items)
    }

    /// The authoritative visibility set: owner plus every Accepted member
    pub async fn all_share_user_ids(&self, share: &Share) -> Result<Vec<UserId>> {
        let mut users = vec![share.owner_id];
        let mut rows = self
            .conn
            .query(
                "SELECT user_id FROM share_users WHERE share_id = ? AND status = ? ORDER BY user_id",
                libsql::params![share.id.as_str(), ShareUserStatus::Accepted.as_i64()],
            )
            .await?;

        while let Some(row) = rows.next().await? {
            let user: UserId = row
                .get::<String>(0)?
                .parse()
                .map_err(|_| Error::Database("Invalid user id in share_users".to_string()))?;
            if user != share.owner_id {
                users.push(user);
            }
        }
        Ok(users)
    }

    /// Load a share or fail with `NotFound`
    pub async fn load(&self, share_id: &ShareId) -> Result<Share> {
        self.find(share_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Share {share_id}")))
    }

    /// Load a share if it exists
    pub async fn find(&self, share_id: &ShareId) -> Result<Option<Share>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, owner_id, item_id, folder_entity_id, note_entity_id,
                        created_at, updated_at
                 FROM shares WHERE id = ?",
                [share_id.as_str()],
            )
            .await?;

        rows.next().await?.as_ref().map(parse_share).transpose()
    }

    /// A user's membership row on a share, if any
    pub async fn share_user(
        &self,
        share_id: &ShareId,
        user_id: &UserId,
    ) -> Result<Option<ShareUser>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, share_id, user_id, status, created_at, updated_at
                 FROM share_users WHERE share_id = ? AND user_id = ?",
                [share_id.as_str(), user_id.as_str()],
            )
            .await?;

        rows.next().await?.as_ref().map(parse_share_user).transpose()
    }

    async fn insert(&self, share: &Share) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO shares (id, kind, owner_id, item_id, folder_entity_id,
                    note_entity_id, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                libsql::params![
                    share.id.as_str(),
                    share.kind.as_i64(),
                    share.owner_id.as_str(),
                    share.item_id.as_str(),
                    share.folder_entity_id.as_str(),
                    share.note_entity_id.as_str(),
                    share.created_at,
                    share.updated_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn owned_entity(&self, owner_id: &UserId, entity_id: &str) -> Result<Item> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE owner_id = ? AND entity_id = ?");
        let mut rows = self
            .conn
            .query(&sql, [owner_id.as_str(), entity_id.to_string()])
            .await?;

        match rows.next().await? {
            Some(row) => parse_item(&row),
            None => Err(Error::NotFound(format!(
                "No item for entity {entity_id} owned by {owner_id}"
            ))),
        }
    }

    async fn folder_share_for_item(&self, item: &Item) -> Result<Option<Share>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, owner_id, item_id, folder_entity_id, note_entity_id,
                        created_at, updated_at
                 FROM shares WHERE item_id = ? AND kind = ?",
                libsql::params![item.id.as_str(), ShareKind::Folder.as_i64()],
            )
            .await?;

        rows.next().await?.as_ref().map(parse_share).transpose()
    }

    async fn note_share_for_item(
        &self,
        owner_id: &UserId,
        item: &Item,
    ) -> Result<Option<Share>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, owner_id, item_id, folder_entity_id, note_entity_id,
                        created_at, updated_at
                 FROM shares WHERE item_id = ? AND kind = ? AND owner_id = ?",
                libsql::params![
                    item.id.as_str(),
                    ShareKind::Note.as_i64(),
                    owner_id.as_str()
                ],
            )
            .await?;

        rows.next().await?.as_ref().map(parse_share).transpose()
    }
}

fn parse_share(row: &libsql::Row) -> Result<Share> {
    let kind_value = row.get::<i64>(1)?;
    Ok(Share {
        id: row
            .get::<String>(0)?
            .parse()
            .map_err(|_| Error::Database("Invalid share id".to_string()))?,
        kind: ShareKind::from_i64(kind_value)
            .ok_or_else(|| Error::Database(format!("Unknown share kind {kind_value}")))?,
        owner_id: row
            .get::<String>(2)?
            .parse()
            .map_err(|_| Error::Database("Invalid owner id in shares".to_string()))?,
        item_id: row
            .get::<String>(3)?
            .parse()
            .map_err(|_| Error::Database("Invalid item id in shares".to_string()))?,
        folder_entity_id: row.get(4)?,
        note_entity_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn parse_share_user(row: &libsql::Row) -> Result<ShareUser> {
    let status_value = row.get::<i64>(3)?;
    Ok(ShareUser {
        id: row
            .get::<String>(0)?
            .parse()
            .map_err(|_| Error::Database("Invalid share_user id".to_string()))?,
        share_id: row
            .get::<String>(1)?
            .parse()
            .map_err(|_| Error::Database("Invalid share id in share_users".to_string()))?,
        user_id: row
            .get::<String>(2)?
            .parse()
            .map_err(|_| Error::Database("Invalid user id in share_users".to_string()))?,
        status: ShareUserStatus::from_i64(status_value)
            .ok_or_else(|| Error::Database(format!("Unknown share_user status {status_value}")))?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
