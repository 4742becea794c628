//! Item model
//!
//! An item is a metadata row plus one content blob in a storage driver. The
//! row, its change-log entry, and the initial grant commit in one database
//! transaction; the blob write cannot share that transaction, so a savepoint
//! undoes the row whenever the blob write fails. Invariant: the blob write
//! happens-before the outer commit becomes durable, or the row is rolled
//! back.

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for sizes and LIMIT/OFFSET

use std::collections::{HashSet, VecDeque};

use libsql::Connection;

use crate::changes::ChangeModel;
use crate::error::{Error, Result};
use crate::format;
use crate::models::{
    ChangeKind, EntityKind, Item, ItemId, ItemInput, PreviousItem, UserId,
};
use crate::storage::StorageConnector;
use crate::user_items::UserItemModel;

pub(crate) const ITEM_COLUMNS: &str = "items.id, items.owner_id, items.name, items.mime_type, \
     items.content_storage_id, items.content_size, items.entity_id, items.entity_kind, \
     items.entity_parent_id, items.entity_share_id, items.entity_encrypted, \
     items.entity_updated_at, items.created_at, items.updated_at";

/// Offset/limit window over a listing
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    /// Maximum rows to return
    pub limit: usize,
    /// Rows to skip
    pub offset: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

/// One page of an item listing
#[derive(Debug, Clone)]
pub struct ItemPage {
    /// Items in name order
    pub items: Vec<Item>,
    /// Whether rows exist past this page
    pub has_more: bool,
}

/// One raw input of a batch ingestion
#[derive(Debug, Clone)]
pub struct RawItem {
    /// Target item name
    pub name: String,
    /// Content bytes as received from the sync layer
    pub content: Vec<u8>,
}

/// Per-input outcome of a batch ingestion
#[derive(Debug)]
pub struct BatchSaveResult {
    /// Input name the outcome belongs to
    pub name: String,
    /// Saved item, or the error that skipped this input
    pub outcome: Result<Item>,
}

/// Item repository and save/delete logic
pub struct ItemModel<'a> {
    conn: &'a Connection,
    storage: &'a StorageConnector,
    quota: Option<i64>,
}

impl<'a> ItemModel<'a> {
    /// Create a model over the given connection and storage wiring
    pub const fn new(
        conn: &'a Connection,
        storage: &'a StorageConnector,
        quota: Option<i64>,
    ) -> Self {
        Self {
            conn,
            storage,
            quota,
        }
    }

    /// Save one item (metadata and content) for a user.
    ///
    /// Determines new-vs-update by the `(owner, name)` key. New items also
    /// receive the owner's initial grant; every save appends a change row.
    pub async fn save_for_user(
        &self,
        user_id: &UserId,
        input: ItemInput,
        content: &[u8],
    ) -> Result<Item> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        match self.save_in_tx(user_id, input, content).await {
            Ok(item) => {
                self.conn.execute("COMMIT", ()).await?;
                Ok(item)
            }
            Err(error) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(error)
            }
        }
    }

    /// Batch ingestion from the sync wire format.
    ///
    /// Each input is classified as a serialized entity or an opaque blob and
    /// saved under its own savepoint, so the batch commits as one
    /// transaction while failures stay per item.
    pub async fn save_from_raw(
        &self,
        user_id: &UserId,
        inputs: Vec<RawItem>,
    ) -> Result<Vec<BatchSaveResult>> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        match self.save_from_raw_in_tx(user_id, inputs).await {
            Ok(results) => {
                self.conn.execute("COMMIT", ()).await?;
                Ok(results)
            }
            Err(error) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(error)
            }
        }
    }

    async fn save_from_raw_in_tx(
        &self,
        user_id: &UserId,
        inputs: Vec<RawItem>,
    ) -> Result<Vec<BatchSaveResult>> {
        let mut used = match self.quota {
            Some(_) => self.calculate_total_size(user_id).await?,
            None => 0,
        };

        let mut results = Vec::with_capacity(inputs.len());
        for raw in inputs {
            let name = raw.name.clone();
            let outcome = self.save_raw_input(user_id, raw, &mut used).await;
            if let Err(error) = &outcome {
                tracing::debug!("Batch input {name} rejected: {error}");
            }
            results.push(BatchSaveResult { name, outcome });
        }

        Ok(results)
    }

    async fn save_raw_input(
        &self,
        user_id: &UserId,
        raw: RawItem,
        used: &mut i64,
    ) -> Result<Item> {
        let input = classify(&raw)?;

        let existing_size = self
            .load_by_owner_name(user_id, &input.name)
            .await?
            .map_or(0, |item| item.content_size);
        let delta = raw.content.len() as i64 - existing_size;

        if let Some(cap) = self.quota {
            if *used + delta > cap {
                return Err(Error::Validation(format!(
                    "Cannot save \"{}\": the account would exceed its size limit of {cap} bytes",
                    input.name
                )));
            }
        }

        let item = self.save_in_tx(user_id, input, &raw.content).await?;
        *used += delta;
        Ok(item)
    }

    /// Save inside an already-open transaction, guarded by a savepoint.
    ///
    /// On any failure the savepoint rollback undoes this item's writes and
    /// leaves the surrounding transaction usable.
    async fn save_in_tx(
        &self,
        user_id: &UserId,
        input: ItemInput,
        content: &[u8],
    ) -> Result<Item> {
        self.conn.execute("SAVEPOINT item_save", ()).await?;
        match self.save_guarded(user_id, input, content).await {
            Ok(item) => {
                self.conn.execute("RELEASE item_save", ()).await?;
                Ok(item)
            }
            Err(error) => {
                self.conn.execute("ROLLBACK TO item_save", ()).await.ok();
                self.conn.execute("RELEASE item_save", ()).await.ok();
                Err(error)
            }
        }
    }

    async fn save_guarded(
        &self,
        user_id: &UserId,
        input: ItemInput,
        content: &[u8],
    ) -> Result<Item> {
        let now = chrono::Utc::now().timestamp_millis();
        let changes = ChangeModel::new(self.conn);

        match self.load_by_owner_name(user_id, &input.name).await? {
            None => {
                let item = Item {
                    id: ItemId::new(),
                    owner_id: *user_id,
                    name: input.name.clone(),
                    mime_type: input.mime_type_or_default(),
                    content_storage_id: self.storage.primary_id().to_string(),
                    content_size: content.len() as i64,
                    entity: input.entity.clone(),
                    created_at: now,
                    updated_at: now,
                };

                self.insert_row(&item).await?;
                self.replace_resource_links(&item.id, &input.resource_ids)
                    .await?;
                self.storage.write(&item.id, content).await?;
                changes
                    .record(ChangeKind::Create, &item.id, &item.name, None, user_id)
                    .await?;
                UserItemModel::new(self.conn).add(user_id, &item.id).await?;
                Ok(item)
            }
            Some(before) => {
                let previous_links = self.resource_ids_for(&before.id).await?;
                let previous = PreviousItem::from_item(&before, previous_links);

                let mut item = before.clone();
                item.mime_type = input.mime_type.unwrap_or(item.mime_type);
                item.content_storage_id = self.storage.primary_id().to_string();
                item.content_size = content.len() as i64;
                item.entity = input.entity.clone();
                item.updated_at = now;

                self.update_row(&item, before.updated_at).await?;
                self.replace_resource_links(&item.id, &input.resource_ids)
                    .await?;
                self.storage.write(&item.id, content).await?;
                changes
                    .record(
                        ChangeKind::Update,
                        &item.id,
                        &item.name,
                        Some(&previous),
                        user_id,
                    )
                    .await?;
                Ok(item)
            }
        }
    }

    async fn insert_row(&self, item: &Item) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO items (id, owner_id, name, mime_type, content_storage_id,
                    content_size, entity_id, entity_kind, entity_parent_id, entity_share_id,
                    entity_encrypted, entity_updated_at, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                libsql::params![
                    item.id.as_str(),
                    item.owner_id.as_str(),
                    item.name.as_str(),
                    item.mime_type.as_str(),
                    item.content_storage_id.as_str(),
                    item.content_size,
                    item.entity.id.as_str(),
                    item.entity.kind.map_or(0, EntityKind::as_i64),
                    item.entity.parent_id.as_str(),
                    item.entity.share_id.as_str(),
                    i64::from(item.entity.encrypted),
                    item.entity.updated_at,
                    item.created_at,
                    item.updated_at
                ],
            )
            .await?;
        Ok(())
    }

    /// Conditional update: the caller read the row in this transaction and
    /// assumes exclusive knowledge of its current state.
    async fn update_row(&self, item: &Item, expected_updated_at: i64) -> Result<()> {
        let affected = self
            .conn
            .execute(
                "UPDATE items SET mime_type = ?, content_storage_id = ?, content_size = ?,
                    entity_id = ?, entity_kind = ?, entity_parent_id = ?, entity_share_id = ?,
                    entity_encrypted = ?, entity_updated_at = ?, updated_at = ?
                 WHERE id = ? AND updated_at = ?",
                libsql::params![
                    item.mime_type.as_str(),
                    item.content_storage_id.as_str(),
                    item.content_size,
                    item.entity.id.as_str(),
                    item.entity.kind.map_or(0, EntityKind::as_i64),
                    item.entity.parent_id.as_str(),
                    item.entity.share_id.as_str(),
                    i64::from(item.entity.encrypted),
                    item.entity.updated_at,
                    item.updated_at,
                    item.id.as_str(),
                    expected_updated_at
                ],
            )
            .await?;

        if affected == 0 {
            return Err(Error::Conflict(format!(
                "Item {} changed underneath the update",
                item.id
            )));
        }
        Ok(())
    }

    /// Delete an item.
    ///
    /// The owner path removes shares, grants, resource links, blobs in every
    /// active driver, then the row, all in one transaction. A non-owner
    /// "deleting" a shared root instead only revokes their own membership.
    pub async fn delete(&self, user_id: &UserId, id: &ItemId) -> Result<()> {
        let item = self
            .load_unchecked(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Item {id}")))?;

        if item.owner_id != *user_id {
            return self.leave_shared_root(user_id, &item).await;
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        match self.delete_in_tx(user_id, &item).await {
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

    async fn delete_in_tx(&self, author: &UserId, item: &Item) -> Result<()> {
        // share_users cascade with their share
        self.conn
            .execute("DELETE FROM shares WHERE item_id = ?", [item.id.as_str()])
            .await?;
        UserItemModel::new(self.conn).remove_by_item(&item.id).await?;
        self.conn
            .execute(
                "DELETE FROM item_resources WHERE item_id = ?",
                [item.id.as_str()],
            )
            .await?;
        self.storage.delete(&[item.id]).await?;
        ChangeModel::new(self.conn)
            .record(ChangeKind::Delete, &item.id, &item.name, None, author)
            .await?;
        self.conn
            .execute("DELETE FROM items WHERE id = ?", [item.id.as_str()])
            .await?;
        Ok(())
    }

    /// Non-owner removal of a shared root: revoke membership and grants,
    /// leave the owner's data untouched.
    async fn leave_shared_root(&self, user_id: &UserId, item: &Item) -> Result<()> {
        let share_row = {
            let mut rows = self
                .conn
                .query(
                    "SELECT s.id FROM shares s
                     JOIN share_users su ON su.share_id = s.id
                     WHERE s.item_id = ? AND su.user_id = ?",
                    [item.id.as_str(), user_id.as_str()],
                )
                .await?;
            rows.next().await?.map(|row| row.get::<String>(0)).transpose()?
        };

        let Some(share_id) = share_row else {
            return Err(Error::Forbidden(format!(
                "User {user_id} does not own item {}",
                item.id
            )));
        };

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = self.leave_in_tx(user_id, item, &share_id).await;
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

    async fn leave_in_tx(&self, user_id: &UserId, item: &Item, share_id: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM share_users WHERE share_id = ? AND user_id = ?",
                [share_id.to_string(), user_id.as_str()],
            )
            .await?;
        self.conn
            .execute(
                "DELETE FROM user_items WHERE user_id = ? AND item_id IN (
                     SELECT id FROM items WHERE entity_share_id = ?
                 )",
                [user_id.as_str(), share_id.to_string()],
            )
            .await?;
        UserItemModel::new(self.conn).remove(user_id, &item.id).await?;
        Ok(())
    }

    /// Delete everything a user can reach: exclusively-owned items are
    /// removed outright, shared-in access is revoked.
    pub async fn delete_all(&self, user_id: &UserId) -> Result<()> {
        let user_items = UserItemModel::new(self.conn);

        for item_id in user_items.item_ids_for_user(user_id).await? {
            let Some(item) = self.load_unchecked(&item_id).await? else {
                continue;
            };
            if item.owner_id == *user_id {
                self.delete(user_id, &item_id).await?;
            } else {
                user_items.remove(user_id, &item_id).await?;
            }
        }

        self.conn
            .execute(
                "DELETE FROM share_users WHERE user_id = ?",
                [user_id.as_str()],
            )
            .await?;
        self.conn
            .execute(
                "DELETE FROM account_sizes WHERE user_id = ?",
                [user_id.as_str()],
            )
            .await?;
        Ok(())
    }

    /// Load an item by name, visible to the user via a grant
    pub async fn load_by_name(&self, user_id: &UserId, name: &str) -> Result<Option<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE name = ?
               AND EXISTS (SELECT 1 FROM user_items
                           WHERE item_id = items.id AND user_id = ?)
             ORDER BY created_at LIMIT 1"
        );
        let mut rows = self
            .conn
            .query(&sql, [name.to_string(), user_id.as_str()])
            .await?;

        rows.next().await?.as_ref().map(parse_item).transpose()
    }

    /// Load an item by name together with its content bytes
    pub async fn load_by_name_with_content(
        &self,
        user_id: &UserId,
        name: &str,
    ) -> Result<Option<(Item, Vec<u8>)>> {
        match self.load_by_name(user_id, name).await? {
            Some(item) => {
                let content = self.content(&item).await?;
                Ok(Some((item, content)))
            }
            None => Ok(None),
        }
    }

    /// Load an item by the entity id embedded in its content
    pub async fn load_by_entity_id(
        &self,
        user_id: &UserId,
        entity_id: &str,
    ) -> Result<Option<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE entity_id = ?
               AND EXISTS (SELECT 1 FROM user_items
                           WHERE item_id = items.id AND user_id = ?)
             ORDER BY created_at LIMIT 1"
        );
        let mut rows = self
            .conn
            .query(&sql, [entity_id.to_string(), user_id.as_str()])
            .await?;

        rows.next().await?.as_ref().map(parse_item).transpose()
    }

    /// Read an item's content bytes through the storage connector
    pub async fn content(&self, item: &Item) -> Result<Vec<u8>> {
        self.storage.read(&item.id).await
    }

    /// Paginated listing of the items visible to a user.
    ///
    /// `path_prefix` may end in a single `*` wildcard segment; an empty
    /// prefix lists everything.
    pub async fn children(
        &self,
        user_id: &UserId,
        path_prefix: &str,
        pagination: Pagination,
    ) -> Result<ItemPage> {
        let (filter_sql, filter_value) = if path_prefix.is_empty() {
            (String::new(), None)
        } else if let Some(stem) = path_prefix.strip_suffix('*') {
            (" AND items.name LIKE ?".to_string(), Some(format!("{stem}%")))
        } else {
            (" AND items.name = ?".to_string(), Some(path_prefix.to_string()))
        };

        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items
             JOIN user_items ON user_items.item_id = items.id
             WHERE user_items.user_id = ?{filter_sql}
             ORDER BY items.name
             LIMIT ? OFFSET ?"
        );

        let limit = (pagination.limit + 1) as i64;
        let offset = pagination.offset as i64;
        let mut params: Vec<libsql::Value> = vec![user_id.as_str().into()];
        if let Some(value) = filter_value {
            params.push(value.into());
        }
        params.push(limit.into());
        params.push(offset.into());

        let mut rows = self.conn.query(&sql, params).await?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(parse_item(&row)?);
        }

        let has_more = items.len() > pagination.limit;
        if has_more {
            items.truncate(pagination.limit);
        }

        Ok(ItemPage { items, has_more })
    }

    /// Everything reachable under a shared folder for a set of users,
    /// including linked resource metadata and blobs
    pub async fn shared_folder_children_items(
        &self,
        share_user_ids: &[UserId],
        folder_entity_id: &str,
    ) -> Result<Vec<Item>> {
        shared_children(self.conn, share_user_ids, folder_entity_id).await
    }

    /// Sum of `content_size` over the items the user is granted
    pub async fn calculate_total_size(&self, user_id: &UserId) -> Result<i64> {
        total_content_size(self.conn, user_id).await
    }

    /// Load an item row by id without an access check.
    ///
    /// For internal plumbing (propagation, deletion); the public read API
    /// always joins on grants.
    pub(crate) async fn load_unchecked(&self, id: &ItemId) -> Result<Option<Item>> {
        load_item(self.conn, id).await
    }

    async fn load_by_owner_name(&self, owner_id: &UserId, name: &str) -> Result<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE owner_id = ? AND name = ?");
        let mut rows = self
            .conn
            .query(&sql, [owner_id.as_str(), name.to_string()])
            .await?;
        rows.next().await?.as_ref().map(parse_item).transpose()
    }

    async fn replace_resource_links(&self, item_id: &ItemId, resource_ids: &[String]) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM item_resources WHERE item_id = ?",
                [item_id.as_str()],
            )
            .await?;
        for resource_id in resource_ids {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO item_resources (item_id, resource_id) VALUES (?, ?)",
                    [item_id.as_str(), resource_id.clone()],
                )
                .await?;
        }
        Ok(())
    }

    pub(crate) async fn resource_ids_for(&self, item_id: &ItemId) -> Result<Vec<String>> {
        resource_links(self.conn, item_id).await
    }
}

/// Breadth-first walk over `entity_parent_id`, shared by the item model and
/// the accept-time bulk grant.
pub(crate) async fn shared_children(
    conn: &Connection,
    share_user_ids: &[UserId],
    folder_entity_id: &str,
) -> Result<Vec<Item>> {
    if share_user_ids.is_empty() {
        return Ok(Vec::new());
    }

    let owner_placeholders = vec!["?"; share_user_ids.len()].join(", ");
    let owner_values: Vec<String> = share_user_ids.iter().map(UserId::as_str).collect();

    let mut items = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut resource_ids: Vec<String> = Vec::new();
    let mut queue: VecDeque<String> = VecDeque::from([folder_entity_id.to_string()]);

    while let Some(parent_entity_id) = queue.pop_front() {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE entity_parent_id = ? AND owner_id IN ({owner_placeholders})
             ORDER BY name"
        );
        let mut params: Vec<libsql::Value> = vec![parent_entity_id.into()];
        params.extend(owner_values.iter().cloned().map(libsql::Value::from));

        let mut rows = conn.query(&sql, params).await?;
        while let Some(row) = rows.next().await? {
            let item = parse_item(&row)?;
            if !seen.insert(item.id.as_str()) {
                continue;
            }
            match item.entity.kind {
                Some(EntityKind::Folder) => queue.push_back(item.entity.id.clone()),
                Some(EntityKind::Note) => {
                    let mut links = resource_links(conn, &item.id).await?;
                    resource_ids.append(&mut links);
                }
                _ => {}
            }
            items.push(item);
        }
    }

    // Resource metadata rows and their raw blob companions
    let mut resource_seen = HashSet::new();
    for resource_id in resource_ids {
        if !resource_seen.insert(resource_id.clone()) {
            continue;
        }
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE (entity_id = ? OR name = ?) AND owner_id IN ({owner_placeholders})
             ORDER BY name"
        );
        let mut params: Vec<libsql::Value> = vec![
            resource_id.clone().into(),
            format!(".resource/{resource_id}").into(),
        ];
        params.extend(owner_values.iter().cloned().map(libsql::Value::from));

        let mut rows = conn.query(&sql, params).await?;
        while let Some(row) = rows.next().await? {
            let item = parse_item(&row)?;
            if seen.insert(item.id.as_str()) {
                items.push(item);
            }
        }
    }

    Ok(items)
}

/// Load an item row by id, no access check; shared with the cursor jobs
pub(crate) async fn load_item(conn: &Connection, id: &ItemId) -> Result<Option<Item>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?");
    let mut rows = conn.query(&sql, [id.as_str()]).await?;
    rows.next().await?.as_ref().map(parse_item).transpose()
}

/// Sum of `content_size` over a user's grants; shared with size accounting
pub(crate) async fn total_content_size(conn: &Connection, user_id: &UserId) -> Result<i64> {
    let mut rows = conn
        .query(
            "SELECT COALESCE(SUM(items.content_size), 0)
             FROM items
             JOIN user_items ON user_items.item_id = items.id
             WHERE user_items.user_id = ?",
            [user_id.as_str()],
        )
        .await?;

    match rows.next().await? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(0),
    }
}

async fn resource_links(conn: &Connection, item_id: &ItemId) -> Result<Vec<String>> {
    let mut rows = conn
        .query(
            "SELECT resource_id FROM item_resources WHERE item_id = ? ORDER BY resource_id",
            [item_id.as_str()],
        )
        .await?;

    let mut ids = Vec::new();
    while let Some(row) = rows.next().await? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}

fn classify(raw: &RawItem) -> Result<ItemInput> {
    match format::parse_entity(&raw.content) {
        Some(parsed) => {
            let resource_ids = if parsed.fields.kind == Some(EntityKind::Note) {
                format::linked_resource_ids(&parsed.body)
            } else {
                Vec::new()
            };
            Ok(ItemInput::entity(raw.name.clone(), parsed.fields)?
                .with_resource_ids(resource_ids))
        }
        None => ItemInput::blob(raw.name.clone()),
    }
}

pub(crate) fn parse_item(row: &libsql::Row) -> Result<Item> {
    Ok(Item {
        id: row
            .get::<String>(0)?
            .parse()
            .map_err(|_| Error::Database("Invalid item id".to_string()))?,
        owner_id: row
            .get::<String>(1)?
            .parse()
            .map_err(|_| Error::Database("Invalid owner id".to_string()))?,
        name: row.get(2)?,
        mime_type: row.get(3)?,
        content_storage_id: row.get(4)?,
        content_size: row.get(5)?,
        entity: crate::models::EntityFields {
            id: row.get(6)?,
            kind: EntityKind::from_i64(row.get::<i64>(7)?),
            parent_id: row.get(8)?,
            share_id: row.get(9)?,
            encrypted: row.get::<i64>(10)? != 0,
            updated_at: row.get(11)?,
        },
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}
