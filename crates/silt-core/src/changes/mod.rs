//! Append-only change log
//!
//! Every item mutation appends one row; rows are never updated or deleted.
//! Consumers (share propagation, size accounting) each resume from their own
//! persisted cursor, so the log doubles as a crash-safe work queue.

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use libsql::Connection;

use crate::error::{Error, Result};
use crate::models::{Change, ChangeKind, ItemId, PreviousItem, UserId};

/// Opaque position in the change log
///
/// Callers must not interpret the contents; only this module knows the
/// backing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    /// Cursor pointing before the first change
    #[must_use]
    pub fn start() -> Self {
        Self(String::new())
    }

    /// Whether this cursor points before the first change
    #[must_use]
    pub fn is_start(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialized form for persistence
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rehydrate a cursor persisted with [`Cursor::as_str`]
    #[must_use]
    pub fn from_persisted(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    fn counter(&self) -> i64 {
        self.0.parse().unwrap_or(0)
    }

    fn at(counter: i64) -> Self {
        Self(counter.to_string())
    }
}

/// One page of changes plus the cursor to request the next page
#[derive(Debug, Clone)]
pub struct ChangePage {
    /// Changes in log order
    pub changes: Vec<Change>,
    /// Cursor positioned after the last returned change
    pub cursor: Cursor,
    /// Whether more changes were already present past this page
    pub has_more: bool,
}

/// Change-log repository
pub struct ChangeModel<'a> {
    conn: &'a Connection,
}

impl<'a> ChangeModel<'a> {
    /// Create a model over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append one change row.
    ///
    /// Callers run this inside the transaction of the mutation it records.
    pub async fn record(
        &self,
        kind: ChangeKind,
        item_id: &ItemId,
        item_name: &str,
        previous: Option<&PreviousItem>,
        author: &UserId,
    ) -> Result<()> {
        let previous_json = match previous {
            Some(snapshot) => serde_json::to_string(snapshot)?,
            None => String::new(),
        };
        let now = chrono::Utc::now().timestamp_millis();

        self.conn
            .execute(
                "INSERT INTO changes (item_id, item_name, kind, previous_item, user_id, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                libsql::params![
                    item_id.as_str(),
                    item_name,
                    kind.as_i64(),
                    previous_json,
                    author.as_str(),
                    now
                ],
            )
            .await?;

        Ok(())
    }

    /// Fetch the next page of changes after the cursor.
    ///
    /// Returns up to `limit` changes, the advanced cursor, and whether more
    /// changes already exist past the page.
    pub async fn next_page(&self, cursor: &Cursor, limit: usize) -> Result<ChangePage> {
        let mut rows = self
            .conn
            .query(
                "SELECT counter, item_id, item_name, kind, previous_item, user_id, created_at
                 FROM changes
                 WHERE counter > ?
                 ORDER BY counter ASC
                 LIMIT ?",
                libsql::params![cursor.counter(), (limit + 1) as i64],
            )
            .await?;

        let mut changes = Vec::new();
        while let Some(row) = rows.next().await? {
            changes.push(parse_change(&row)?);
        }

        let has_more = changes.len() > limit;
        if has_more {
            changes.truncate(limit);
        }

        let cursor = changes
            .last()
            .map_or_else(|| cursor.clone(), |change| Cursor::at(change.counter));

        Ok(ChangePage {
            changes,
            cursor,
            has_more,
        })
    }
}

fn parse_change(row: &libsql::Row) -> Result<Change> {
    let kind_value = row.get::<i64>(3)?;
    let kind = ChangeKind::from_i64(kind_value)
        .ok_or_else(|| Error::Database(format!("Unknown change kind {kind_value}")))?;

    let previous_json = row.get::<String>(4)?;
    let previous_item = if previous_json.is_empty() {
        None
    } else {
        Some(serde_json::from_str::<PreviousItem>(&previous_json)?)
    };

    Ok(Change {
        counter: row.get(0)?,
        item_id: row
            .get::<String>(1)?
            .parse()
            .map_err(|_| Error::Database("Invalid item id in change log".to_string()))?,
        item_name: row.get(2)?,
        kind,
        previous_item,
        user_id: row
            .get::<String>(5)?
            .parse()
            .map_err(|_| Error::Database("Invalid user id in change log".to_string()))?,
        created_at: row.get(6)?,
    })
}

/// Per-consumer cursor persistence over the `key_values` table
pub struct CursorStore<'a> {
    conn: &'a Connection,
}

impl<'a> CursorStore<'a> {
    /// Create a store over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Load the last persisted cursor for a consumer; start of log if none
    pub async fn load(&self, consumer: &str) -> Result<Cursor> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM key_values WHERE key = ?",
                [Self::key(consumer)],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Cursor::from_persisted(row.get::<String>(0)?)),
            None => Ok(Cursor::start()),
        }
    }

    /// Persist a consumer's cursor.
    ///
    /// Callers run this inside the transaction that applies the page the
    /// cursor accounts for, so a crash either replays the page or skips it
    /// as a whole.
    pub async fn save(&self, consumer: &str, cursor: &Cursor) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn
            .execute(
                "INSERT OR REPLACE INTO key_values (key, value, updated_at) VALUES (?, ?, ?)",
                libsql::params![Self::key(consumer), cursor.as_str(), now],
            )
            .await?;
        Ok(())
    }

    fn key(consumer: &str) -> String {
        format!("cursor:{consumer}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::Database;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    async fn record_updates(model: &ChangeModel<'_>, count: usize) -> UserId {
        let author = UserId::new();
        for index in 0..count {
            model
                .record(
                    ChangeKind::Create,
                    &ItemId::new(),
                    &format!("root:/{index}.md:"),
                    None,
                    &author,
                )
                .await
                .unwrap();
        }
        author
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_next_page_orders_and_paginates() {
        let db = setup().await;
        let model = ChangeModel::new(db.connection());
        record_updates(&model, 3).await;

        let first = model.next_page(&Cursor::start(), 2).await.unwrap();
        assert_eq!(first.changes.len(), 2);
        assert!(first.has_more);
        assert!(first.changes[0].counter < first.changes[1].counter);

        let second = model.next_page(&first.cursor, 2).await.unwrap();
        assert_eq!(second.changes.len(), 1);
        assert!(!second.has_more);

        let empty = model.next_page(&second.cursor, 2).await.unwrap();
        assert!(empty.changes.is_empty());
        assert_eq!(empty.cursor, second.cursor);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_previous_item_snapshot_roundtrip() {
        let db = setup().await;
        let model = ChangeModel::new(db.connection());
        let author = UserId::new();
        let item_id = ItemId::new();

        let snapshot = PreviousItem {
            name: "root:/n.md:".to_string(),
            share_id: "s1".to_string(),
            ..PreviousItem::default()
        };
        model
            .record(
                ChangeKind::Update,
                &item_id,
                "root:/n.md:",
                Some(&snapshot),
                &author,
            )
            .await
            .unwrap();

        let page = model.next_page(&Cursor::start(), 10).await.unwrap();
        assert_eq!(page.changes.len(), 1);
        assert_eq!(page.changes[0].kind, ChangeKind::Update);
        assert_eq!(page.changes[0].previous_item.as_ref().unwrap(), &snapshot);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cursor_store_roundtrip() {
        let db = setup().await;
        let model = ChangeModel::new(db.connection());
        let store = CursorStore::new(db.connection());

        assert!(store.load("share_propagation").await.unwrap().is_start());

        record_updates(&model, 1).await;
        let page = model.next_page(&Cursor::start(), 10).await.unwrap();
        store.save("share_propagation", &page.cursor).await.unwrap();

        let loaded = store.load("share_propagation").await.unwrap();
        assert_eq!(loaded, page.cursor);

        // Consumers are independent
        assert!(store.load("size_accounting").await.unwrap().is_start());
    }
}
