//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: Initial schema
async fn migrate_v1(conn: &Connection) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // Using a transaction for atomicity

    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Items: metadata rows, one per content blob
        "CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            mime_type TEXT NOT NULL DEFAULT 'application/octet-stream',
            content_storage_id TEXT NOT NULL DEFAULT '',
            content_size INTEGER NOT NULL DEFAULT 0,
            entity_id TEXT NOT NULL DEFAULT '',
            entity_kind INTEGER NOT NULL DEFAULT 0,
            entity_parent_id TEXT NOT NULL DEFAULT '',
            entity_share_id TEXT NOT NULL DEFAULT '',
            entity_encrypted INTEGER NOT NULL DEFAULT 0,
            entity_updated_at INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (owner_id, name)
        )",
        "CREATE INDEX IF NOT EXISTS idx_items_owner ON items(owner_id)",
        "CREATE INDEX IF NOT EXISTS idx_items_entity ON items(entity_id)",
        "CREATE INDEX IF NOT EXISTS idx_items_entity_parent ON items(entity_parent_id)",
        "CREATE INDEX IF NOT EXISTS idx_items_entity_share ON items(entity_share_id)",
        // User-item grants: the read-side authorization edge
        "CREATE TABLE IF NOT EXISTS user_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (user_id, item_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_user_items_item ON user_items(item_id)",
        // Append-only change log; the counter is the consumers' cursor order
        "CREATE TABLE IF NOT EXISTS changes (
            counter INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id TEXT NOT NULL,
            item_name TEXT NOT NULL,
            kind INTEGER NOT NULL,
            previous_item TEXT NOT NULL DEFAULT '',
            user_id TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_changes_item ON changes(item_id)",
        // Shares and their per-recipient membership
        "CREATE TABLE IF NOT EXISTS shares (
            id TEXT PRIMARY KEY,
            kind INTEGER NOT NULL,
            owner_id TEXT NOT NULL,
            item_id TEXT NOT NULL,
            folder_entity_id TEXT NOT NULL DEFAULT '',
            note_entity_id TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_shares_item ON shares(item_id)",
        "CREATE INDEX IF NOT EXISTS idx_shares_owner ON shares(owner_id)",
        "CREATE TABLE IF NOT EXISTS share_users (
            id TEXT PRIMARY KEY,
            share_id TEXT NOT NULL REFERENCES shares(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            status INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (share_id, user_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_share_users_user ON share_users(user_id)",
        // Note -> resource links extracted from note bodies
        "CREATE TABLE IF NOT EXISTS item_resources (
            item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            resource_id TEXT NOT NULL,
            PRIMARY KEY (item_id, resource_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_item_resources_resource ON item_resources(resource_id)",
        // Per-consumer cursors and other small key-value state
        "CREATE TABLE IF NOT EXISTS key_values (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        // Incrementally maintained per-user content totals
        "CREATE TABLE IF NOT EXISTS account_sizes (
            user_id TEXT PRIMARY KEY,
            total_size INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        )",
        // Blob column for the database storage driver
        "CREATE TABLE IF NOT EXISTS item_contents (
            item_id TEXT PRIMARY KEY,
            content BLOB NOT NULL
        )",
        // Record migration version
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap(); // Should not fail

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unique_grant_pair() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        conn.execute(
            "INSERT INTO items (id, owner_id, name, created_at, updated_at)
             VALUES ('i1', 'u1', 'root:/a.md:', 0, 0)",
            (),
        )
        .await
        .unwrap();

        conn.execute(
            "INSERT INTO user_items (user_id, item_id, created_at, updated_at)
             VALUES ('u1', 'i1', 0, 0)",
            (),
        )
        .await
        .unwrap();

        // The unique pair rejects a plain duplicate insert
        assert!(conn
            .execute(
                "INSERT INTO user_items (user_id, item_id, created_at, updated_at)
                 VALUES ('u1', 'i1', 0, 0)",
                (),
            )
            .await
            .is_err());
    }
}
