//! Incremental size accounting
//!
//! Consumes the change feed to keep a per-user total of `content_size`
//! current without rescanning every row. Each affected user is recomputed
//! at most once per run; totals and the advanced cursor persist together.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use libsql::Connection;

use crate::changes::{ChangeModel, ChangePage, CursorStore};
use crate::error::{Error, Result};
use crate::items::{load_item, total_content_size};
use crate::models::UserId;
use crate::user_items::UserItemModel;

/// Cursor-store key of this consumer
pub const ACCOUNTING_CURSOR: &str = "size_accounting";

/// Counters of one accounting run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountingReport {
    /// Pages processed
    pub pages: usize,
    /// Users whose totals were recomputed
    pub users_updated: usize,
}

/// Background job maintaining `account_sizes`
pub struct SizeAccountant<'a> {
    conn: &'a Connection,
    batch: usize,
    running: &'a AtomicBool,
}

impl<'a> SizeAccountant<'a> {
    /// Create a job over the given connection.
    ///
    /// `running` is the reentrancy flag shared by all instances of this
    /// consumer; a second concurrent pass is refused.
    pub const fn new(conn: &'a Connection, batch: usize, running: &'a AtomicBool) -> Self {
        Self {
            conn,
            batch,
            running,
        }
    }

    /// Recompute totals for every user touched by new changes
    pub async fn run(&self) -> Result<AccountingReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::JobRunning(ACCOUNTING_CURSOR));
        }

        let result = self.run_inner().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_inner(&self) -> Result<AccountingReport> {
        let changes = ChangeModel::new(self.conn);
        let cursors = CursorStore::new(self.conn);
        let mut report = AccountingReport::default();
        // Memoized across the whole run: each user is computed once
        let mut computed: HashSet<UserId> = HashSet::new();

        loop {
            let cursor = cursors.load(ACCOUNTING_CURSOR).await?;
            let page = changes.next_page(&cursor, self.batch).await?;
            if page.changes.is_empty() {
                cursors.save(ACCOUNTING_CURSOR, &page.cursor).await?;
                break;
            }

            let affected = self.affected_users(&page).await?;
            let mut totals = Vec::new();
            for user_id in affected {
                if computed.insert(user_id) {
                    totals.push((user_id, total_content_size(self.conn, &user_id).await?));
                }
            }

            self.conn.execute("BEGIN TRANSACTION", ()).await?;
            let persisted = self.persist_totals(&totals).await;
            let saved = match persisted {
                Ok(()) => cursors.save(ACCOUNTING_CURSOR, &page.cursor).await,
                Err(error) => Err(error),
            };
            match saved {
                Ok(()) => self.conn.execute("COMMIT", ()).await?,
                Err(error) => {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(error);
                }
            };

            report.pages += 1;
            report.users_updated += totals.len();
            if !page.has_more {
                break;
            }
        }

        tracing::debug!(
            "Size accounting done: {} pages, {} users",
            report.pages,
            report.users_updated
        );
        Ok(report)
    }

    /// Users whose total a change may move: the author, the item's current
    /// owner, and every current grantee
    async fn affected_users(&self, page: &ChangePage) -> Result<BTreeSet<UserId>> {
        let user_items = UserItemModel::new(self.conn);
        let mut affected = BTreeSet::new();

        for change in &page.changes {
            affected.insert(change.user_id);
            if let Some(item) = load_item(self.conn, &change.item_id).await? {
                affected.insert(item.owner_id);
            }
            for user_id in user_items.users_for_item(&change.item_id).await? {
                affected.insert(user_id);
            }
        }
        Ok(affected)
    }

    async fn persist_totals(&self, totals: &[(UserId, i64)]) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        for (user_id, total_size) in totals {
            self.conn
                .execute(
                    "INSERT INTO account_sizes (user_id, total_size, updated_at)
                     VALUES (?, ?, ?)
                     ON CONFLICT (user_id) DO UPDATE SET
                         total_size = excluded.total_size,
                         updated_at = excluded.updated_at",
                    libsql::params![user_id.as_str(), *total_size, now],
                )
                .await?;
        }
        Ok(())
    }

    /// Last persisted total for a user, if accounting has seen them
    pub async fn total_for(&self, user_id: &UserId) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT total_size FROM account_sizes WHERE user_id = ?",
                [user_id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}
