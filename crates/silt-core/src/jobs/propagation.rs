//! Share propagation
//!
//! Derives user-item grants from the change feed instead of fanning out on
//! the write path. Every grant is an `ON CONFLICT DO NOTHING` insert and
//! every revoke a plain delete, so a crashed pass can replay its page
//! without harm; the cursor only advances in the same transaction as the
//! page's writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use libsql::Connection;

use crate::changes::{ChangeModel, ChangePage, CursorStore};
use crate::error::{Error, Result};
use crate::items::load_item;
use crate::models::{Change, ChangeKind, ItemId, ShareId, UserId};
use crate::shares::ShareModel;
use crate::user_items::UserItemModel;

/// Cursor-store key of this consumer
pub const PROPAGATION_CURSOR: &str = "share_propagation";

/// Counters of one propagation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// Pages processed
    pub pages: usize,
    /// Grant inserts issued (duplicates included; they are absorbed)
    pub granted: usize,
    /// Revoke deletes issued
    pub revoked: usize,
}

/// Background engine keeping grants consistent with share membership
pub struct SharePropagator<'a> {
    conn: &'a Connection,
    batch: usize,
    running: &'a AtomicBool,
}

impl<'a> SharePropagator<'a> {
    /// Create an engine over the given connection.
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

    /// Process the change feed from the persisted cursor to its end
    pub async fn run(&self) -> Result<PropagationReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::JobRunning(PROPAGATION_CURSOR));
        }

        let result = self.run_inner().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_inner(&self) -> Result<PropagationReport> {
        let changes = ChangeModel::new(self.conn);
        let cursors = CursorStore::new(self.conn);
        let mut report = PropagationReport::default();

        loop {
            let cursor = cursors.load(PROPAGATION_CURSOR).await?;
            let page = changes.next_page(&cursor, self.batch).await?;
            if page.changes.is_empty() {
                cursors.save(PROPAGATION_CURSOR, &page.cursor).await?;
                break;
            }

            // An error below aborts the page without advancing the cursor;
            // the next run replays it.
            self.conn.execute("BEGIN TRANSACTION", ()).await?;
            let applied = self.apply_page(&page, &mut report).await;
            let saved = match applied {
                Ok(()) => cursors.save(PROPAGATION_CURSOR, &page.cursor).await,
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
            if !page.has_more {
                break;
            }
        }

        tracing::debug!(
            "Share propagation done: {} pages, {} grants, {} revokes",
            report.pages,
            report.granted,
            report.revoked
        );
        Ok(report)
    }

    async fn apply_page(&self, page: &ChangePage, report: &mut PropagationReport) -> Result<()> {
        // Share membership is resolved once per share per page
        let mut members: HashMap<String, Vec<UserId>> = HashMap::new();

        for change in &page.changes {
            self.apply_change(change, &mut members, report).await?;
        }
        Ok(())
    }

    async fn apply_change(
        &self,
        change: &Change,
        members: &mut HashMap<String, Vec<UserId>>,
        report: &mut PropagationReport,
    ) -> Result<()> {
        match change.kind {
            ChangeKind::Create => {
                let Some(item) = load_item(self.conn, &change.item_id).await? else {
                    return Ok(());
                };
                if item.entity.share_id.is_empty() {
                    return Ok(());
                }
                self.grant_members(
                    &item.entity.share_id,
                    &item.id,
                    &change.user_id,
                    members,
                    report,
                )
                .await
            }
            ChangeKind::Update => {
                let Some(item) = load_item(self.conn, &change.item_id).await? else {
                    return Ok(());
                };
                let previous_share = change
                    .previous_item
                    .as_ref()
                    .map_or(String::new(), |previous| previous.share_id.clone());
                let current_share = item.entity.share_id.clone();

                // Unchanged share id: an unrelated edit, nothing to do
                if previous_share == current_share {
                    return Ok(());
                }

                if !previous_share.is_empty() {
                    self.revoke_members(&previous_share, &item.id, &change.user_id, members, report)
                        .await?;
                }
                if !current_share.is_empty() {
                    self.grant_members(&current_share, &item.id, &change.user_id, members, report)
                        .await?;
                }
                Ok(())
            }
            // Deletion already cascades grant removal synchronously
            ChangeKind::Delete => Ok(()),
        }
    }

    async fn grant_members(
        &self,
        share_id: &str,
        item_id: &ItemId,
        author: &UserId,
        members: &mut HashMap<String, Vec<UserId>>,
        report: &mut PropagationReport,
    ) -> Result<()> {
        let user_items = UserItemModel::new(self.conn);
        for user_id in self.members_of(share_id, members).await? {
            if user_id == *author {
                continue;
            }
            user_items.add(&user_id, item_id).await?;
            report.granted += 1;
        }
        Ok(())
    }

    async fn revoke_members(
        &self,
        share_id: &str,
        item_id: &ItemId,
        author: &UserId,
        members: &mut HashMap<String, Vec<UserId>>,
        report: &mut PropagationReport,
    ) -> Result<()> {
        let user_items = UserItemModel::new(self.conn);
        for user_id in self.members_of(share_id, members).await? {
            if user_id == *author {
                continue;
            }
            user_items.remove(&user_id, item_id).await?;
            report.revoked += 1;
        }
        Ok(())
    }

    /// Visibility set of a share referenced from an item row.
    ///
    /// A dangling or unparseable share id yields the empty set: the share
    /// was deleted after the change was logged.
    async fn members_of(
        &self,
        share_id: &str,
        members: &mut HashMap<String, Vec<UserId>>,
    ) -> Result<Vec<UserId>> {
        if let Some(cached) = members.get(share_id) {
            return Ok(cached.clone());
        }

        let resolved = match share_id.parse::<ShareId>() {
            Ok(parsed) => {
                let shares = ShareModel::new(self.conn);
                match shares.find(&parsed).await? {
                    Some(share) => shares.all_share_user_ids(&share).await?,
                    None => Vec::new(),
                }
            }
            Err(_) => Vec::new(),
        };

        members.insert(share_id.to_string(), resolved.clone());
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::changes::Cursor;
    use crate::db::Database;
    use crate::items::ItemModel;
    use crate::models::{EntityFields, EntityKind, ItemInput, ShareUserStatus};
    use crate::storage::{MemoryDriver, StorageConnector, StorageHandle};

    fn connector() -> StorageConnector {
        StorageConnector::new(
            StorageHandle::new("memory", Arc::new(MemoryDriver::new())),
            None,
        )
    }

    struct Fixture {
        db: Database,
        storage: StorageConnector,
        running: AtomicBool,
    }

    impl Fixture {
        async fn new() -> Self {
            Self {
                db: Database::open_in_memory().await.unwrap(),
                storage: connector(),
                running: AtomicBool::new(false),
            }
        }

        fn items(&self) -> ItemModel<'_> {
            ItemModel::new(self.db.connection(), &self.storage, None)
        }

        fn shares(&self) -> ShareModel<'_> {
            ShareModel::new(self.db.connection())
        }

        fn user_items(&self) -> UserItemModel<'_> {
            UserItemModel::new(self.db.connection())
        }

        fn propagator(&self) -> SharePropagator<'_> {
            SharePropagator::new(self.db.connection(), 100, &self.running)
        }
    }

    fn folder_input(name: &str, entity_id: &str, parent_id: &str, share_id: &str) -> ItemInput {
        ItemInput::entity(
            name,
            EntityFields {
                id: entity_id.to_string(),
                kind: Some(EntityKind::Folder),
                parent_id: parent_id.to_string(),
                share_id: share_id.to_string(),
                ..EntityFields::default()
            },
        )
        .unwrap()
    }

    fn note_input(name: &str, entity_id: &str, parent_id: &str, share_id: &str) -> ItemInput {
        ItemInput::entity(
            name,
            EntityFields {
                id: entity_id.to_string(),
                kind: Some(EntityKind::Note),
                parent_id: parent_id.to_string(),
                share_id: share_id.to_string(),
                ..EntityFields::default()
            },
        )
        .unwrap()
    }

    /// Owner with an accepted member on a shared root folder
    async fn shared_folder_fixture(fx: &Fixture) -> (UserId, UserId, String) {
        let owner = UserId::new();
        let member = UserId::new();

        fx.items()
            .save_for_user(&owner, folder_input("root:/f1.md:", "f1", "", ""), b"F1")
            .await
            .unwrap();
        let share = fx.shares().share_folder(&owner, "f1").await.unwrap();
        fx.shares().add_user(&share.id, &member).await.unwrap();
        fx.shares()
            .set_status(&share.id, &member, ShareUserStatus::Accepted)
            .await
            .unwrap();

        (owner, member, share.id.as_str())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_inside_shared_folder_grants_members() {
        let fx = Fixture::new().await;
        let (owner, member, share_id) = shared_folder_fixture(&fx).await;

        // Created after the accept-time bulk grant: only the Create change
        // in the feed can make this visible to the member
        let note = fx
            .items()
            .save_for_user(
                &owner,
                note_input("root:/n9.md:", "n9", "f1", &share_id),
                b"N9",
            )
            .await
            .unwrap();
        assert!(!fx.user_items().has(&member, &note.id).await.unwrap());

        fx.propagator().run().await.unwrap();
        assert!(fx.user_items().has(&member, &note.id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_move_out_revokes_and_move_back_restores() {
        let fx = Fixture::new().await;
        let (owner, member, share_id) = shared_folder_fixture(&fx).await;

        let note = fx
            .items()
            .save_for_user(
                &owner,
                note_input("root:/n1.md:", "n1", "f1", &share_id),
                b"N1",
            )
            .await
            .unwrap();
        fx.propagator().run().await.unwrap();
        assert!(fx.user_items().has(&member, &note.id).await.unwrap());

        // Move the note out of the shared tree
        fx.items()
            .save_for_user(&owner, note_input("root:/n1.md:", "n1", "", ""), b"N1")
            .await
            .unwrap();
        fx.propagator().run().await.unwrap();
        assert!(!fx.user_items().has(&member, &note.id).await.unwrap());

        // And back in
        fx.items()
            .save_for_user(
                &owner,
                note_input("root:/n1.md:", "n1", "f1", &share_id),
                b"N1",
            )
            .await
            .unwrap();
        fx.propagator().run().await.unwrap();
        assert!(fx.user_items().has(&member, &note.id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_moving_one_sibling_leaves_the_other_granted() {
        let fx = Fixture::new().await;
        let (owner, member, share_id) = shared_folder_fixture(&fx).await;

        let moved = fx
            .items()
            .save_for_user(
                &owner,
                note_input("root:/n1.md:", "n1", "f1", &share_id),
                b"N1",
            )
            .await
            .unwrap();
        let sibling = fx
            .items()
            .save_for_user(
                &owner,
                note_input("root:/n2.md:", "n2", "f1", &share_id),
                b"N2",
            )
            .await
            .unwrap();
        fx.propagator().run().await.unwrap();

        fx.items()
            .save_for_user(&owner, note_input("root:/n1.md:", "n1", "", ""), b"N1")
            .await
            .unwrap();
        fx.propagator().run().await.unwrap();

        assert!(!fx.user_items().has(&member, &moved.id).await.unwrap());
        assert!(fx.user_items().has(&member, &sibling.id).await.unwrap());
        let kept = fx
            .items()
            .load_unchecked(&sibling.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.entity.share_id, share_id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unrelated_edit_is_skipped() {
        let fx = Fixture::new().await;
        let (owner, member, share_id) = shared_folder_fixture(&fx).await;

        let note = fx
            .items()
            .save_for_user(
                &owner,
                note_input("root:/n1.md:", "n1", "f1", &share_id),
                b"N1",
            )
            .await
            .unwrap();
        fx.propagator().run().await.unwrap();
        let granted_at = fx
            .user_items()
            .granted_at(&member, &note.id)
            .await
            .unwrap()
            .unwrap();

        // Content-only edit: the share id does not change
        fx.items()
            .save_for_user(
                &owner,
                note_input("root:/n1.md:", "n1", "f1", &share_id),
                b"N1 v2",
            )
            .await
            .unwrap();
        let report = fx.propagator().run().await.unwrap();

        assert_eq!(report.granted, 0);
        assert_eq!(report.revoked, 0);
        assert_eq!(
            fx.user_items()
                .granted_at(&member, &note.id)
                .await
                .unwrap(),
            Some(granted_at)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replay_is_idempotent() {
        let fx = Fixture::new().await;
        let (owner, member, share_id) = shared_folder_fixture(&fx).await;

        let note = fx
            .items()
            .save_for_user(
                &owner,
                note_input("root:/n1.md:", "n1", "f1", &share_id),
                b"N1",
            )
            .await
            .unwrap();
        fx.propagator().run().await.unwrap();
        let granted_at = fx
            .user_items()
            .granted_at(&member, &note.id)
            .await
            .unwrap()
            .unwrap();

        // Reset the cursor, as if a crash lost the last page boundary
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        CursorStore::new(fx.db.connection())
            .save(PROPAGATION_CURSOR, &Cursor::start())
            .await
            .unwrap();
        fx.propagator().run().await.unwrap();

        // Same grants, untouched timestamps
        assert_eq!(
            fx.user_items()
                .granted_at(&member, &note.id)
                .await
                .unwrap(),
            Some(granted_at)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_author_is_not_granted_or_revoked() {
        let fx = Fixture::new().await;
        let (owner, _member, share_id) = shared_folder_fixture(&fx).await;

        let note = fx
            .items()
            .save_for_user(
                &owner,
                note_input("root:/n1.md:", "n1", "f1", &share_id),
                b"N1",
            )
            .await
            .unwrap();
        fx.propagator().run().await.unwrap();

        // The owner moved their own note out: their grant stays as the
        // change author, only other members are revoked
        fx.items()
            .save_for_user(&owner, note_input("root:/n1.md:", "n1", "", ""), b"N1")
            .await
            .unwrap();
        fx.propagator().run().await.unwrap();
        assert!(fx.user_items().has(&owner, &note.id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_changes_are_no_ops() {
        let fx = Fixture::new().await;
        let (owner, _member, share_id) = shared_folder_fixture(&fx).await;

        let note = fx
            .items()
            .save_for_user(
                &owner,
                note_input("root:/n1.md:", "n1", "f1", &share_id),
                b"N1",
            )
            .await
            .unwrap();
        fx.items().delete(&owner, &note.id).await.unwrap();

        let report = fx.propagator().run().await.unwrap();
        // The Create grant ran against a vanished row; the Delete is a no-op
        assert_eq!(report.revoked, 0);
        assert!(!fx.user_items().has(&owner, &note.id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_second_concurrent_pass_is_refused() {
        let fx = Fixture::new().await;
        fx.running.store(true, Ordering::SeqCst);

        let err = fx.propagator().run().await.unwrap_err();
        assert!(matches!(err, Error::JobRunning(_)));

        // A finished pass releases the flag for the next one
        fx.running.store(false, Ordering::SeqCst);
        fx.propagator().run().await.unwrap();
        fx.propagator().run().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cursor_only_advances_past_processed_pages() {
        let fx = Fixture::new().await;
        let (owner, _member, share_id) = shared_folder_fixture(&fx).await;

        fx.items()
            .save_for_user(
                &owner,
                note_input("root:/n1.md:", "n1", "f1", &share_id),
                b"N1",
            )
            .await
            .unwrap();

        let report = fx.propagator().run().await.unwrap();
        assert!(report.pages >= 1);

        // Nothing new: the next run processes zero pages
        let report = fx.propagator().run().await.unwrap();
        assert_eq!(report.pages, 0);
    }
}
