//! Change-log model

use serde::{Deserialize, Serialize};

use super::ids::{ItemId, UserId};
use super::item::{EntityKind, Item};

/// Kind of a logged item mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// First save of an item
    Create,
    /// Later save replacing metadata and content
    Update,
    /// Item removal
    Delete,
}

impl ChangeKind {
    /// Integer column representation
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Create => 1,
            Self::Update => 2,
            Self::Delete => 3,
        }
    }

    /// Parse the integer column representation
    #[must_use]
    pub const fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Create),
            2 => Some(Self::Update),
            3 => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Snapshot of the fields an Update change needs from the prior row
///
/// This is the minimal set consumers inspect: share comparison for
/// propagation and link bookkeeping for deletes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousItem {
    /// Prior item name
    pub name: String,
    /// Prior entity kind
    pub kind: Option<EntityKind>,
    /// Prior parent folder entity id
    pub parent_id: String,
    /// Prior owning share id
    pub share_id: String,
    /// Resource ids linked from the prior note body
    #[serde(default)]
    pub resource_ids: Vec<String>,
}

impl PreviousItem {
    /// Snapshot the relevant fields of an item row
    #[must_use]
    pub fn from_item(item: &Item, resource_ids: Vec<String>) -> Self {
        Self {
            name: item.name.clone(),
            kind: item.entity.kind,
            parent_id: item.entity.parent_id.clone(),
            share_id: item.entity.share_id.clone(),
            resource_ids,
        }
    }
}

/// One row of the append-only change log
///
/// Rows are never mutated after insert; consumers track an opaque cursor
/// over the `counter` ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Monotonic position in the log
    pub counter: i64,
    /// Mutated item
    pub item_id: ItemId,
    /// Item name at mutation time
    pub item_name: String,
    /// Mutation kind
    pub kind: ChangeKind,
    /// Prior-field snapshot, present on Update only
    pub previous_item: Option<PreviousItem>,
    /// User whose request produced the mutation
    pub user_id: UserId,
    /// Insertion timestamp (Unix ms)
    pub created_at: i64,
}
