//! Share and share-membership models

use serde::{Deserialize, Serialize};

use super::ids::{ItemId, ShareId, ShareUserId, UserId};

/// Kind of a share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareKind {
    /// A single note shared on its own
    Note,
    /// A root folder shared with its whole subtree
    Folder,
}

impl ShareKind {
    /// Integer column representation
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Note => 1,
            Self::Folder => 2,
        }
    }

    /// Parse the integer column representation
    #[must_use]
    pub const fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Note),
            2 => Some(Self::Folder),
            _ => None,
        }
    }
}

/// Invitation state of a share member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareUserStatus {
    /// Invited, not yet answered
    Waiting,
    /// Accepted; member counts toward the visibility set
    Accepted,
    /// Rejected; terminal
    Rejected,
}

impl ShareUserStatus {
    /// Integer column representation
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Waiting => 0,
            Self::Accepted => 1,
            Self::Rejected => 2,
        }
    }

    /// Parse the integer column representation
    #[must_use]
    pub const fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Waiting),
            1 => Some(Self::Accepted),
            2 => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A share record: one owner offering one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    /// Unique identifier; items under the share carry it as `entity.share_id`
    pub id: ShareId,
    /// Share kind
    pub kind: ShareKind,
    /// Offering user
    pub owner_id: UserId,
    /// Item row the share is rooted at
    pub item_id: ItemId,
    /// Shared folder entity id, empty for note shares
    pub folder_entity_id: String,
    /// Shared note entity id, empty for folder shares
    pub note_entity_id: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

/// Membership of one user in one share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareUser {
    /// Unique identifier
    pub id: ShareUserId,
    /// Share this membership belongs to
    pub share_id: ShareId,
    /// Invited user
    pub user_id: UserId,
    /// Invitation state
    pub status: ShareUserStatus,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}
