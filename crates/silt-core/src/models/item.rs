//! Item model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::ids::{ItemId, UserId};

/// Kind of the entity serialized inside an item's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// A note with a text body
    Note,
    /// A folder grouping notes and sub-folders
    Folder,
    /// Metadata for a binary resource referenced from note bodies
    Resource,
}

impl EntityKind {
    /// Integer column representation
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Note => 1,
            Self::Folder => 2,
            Self::Resource => 3,
        }
    }

    /// Parse the integer column representation; 0 means "not an entity"
    #[must_use]
    pub const fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Note),
            2 => Some(Self::Folder),
            3 => Some(Self::Resource),
            _ => None,
        }
    }

    /// Parse the `type_` property of a serialized entity
    #[must_use]
    pub fn from_type_property(value: &str) -> Option<Self> {
        match value.trim() {
            "1" => Some(Self::Note),
            "2" => Some(Self::Folder),
            "3" => Some(Self::Resource),
            _ => None,
        }
    }
}

/// Fields mirrored from the entity serialized inside an item's content,
/// so callers can query without deserializing the blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFields {
    /// Entity id embedded in the serialized content
    pub id: String,
    /// Entity kind
    pub kind: Option<EntityKind>,
    /// Parent folder entity id, empty at the tree root
    pub parent_id: String,
    /// Owning share id assigned by the client, empty when unshared
    pub share_id: String,
    /// Whether client-side encryption was applied to the content
    pub encrypted: bool,
    /// Entity modification time (Unix ms) as reported by the client
    pub updated_at: i64,
}

/// An item row: named, owned metadata for one content blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier
    pub id: ItemId,
    /// Owning user
    pub owner_id: UserId,
    /// Opaque path-like key, unique per owner (e.g. `root:/<id>.md:`)
    pub name: String,
    /// Content MIME type
    pub mime_type: String,
    /// Configuration identity of the driver holding the blob
    pub content_storage_id: String,
    /// Blob length in bytes
    pub content_size: i64,
    /// Mirrored entity fields; `kind` is `None` for opaque blobs
    pub entity: EntityFields,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Item {
    /// Whether this item wraps a serialized entity
    #[must_use]
    pub const fn is_entity(&self) -> bool {
        self.entity.kind.is_some()
    }

    /// Whether this item is a folder at the root of its owner's tree
    #[must_use]
    pub fn is_root_folder(&self) -> bool {
        matches!(self.entity.kind, Some(EntityKind::Folder)) && self.entity.parent_id.is_empty()
    }
}

/// Validated input for saving an item
#[derive(Debug, Clone, Default)]
pub struct ItemInput {
    /// Opaque path-like key, unique per owner
    pub name: String,
    /// Content MIME type; defaults to `application/octet-stream`
    pub mime_type: Option<String>,
    /// Mirrored entity fields when the content is a serialized entity
    pub entity: EntityFields,
    /// Resource ids linked from a note body
    pub resource_ids: Vec<String>,
}

impl ItemInput {
    /// Create an input for an opaque blob
    pub fn blob(name: impl Into<String>) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(Error::Validation("Item name cannot be empty".to_string()));
        }
        Ok(Self {
            name,
            ..Self::default()
        })
    }

    /// Create an input for a serialized entity
    pub fn entity(name: impl Into<String>, entity: EntityFields) -> Result<Self> {
        let mut input = Self::blob(name)?;
        if entity.id.trim().is_empty() {
            return Err(Error::Validation("Entity id cannot be empty".to_string()));
        }
        input.mime_type = Some("text/markdown".to_string());
        input.entity = entity;
        Ok(input)
    }

    /// Attach linked resource ids extracted from a note body
    #[must_use]
    pub fn with_resource_ids(mut self, resource_ids: Vec<String>) -> Self {
        self.resource_ids = resource_ids;
        self
    }

    /// Effective MIME type for the row
    #[must_use]
    pub fn mime_type_or_default(&self) -> String {
        self.mime_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }
}
