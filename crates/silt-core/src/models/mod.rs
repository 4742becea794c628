//! Data models for silt

mod change;
mod ids;
mod item;
mod share;

pub use change::{Change, ChangeKind, PreviousItem};
pub use ids::{ItemId, ShareId, ShareUserId, UserId};
pub use item::{EntityFields, EntityKind, Item, ItemInput};
pub use share::{Share, ShareKind, ShareUser, ShareUserStatus};
