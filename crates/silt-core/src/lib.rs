//! silt-core - Core engine for silt
//!
//! This crate contains the item store (metadata rows plus content blobs in
//! pluggable storage drivers), the append-only change log, shares with their
//! membership state, and the background jobs that derive per-user grants and
//! size totals from the log.

pub mod changes;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod items;
pub mod jobs;
pub mod models;
pub mod services;
pub mod shares;
pub mod storage;
pub mod user_items;

pub use error::{Error, Result};
pub use models::{Item, ItemId, ShareId, UserId};
pub use services::StoreService;
