//! Engine configuration
//!
//! Storage drivers are injected explicitly through this configuration and
//! addressed by a stable identity string recorded on every item row; there
//! is no process-wide driver registry.

use std::path::PathBuf;

use crate::storage::S3Config;

/// Mode of the optional fallback storage driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackMode {
    /// Full mirror: fallback receives every blob
    ReadWrite,
    /// Transitional: fallback receives only a zero-length placeholder,
    /// signalling "moved away" to readers of the old backend
    ReadOnly,
}

/// Physical backend of one storage driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Blobs as files under a root directory
    Filesystem {
        /// Root directory for blob files
        root: PathBuf,
    },
    /// Blobs in the `item_contents` table of the main database
    Database,
    /// Blobs in process memory; test and scratch use only
    Memory,
    /// Blobs in an S3-compatible object store
    S3(S3Config),
}

/// One storage driver: a stable identity plus its backend settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Configuration identity recorded on items as `content_storage_id`.
    /// Must stay stable across restarts for as long as any item row
    /// references it.
    pub id: String,
    /// Backend settings
    pub backend: StorageBackend,
}

impl StorageConfig {
    /// Database-backed driver under the given identity
    #[must_use]
    pub fn database(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            backend: StorageBackend::Database,
        }
    }

    /// Filesystem driver under the given identity
    #[must_use]
    pub fn filesystem(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            backend: StorageBackend::Filesystem { root: root.into() },
        }
    }

    /// In-memory driver under the given identity
    #[must_use]
    pub fn memory(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            backend: StorageBackend::Memory,
        }
    }
}

/// Primary driver plus the optional fallback used during backend migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    /// Read-write driver for all new content
    pub primary: StorageConfig,
    /// Optional second driver consulted on reads that miss the primary
    pub fallback: Option<(StorageConfig, FallbackMode)>,
}

impl StorageSettings {
    /// Settings with a single primary driver
    #[must_use]
    pub const fn new(primary: StorageConfig) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    /// Add a fallback driver
    #[must_use]
    pub fn with_fallback(mut self, config: StorageConfig, mode: FallbackMode) -> Self {
        self.fallback = Some((config, mode));
        self
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Storage driver wiring
    pub storage: StorageSettings,
    /// Change rows per propagation page
    pub propagation_batch: usize,
    /// Change rows per size-accounting page
    pub accounting_batch: usize,
    /// Item rows per content-migration batch
    pub migration_batch: usize,
    /// Attempts per item when a concurrent edit races the migration
    pub migration_max_attempts: u32,
    /// Hard cap on a user's total content size; `None` disables the check
    pub max_total_size_per_user: Option<i64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage: StorageSettings::new(StorageConfig::database("database")),
            propagation_batch: 100,
            accounting_batch: 100,
            migration_batch: 100,
            migration_max_attempts: 3,
            max_total_size_per_user: None,
        }
    }
}

impl EngineConfig {
    /// Replace the storage settings
    #[must_use]
    pub fn with_storage(mut self, storage: StorageSettings) -> Self {
        self.storage = storage;
        self
    }

    /// Set the per-user total-size quota
    #[must_use]
    pub const fn with_quota(mut self, max_total_size_per_user: i64) -> Self {
        self.max_total_size_per_user = Some(max_total_size_per_user);
        self
    }
}
