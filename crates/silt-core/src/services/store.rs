//! Store service wiring database, storage, and jobs together

use std::path::Path;
use std::sync::atomic::AtomicBool;

use crate::changes::ChangeModel;
use crate::config::{EngineConfig, StorageConfig};
use crate::db::Database;
use crate::error::Result;
use crate::items::ItemModel;
use crate::jobs::{ContentMigrator, SharePropagator, SizeAccountant};
use crate::shares::ShareModel;
use crate::storage::{StorageConnector, StorageHandle};
use crate::user_items::UserItemModel;

/// One engine instance: database, storage connector, and job state
///
/// Models are cheap borrow-style views; create them per call.
pub struct StoreService {
    db: Database,
    storage: StorageConnector,
    config: EngineConfig,
    propagation_running: AtomicBool,
    accounting_running: AtomicBool,
}

impl StoreService {
    /// Open a service backed by a database file
    pub async fn open(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let db = Database::open(path).await?;
        Ok(Self::wire(db, config))
    }

    /// Open an in-memory service with the default configuration
    /// (database-backed blob storage); primarily for tests
    pub async fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with(EngineConfig::default()).await
    }

    /// Open an in-memory service with an explicit configuration
    pub async fn open_in_memory_with(config: EngineConfig) -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::wire(db, config))
    }

    fn wire(db: Database, config: EngineConfig) -> Self {
        let storage = StorageConnector::from_settings(&config.storage, db.connection());
        tracing::info!(
            "Store service ready (primary storage driver: {})",
            storage.primary_id()
        );
        Self {
            db,
            storage,
            config,
            propagation_running: AtomicBool::new(false),
            accounting_running: AtomicBool::new(false),
        }
    }

    /// The underlying database connection
    pub const fn connection(&self) -> &libsql::Connection {
        self.db.connection()
    }

    /// The active storage connector
    pub const fn storage(&self) -> &StorageConnector {
        &self.storage
    }

    /// Item model bound to this service's storage and quota settings
    pub fn items(&self) -> ItemModel<'_> {
        ItemModel::new(
            self.db.connection(),
            &self.storage,
            self.config.max_total_size_per_user,
        )
    }

    /// Share model
    pub fn shares(&self) -> ShareModel<'_> {
        ShareModel::new(self.db.connection())
    }

    /// Grant model
    pub fn user_items(&self) -> UserItemModel<'_> {
        UserItemModel::new(self.db.connection())
    }

    /// Change-log model
    pub fn changes(&self) -> ChangeModel<'_> {
        ChangeModel::new(self.db.connection())
    }

    /// Share propagation job
    pub fn propagator(&self) -> SharePropagator<'_> {
        SharePropagator::new(
            self.db.connection(),
            self.config.propagation_batch,
            &self.propagation_running,
        )
    }

    /// Size accounting job
    pub fn accountant(&self) -> SizeAccountant<'_> {
        SizeAccountant::new(
            self.db.connection(),
            self.config.accounting_batch,
            &self.accounting_running,
        )
    }

    /// Content migration job toward the given target driver
    pub fn migrator(&self, target: &StorageConfig) -> ContentMigrator<'_> {
        let handle = StorageHandle::from_config(target, self.db.connection());
        ContentMigrator::new(
            self.db.connection(),
            &self.storage,
            handle,
            self.config.migration_batch,
            self.config.migration_max_attempts,
        )
    }
}
