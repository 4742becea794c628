//! Background maintenance jobs
//!
//! Each job is invoked periodically or on demand, runs to completion, and
//! resumes from its own persisted cursor after a crash. Propagation and
//! accounting may run concurrently with each other but never with
//! themselves.

pub mod accounting;
pub mod migration;
pub mod propagation;

pub use accounting::{AccountingReport, SizeAccountant, ACCOUNTING_CURSOR};
pub use migration::{ContentMigrator, MigrationReport};
pub use propagation::{PropagationReport, SharePropagator, PROPAGATION_CURSOR};
