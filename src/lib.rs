//! Retention and cold-storage archiving for processed filing artifacts.
//!
//! Filings land in an active storage tree and are tracked in a catalog.
//! Once a record outlives its retention period its directory is packed
//! into a month-bucketed container under the archive root, the catalog is
//! pointed at the container, and the source is removed. Archived reports
//! can be restored on demand.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod layout;
pub mod lifecycle;

pub use catalog::{CatalogStore, FileLocation, ProcessedReportRecord, ReportType, SqliteCatalog};
pub use config::{ArchiveConfig, RetentionPolicy};
pub use error::{Error, Result};
pub use lifecycle::{ArchiveOrchestrator, ArchiveRunSummary, ArchiveStatistics};
