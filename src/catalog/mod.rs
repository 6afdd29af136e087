//! The catalog of processed filings.
//!
//! The archive core only ever changes `file_location`; rows are created by the
//! ingester and never deleted here.

mod record;
mod sqlite;

use serde::Serialize;
use time::PrimitiveDateTime;

use crate::error::Result;

pub use record::{FileLocation, LocationKind, ProcessedReportRecord, ReportType};
pub use sqlite::SqliteCatalog;

/// Per-location aggregate returned by [`CatalogStore::location_summary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationGroup {
    pub kind: LocationKind,
    pub count: u64,
    pub avg_importance: f64,
}

pub trait CatalogStore {
    /// Insert a record or replace the row with the same `report_id`.
    fn upsert(&self, record: &ProcessedReportRecord) -> Result<()>;

    fn get(&self, report_id: &str) -> Result<Option<ProcessedReportRecord>>;

    /// Active records processed strictly before `cutoff`, ordered by
    /// importance ascending then `processed_at` descending. Rows that cannot
    /// be decoded are skipped.
    fn active_before(&self, cutoff: PrimitiveDateTime) -> Result<Vec<ProcessedReportRecord>>;

    /// Mark every active record older than `cutoff` eligible in one statement.
    /// Returns the number of rows that changed.
    fn mark_pending_before(&self, cutoff: PrimitiveDateTime) -> Result<usize>;

    /// Mark the given records eligible in one transaction. Rows that are no
    /// longer active are left alone and not counted.
    fn mark_pending(&self, report_ids: &[String]) -> Result<usize>;

    /// Records marked eligible, newest first. A row that cannot be decoded
    /// comes back as [`Error::MalformedRecord`](crate::Error::MalformedRecord)
    /// in its slot; the outer error is reserved for store failures.
    fn pending(&self) -> Result<Vec<Result<ProcessedReportRecord>>>;

    /// Returns `false` when no row has this id.
    fn set_location(&self, report_id: &str, location: &FileLocation) -> Result<bool>;

    fn location_summary(&self) -> Result<Vec<LocationGroup>>;

    fn report_type_counts(&self) -> Result<Vec<(ReportType, u64)>>;
}
