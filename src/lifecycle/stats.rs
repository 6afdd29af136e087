//! Statistics for archive runs and for the archive as a whole.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::catalog::{LocationGroup, LocationKind};
use crate::error::Result;
use crate::layout::is_container_name;

/// Outcome of one archive run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveRunSummary {
    /// Records newly marked eligible by this run.
    pub marked_count: usize,

    /// Eligible records processed.
    pub scanned_count: usize,

    pub archived_count: usize,

    /// Records whose directory could not be resolved.
    pub not_found_count: usize,

    pub failed_count: usize,

    /// Sum of bytes saved over archived records. Negative when containers
    /// came out larger than their sources.
    pub total_size_saved: i64,

    pub errors: Vec<String>,

    pub duration: Duration,
}

impl ArchiveRunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_archived(&mut self, bytes_saved: i64) {
        self.archived_count += 1;
        self.total_size_saved += bytes_saved;
    }

    pub fn record_not_found(&mut self) {
        self.not_found_count += 1;
    }

    pub fn record_error(&mut self, error: String) {
        self.failed_count += 1;
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        self.failed_count > 0
    }

    pub fn summary(&self) -> String {
        format!(
            "Marked: {}, Scanned: {}, Archived: {}, Not found: {}, Failed: {}, Saved: {} bytes, Duration: {:?}",
            self.marked_count,
            self.scanned_count,
            self.archived_count,
            self.not_found_count,
            self.failed_count,
            self.total_size_saved,
            self.duration
        )
    }
}

/// Point-in-time view of the catalog and the archive root.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveStatistics {
    pub locations: Vec<LocationGroup>,
    pub report_types: BTreeMap<String, u64>,
    pub container_count: u64,
    pub total_archive_bytes: u64,
}

impl ArchiveStatistics {
    pub fn count(&self, kind: LocationKind) -> u64 {
        self.group(kind).map(|g| g.count).unwrap_or(0)
    }

    pub fn avg_importance(&self, kind: LocationKind) -> Option<f64> {
        self.group(kind).map(|g| g.avg_importance)
    }

    pub fn total_archive_mb(&self) -> f64 {
        self.total_archive_bytes as f64 / (1024.0 * 1024.0)
    }

    fn group(&self, kind: LocationKind) -> Option<&LocationGroup> {
        self.locations.iter().find(|g| g.kind == kind)
    }
}

/// Totals over the containers under an archive root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerTotals {
    pub count: u64,
    pub bytes: u64,
}

/// Walk `root` recursively summing container sizes. In-flight `.tmp`
/// files are ignored; a missing root counts as empty.
pub fn scan_containers(root: &Path) -> Result<ContainerTotals> {
    let mut totals = ContainerTotals::default();
    if root.exists() {
        collect_containers(root, &mut totals)?;
    }
    Ok(totals)
}

fn collect_containers(dir: &Path, totals: &mut ContainerTotals) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_containers(&entry.path(), totals)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if is_container_name(name) {
                totals.count += 1;
                totals.bytes += entry.metadata()?.len();
            }
        }
    }
    Ok(())
}
