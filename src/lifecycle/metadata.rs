//! The metadata document packed next to each archived directory.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::catalog::{ProcessedReportRecord, ReportType};
use crate::error::Result;
use crate::layout::{is_compressed_container, is_metadata_entry};

/// Snapshot of a record at archive time. Written once into the container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveMetadataDescriptor {
    pub report_info: ProcessedReportRecord,
    /// RFC 3339 timestamp of the archive run.
    pub archive_date: String,
    pub original_path: PathBuf,
    pub original_size: u64,
    pub archive_reason: String,
}

impl ArchiveMetadataDescriptor {
    pub fn new(
        record: &ProcessedReportRecord,
        archive_date: String,
        original_path: &Path,
        original_size: u64,
    ) -> Self {
        Self {
            report_info: record.clone(),
            archive_date,
            original_path: original_path.to_path_buf(),
            original_size,
            archive_reason: archive_reason(record),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Human-readable reason recorded with the archive.
pub fn archive_reason(record: &ProcessedReportRecord) -> String {
    let change = record.change_percentage.filter(|c| *c != 0.0);
    let holding = record.holding_ratio_after.filter(|h| *h != 0.0);
    match (record.report_type, change, holding) {
        (ReportType::Change, Some(change), _) => format!("change: {change:+.2}%"),
        (_, _, Some(holding)) => format!("holding ratio: {holding:.2}%"),
        _ => format!("importance level: {}", record.importance_level),
    }
}

/// Read the metadata document back out of a container.
pub fn read_metadata(container: &Path) -> Result<Option<ArchiveMetadataDescriptor>> {
    let file = BufReader::new(File::open(container)?);
    if is_compressed_container(container) {
        find_metadata(tar::Archive::new(GzDecoder::new(file)))
    } else {
        find_metadata(tar::Archive::new(file))
    }
}

fn find_metadata<R: Read>(mut archive: tar::Archive<R>) -> Result<Option<ArchiveMetadataDescriptor>> {
    for entry in archive.entries()? {
        let entry = entry?;
        let is_meta = entry
            .path()?
            .to_str()
            .map(is_metadata_entry)
            .unwrap_or(false);
        if is_meta {
            return Ok(Some(serde_json::from_reader(entry)?));
        }
    }
    Ok(None)
}
