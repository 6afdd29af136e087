use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

const ACTIVE: &str = "active";
const PENDING: &str = "archived";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Initial,
    Change,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Initial => "initial",
            ReportType::Change => "change",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = String;

    /// Accepts the labels written by the upstream ingester as well as ours.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "initial" | "大量保有報告書" => Ok(ReportType::Initial),
            "change" | "変更報告書" => Ok(ReportType::Change),
            other => Err(format!("unknown report type: {other}")),
        }
    }
}

/// Where a record's artifacts currently live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileLocation {
    Active,
    /// Marked eligible by the retention pass; still on active storage.
    PendingArchive,
    ArchivedAt(PathBuf),
}

impl FileLocation {
    /// Catalog column encoding. `archived` is the eligibility marker; any
    /// other non-`active` value is a container path.
    pub fn to_column(&self) -> String {
        match self {
            FileLocation::Active => ACTIVE.to_string(),
            FileLocation::PendingArchive => PENDING.to_string(),
            FileLocation::ArchivedAt(path) => path.to_string_lossy().into_owned(),
        }
    }

    pub fn from_column(value: &str) -> Self {
        match value {
            ACTIVE => FileLocation::Active,
            PENDING => FileLocation::PendingArchive,
            path => FileLocation::ArchivedAt(PathBuf::from(path)),
        }
    }

    pub fn kind(&self) -> LocationKind {
        match self {
            FileLocation::Active => LocationKind::Active,
            FileLocation::PendingArchive => LocationKind::Pending,
            FileLocation::ArchivedAt(_) => LocationKind::Archived,
        }
    }

    pub fn container(&self) -> Option<&Path> {
        match self {
            FileLocation::ArchivedAt(path) => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Active,
    Pending,
    Archived,
}

impl LocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationKind::Active => "active",
            LocationKind::Pending => "pending",
            LocationKind::Archived => "archived",
        }
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(LocationKind::Active),
            "pending" => Ok(LocationKind::Pending),
            "archived" => Ok(LocationKind::Archived),
            other => Err(format!("unknown location kind: {other}")),
        }
    }
}

/// One processed filing as recorded in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedReportRecord {
    /// `<issuer code>_<sequence>`.
    pub report_id: String,
    pub target_company: String,
    pub security_code: String,
    pub holder_name: String,
    pub report_type: ReportType,
    #[serde(with = "crate::clock::processed_at_format")]
    pub processed_at: PrimitiveDateTime,
    pub importance_level: i64,
    pub change_percentage: Option<f64>,
    pub holding_ratio_after: Option<f64>,
    pub file_location: FileLocation,
    /// Directory recorded at ingestion. Legacy rows leave this empty.
    pub artifact_dir: Option<PathBuf>,
}

impl ProcessedReportRecord {
    pub fn issuer_code(&self) -> &str {
        self.report_id
            .split('_')
            .next()
            .unwrap_or(self.report_id.as_str())
    }
}
