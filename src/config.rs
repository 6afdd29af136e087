//! Archive configuration.
//!
//! Loaded once from a JSON document and handed to each component at
//! construction; nothing reads it through shared mutable state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::UtcOffset;

use crate::error::{Error, Result};

const DEFAULT_ACTIVE_ROOT: &str = "data/downloads";
const DEFAULT_ARCHIVE_ROOT: &str = "data/archives";
const DEFAULT_CATALOG_PATH: &str = "data/reports.db";
const DEFAULT_RESERVED_DIR: &str = "logs";

/// Retention periods in days per importance bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPeriods {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
}

impl Default for RetentionPeriods {
    fn default() -> Self {
        Self {
            low: 30,
            medium: 90,
            high: 180,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Absolute change (in percentage points) that marks a filing as significant.
    pub significant_change_threshold: f64,
    /// Post-filing holding ratio (%) that marks a holder as large.
    pub high_holding_threshold: f64,
    pub retention_periods: RetentionPeriods,
    /// Write gzip containers; plain tar when disabled.
    pub compression_enabled: bool,
    /// Delete the source directory once its container is committed.
    pub auto_cleanup_enabled: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            significant_change_threshold: 1.5,
            high_holding_threshold: 10.0,
            retention_periods: RetentionPeriods::default(),
            compression_enabled: true,
            auto_cleanup_enabled: true,
        }
    }
}

/// File-name patterns that identify a filing's artifact directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureSpec {
    pub subpath: PathBuf,
    pub header_pattern: String,
    pub body_pattern: String,
}

impl Default for SignatureSpec {
    fn default() -> Self {
        Self {
            subpath: PathBuf::from("XBRL").join("PublicDoc"),
            header_pattern: "header".to_string(),
            body_pattern: "honbun".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub active_root: PathBuf,
    pub archive_root: PathBuf,
    pub catalog_path: PathBuf,
    /// Top-level directory under the active root that never holds filings.
    pub reserved_dir: String,
    pub signature: SignatureSpec,
    /// Offset used to read `processed_at` and directory modification times.
    pub utc_offset_hours: i8,
    pub policy: RetentionPolicy,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            active_root: PathBuf::from(DEFAULT_ACTIVE_ROOT),
            archive_root: PathBuf::from(DEFAULT_ARCHIVE_ROOT),
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
            reserved_dir: DEFAULT_RESERVED_DIR.to_string(),
            signature: SignatureSpec::default(),
            utc_offset_hours: 0,
            policy: RetentionPolicy::default(),
        }
    }
}

impl ArchiveConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            Error::Config(format!("read {}: {err}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|err| {
            Error::Config(format!("parse {}: {err}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.utc_offset()?;
        if self.reserved_dir.is_empty() {
            return Err(Error::Config("reserved_dir must not be empty".into()));
        }
        if self.signature.header_pattern.is_empty() || self.signature.body_pattern.is_empty() {
            return Err(Error::Config("signature patterns must not be empty".into()));
        }
        let p = &self.policy;
        if !(p.significant_change_threshold >= 0.0 && p.high_holding_threshold >= 0.0) {
            return Err(Error::Config("thresholds must be non-negative".into()));
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> Result<UtcOffset> {
        UtcOffset::from_hms(self.utc_offset_hours, 0, 0)
            .map_err(|err| Error::Config(format!("utc_offset_hours: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_policy() {
        let config = ArchiveConfig::default();
        assert_eq!(config.policy.retention_periods.medium, 90);
        assert_eq!(config.policy.significant_change_threshold, 1.5);
        assert_eq!(config.reserved_dir, "logs");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_document_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("archive.json");
        let mut file = std::fs::File::create(&path).expect("create");
        write!(
            file,
            r#"{{"utc_offset_hours": 9, "policy": {{"retention_periods": {{"low": 7}}, "auto_cleanup_enabled": false}}}}"#
        )
        .expect("write");

        let config = ArchiveConfig::load(&path).expect("load");
        assert_eq!(config.policy.retention_periods.low, 7);
        assert_eq!(config.policy.retention_periods.high, 180);
        assert!(!config.policy.auto_cleanup_enabled);
        assert!(config.policy.compression_enabled);
        assert_eq!(config.utc_offset().expect("offset").whole_hours(), 9);
        assert_eq!(config.active_root, PathBuf::from("data/downloads"));
    }

    #[test]
    fn test_rejects_out_of_range_offset() {
        let config = ArchiveConfig {
            utc_offset_hours: 30,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let err = ArchiveConfig::load(Path::new("/nonexistent/archive.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
