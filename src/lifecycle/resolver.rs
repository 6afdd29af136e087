//! Mapping catalog records onto artifact directories in active storage.
//!
//! Records ingested with an explicit `artifact_dir` resolve directly. Legacy
//! records have no stored link to their directory, so the resolver falls back
//! to a heuristic lookup:
//!
//! 1. a top-level directory named after the issuer code or the full report id;
//! 2. among directories modified on the record's processed date, the first
//!    (by name) carrying the filing's structural signature;
//! 3. among the remaining same-date directories, the one whose mtime is
//!    closest to `processed_at`.
//!
//! Failing all of that the record is [`Error::DirectoryNotFound`], which
//! callers treat as a skip rather than a failure.

use std::path::{Path, PathBuf};

use log::debug;
use time::{Duration, UtcOffset};

use crate::catalog::ProcessedReportRecord;
use crate::config::{ArchiveConfig, SignatureSpec};
use crate::error::{Error, Result};
use crate::lifecycle::candidate::{list_candidates, DirectoryCandidate};

/// How the resolver should look for a record's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryHint {
    ExplicitPath(PathBuf),
    HeuristicLookup,
}

impl DirectoryHint {
    pub fn for_record(record: &ProcessedReportRecord) -> Self {
        match &record.artifact_dir {
            Some(path) => DirectoryHint::ExplicitPath(path.clone()),
            None => DirectoryHint::HeuristicLookup,
        }
    }
}

/// Which rule produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedBy {
    ExplicitPath,
    DirectMatch,
    Signature,
    NearestTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDirectory {
    pub path: PathBuf,
    pub method: ResolvedBy,
}

#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    active_root: PathBuf,
    reserved_dir: String,
    signature: SignatureSpec,
    offset: UtcOffset,
}

impl DirectoryResolver {
    pub fn new(
        active_root: impl Into<PathBuf>,
        reserved_dir: impl Into<String>,
        signature: SignatureSpec,
        offset: UtcOffset,
    ) -> Self {
        Self {
            active_root: active_root.into(),
            reserved_dir: reserved_dir.into(),
            signature,
            offset,
        }
    }

    pub fn from_config(config: &ArchiveConfig) -> Result<Self> {
        Ok(Self::new(
            &config.active_root,
            &config.reserved_dir,
            config.signature.clone(),
            config.utc_offset()?,
        ))
    }

    pub fn active_root(&self) -> &Path {
        &self.active_root
    }

    pub fn resolve(&self, record: &ProcessedReportRecord) -> Result<ResolvedDirectory> {
        if let DirectoryHint::ExplicitPath(path) = DirectoryHint::for_record(record) {
            if path.is_dir() {
                return Ok(ResolvedDirectory {
                    path,
                    method: ResolvedBy::ExplicitPath,
                });
            }
            debug!(
                "{}: recorded directory {} is gone, falling back to lookup",
                record.report_id,
                path.display()
            );
        }

        if let Some(path) = self.direct_match(record) {
            return Ok(ResolvedDirectory {
                path,
                method: ResolvedBy::DirectMatch,
            });
        }

        let candidates = match list_candidates(&self.active_root, &self.reserved_dir, self.offset)
        {
            Ok(candidates) => candidates,
            Err(err) => {
                debug!(
                    "cannot enumerate {}: {}",
                    self.active_root.display(),
                    err
                );
                return Err(Error::DirectoryNotFound(record.report_id.clone()));
            }
        };

        match self.search(record, &candidates) {
            Some(found) => Ok(found),
            None => Err(Error::DirectoryNotFound(record.report_id.clone())),
        }
    }

    fn direct_match(&self, record: &ProcessedReportRecord) -> Option<PathBuf> {
        let ids = [record.issuer_code(), record.report_id.as_str()];
        ids.iter()
            .filter(|id| !id.is_empty() && **id != self.reserved_dir.as_str())
            .map(|id| self.active_root.join(id))
            .find(|path| path.is_dir())
    }

    fn search(
        &self,
        record: &ProcessedReportRecord,
        candidates: &[DirectoryCandidate],
    ) -> Option<ResolvedDirectory> {
        let processed_date = record.processed_at.date();
        let mut nearest: Option<(&DirectoryCandidate, Duration)> = None;

        // Candidates arrive sorted by name, which fixes the tie-break order.
        for candidate in candidates
            .iter()
            .filter(|c| c.modified_date() == processed_date)
        {
            if candidate.has_signature(&self.signature) {
                debug!(
                    "{}: signature match {}",
                    record.report_id, candidate.name
                );
                return Some(ResolvedDirectory {
                    path: candidate.path.clone(),
                    method: ResolvedBy::Signature,
                });
            }

            let distance = candidate.distance_from(record.processed_at);
            let closer = match nearest {
                Some((_, best)) => distance < best,
                None => true,
            };
            if closer {
                nearest = Some((candidate, distance));
            }
        }

        nearest.map(|(candidate, distance)| {
            debug!(
                "{}: nearest-time match {} ({}s apart)",
                record.report_id,
                candidate.name,
                distance.whole_seconds()
            );
            ResolvedDirectory {
                path: candidate.path.clone(),
                method: ResolvedBy::NearestTime,
            }
        })
    }
}
