//! Archive orchestration.

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{error, info, warn};
use time::PrimitiveDateTime;

use crate::catalog::{CatalogStore, FileLocation, ProcessedReportRecord};
use crate::clock::{Clock, SystemClock};
use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::lifecycle::{
    read_metadata, scan_containers, unpack_container, ArchiveRunSummary, ArchiveStatistics,
    ArtifactPackager, DirectoryResolver, RetentionEngine,
};

/// Moves filings between active storage and the archive and keeps the
/// catalog in step.
///
/// Runs are synchronous and expect callers to serialize invocations.
pub struct ArchiveOrchestrator<C: CatalogStore, K: Clock = SystemClock> {
    config: ArchiveConfig,
    catalog: C,
    clock: K,
    resolver: DirectoryResolver,
    packager: ArtifactPackager,
    retention: RetentionEngine,
}

impl<C: CatalogStore> ArchiveOrchestrator<C, SystemClock> {
    pub fn new(config: ArchiveConfig, catalog: C) -> Result<Self> {
        let clock = SystemClock::new(config.utc_offset()?);
        Self::with_clock(config, catalog, clock)
    }
}

impl<C: CatalogStore, K: Clock> ArchiveOrchestrator<C, K> {
    /// Build an orchestrator reading time from `clock`. The archive root is
    /// created if absent.
    pub fn with_clock(config: ArchiveConfig, catalog: C, clock: K) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.archive_root)?;

        let resolver = DirectoryResolver::from_config(&config)?;
        let packager = ArtifactPackager::new(
            &config.archive_root,
            config.policy.compression_enabled,
            clock.offset(),
        );
        let retention = RetentionEngine::new(config.policy.clone());

        Ok(Self {
            config,
            catalog,
            clock,
            resolver,
            packager,
            retention,
        })
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Mark eligible records and archive everything pending.
    ///
    /// Per-record failures are counted and the batch continues; catalog
    /// failures abort the run.
    pub fn archive(&self, retention_days: Option<u32>) -> Result<ArchiveRunSummary> {
        let start = Instant::now();
        let now = self.clock.now();
        let mut summary = ArchiveRunSummary::new();

        summary.marked_count = self
            .retention
            .mark_eligible(&self.catalog, retention_days, now)?;
        if summary.marked_count > 0 {
            info!("marked {} reports for archival", summary.marked_count);
        }

        let pending = self.catalog.pending()?;
        summary.scanned_count = pending.len();

        for row in pending {
            let record = match row {
                Ok(record) => record,
                Err(err) if err.is_recoverable() => {
                    error!("cannot archive: {}", err);
                    summary.record_error(err.to_string());
                    continue;
                }
                Err(err) => return Err(err),
            };
            match self.archive_record(&record, now) {
                Ok(bytes_saved) => summary.record_archived(bytes_saved),
                Err(err) if err.is_not_found() => {
                    warn!("{}: skipped, {}", record.report_id, err);
                    summary.record_not_found();
                }
                Err(err) if err.is_recoverable() => {
                    error!("{}: archive failed: {}", record.report_id, err);
                    summary.record_error(format!("{}: {}", record.report_id, err));
                }
                Err(err) => return Err(err),
            }
        }

        summary.duration = start.elapsed();
        info!("{}", summary.summary());
        Ok(summary)
    }

    /// Records an archive run would mark, without touching the catalog.
    pub fn candidates(&self, retention_days: Option<u32>) -> Result<Vec<ProcessedReportRecord>> {
        self.retention
            .candidates(&self.catalog, retention_days, self.clock.now())
    }

    fn archive_record(&self, record: &ProcessedReportRecord, now: PrimitiveDateTime) -> Result<i64> {
        let resolved = self.resolver.resolve(record)?;
        let outcome = self.packager.package(&resolved.path, record, now)?;

        let location = FileLocation::ArchivedAt(outcome.container.clone());
        let updated = match self.catalog.set_location(&record.report_id, &location) {
            Ok(updated) => updated,
            Err(err) => {
                let _ = std::fs::remove_file(&outcome.container);
                return Err(err);
            }
        };
        if !updated {
            let _ = std::fs::remove_file(&outcome.container);
            return Err(Error::ReportNotFound(record.report_id.clone()));
        }

        info!(
            "archived {} -> {} ({} -> {} bytes, {:.1}% saved)",
            record.report_id,
            outcome.container.display(),
            outcome.original_size,
            outcome.compressed_size,
            outcome.saved_ratio() * 100.0
        );

        if self.config.policy.auto_cleanup_enabled {
            if let Err(err) = std::fs::remove_dir_all(&resolved.path) {
                warn!(
                    "{}: archived but could not remove {}: {}",
                    record.report_id,
                    resolved.path.display(),
                    err
                );
            }
        }

        Ok(outcome.bytes_saved())
    }

    /// Extract an archived report back to where it was archived from and
    /// mark it active. The container is kept, and the record's
    /// `artifact_dir` is pointed at the restored directory.
    ///
    /// Fails without touching the catalog when the id is unknown, the record
    /// is not archived, or its container is gone.
    pub fn restore(&self, report_id: &str) -> Result<PathBuf> {
        let record = self
            .catalog
            .get(report_id)?
            .ok_or_else(|| Error::ReportNotFound(report_id.to_string()))?;

        let container = match record.file_location.container() {
            Some(path) => path.to_path_buf(),
            None => return Err(Error::NotArchived(report_id.to_string())),
        };
        if !container.is_file() {
            return Err(Error::ContainerMissing {
                report_id: report_id.to_string(),
                path: container,
            });
        }

        let dest_root = self.restore_root(&record, &container)?;
        let restored = unpack_container(&container, &dest_root, report_id)?;
        let Some(directory) = restored.first().cloned() else {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{} holds no entries", container.display()),
            )));
        };

        let restored_record = ProcessedReportRecord {
            file_location: FileLocation::Active,
            artifact_dir: Some(directory.clone()),
            ..record
        };
        if let Err(err) = self.catalog.upsert(&restored_record) {
            for path in &restored {
                let _ = std::fs::remove_dir_all(path);
            }
            return Err(err);
        }

        info!("restored {} -> {}", restored_record.report_id, directory.display());
        Ok(directory)
    }

    /// Parent of the directory the container was built from, falling back
    /// to the recorded `artifact_dir` and then the active root.
    fn restore_root(&self, record: &ProcessedReportRecord, container: &Path) -> Result<PathBuf> {
        let original = read_metadata(container)?
            .map(|meta| meta.original_path)
            .or_else(|| record.artifact_dir.clone());
        let parent = original
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty());
        Ok(match parent {
            Some(parent) => parent.to_path_buf(),
            None => self.resolver.active_root().to_path_buf(),
        })
    }

    pub fn statistics(&self) -> Result<ArchiveStatistics> {
        let locations = self.catalog.location_summary()?;
        let report_types = self
            .catalog
            .report_type_counts()?
            .into_iter()
            .map(|(report_type, count)| (report_type.to_string(), count))
            .collect();
        let totals = scan_containers(self.packager.layout().root())?;

        Ok(ArchiveStatistics {
            locations,
            report_types,
            container_count: totals.count,
            total_archive_bytes: totals.bytes,
        })
    }
}
