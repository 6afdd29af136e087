//! Retention policy evaluation.

use time::{Duration, PrimitiveDateTime};

use crate::catalog::{CatalogStore, FileLocation, ProcessedReportRecord};
use crate::config::{RetentionPeriods, RetentionPolicy};
use crate::error::Result;

/// Retention class a record falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImportanceBucket {
    Low,
    Medium,
    High,
}

impl ImportanceBucket {
    /// Bucket by importance level, escalated to `High` for significant
    /// changes or large holders.
    pub fn for_record(record: &ProcessedReportRecord, policy: &RetentionPolicy) -> Self {
        let significant = record
            .change_percentage
            .map(|c| c.abs() >= policy.significant_change_threshold)
            .unwrap_or(false);
        let large_holder = record
            .holding_ratio_after
            .map(|h| h >= policy.high_holding_threshold)
            .unwrap_or(false);
        if significant || large_holder {
            return ImportanceBucket::High;
        }

        match record.importance_level {
            i64::MIN..=1 => ImportanceBucket::Low,
            2 => ImportanceBucket::Medium,
            _ => ImportanceBucket::High,
        }
    }

    pub fn retention_days(&self, periods: &RetentionPeriods) -> u32 {
        match self {
            ImportanceBucket::Low => periods.low,
            ImportanceBucket::Medium => periods.medium,
            ImportanceBucket::High => periods.high,
        }
    }
}

/// `now - days`.
pub fn cutoff(now: PrimitiveDateTime, days: u32) -> PrimitiveDateTime {
    now - Duration::days(i64::from(days))
}

/// Evaluate whether a record should be marked for archival.
///
/// Only active records are eligible. With `retention_days` set, every record
/// uses that period; otherwise the period comes from the record's bucket.
pub fn is_eligible(
    record: &ProcessedReportRecord,
    retention_days: Option<u32>,
    policy: &RetentionPolicy,
    now: PrimitiveDateTime,
) -> bool {
    if record.file_location != FileLocation::Active {
        return false;
    }
    let days = retention_days.unwrap_or_else(|| {
        ImportanceBucket::for_record(record, policy).retention_days(&policy.retention_periods)
    });
    record.processed_at < cutoff(now, days)
}

/// Applies a [`RetentionPolicy`] to the catalog.
#[derive(Debug, Clone)]
pub struct RetentionEngine {
    policy: RetentionPolicy,
}

impl RetentionEngine {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Active records that would be marked, least important first and newest
    /// first within an importance level. Never mutates the catalog.
    pub fn candidates<C: CatalogStore>(
        &self,
        catalog: &C,
        retention_days: Option<u32>,
        now: PrimitiveDateTime,
    ) -> Result<Vec<ProcessedReportRecord>> {
        let widest = retention_days.unwrap_or_else(|| self.shortest_period());
        let mut records = catalog.active_before(cutoff(now, widest))?;
        records.retain(|r| is_eligible(r, retention_days, &self.policy, now));
        Ok(records)
    }

    /// Mark eligible records `PendingArchive`. Returns how many were newly
    /// marked; records already pending or archived are never re-counted.
    pub fn mark_eligible<C: CatalogStore>(
        &self,
        catalog: &C,
        retention_days: Option<u32>,
        now: PrimitiveDateTime,
    ) -> Result<usize> {
        match retention_days {
            Some(days) => catalog.mark_pending_before(cutoff(now, days)),
            None => {
                let ids: Vec<String> = self
                    .candidates(catalog, None, now)?
                    .into_iter()
                    .map(|r| r.report_id)
                    .collect();
                if ids.is_empty() {
                    return Ok(0);
                }
                catalog.mark_pending(&ids)
            }
        }
    }

    fn shortest_period(&self) -> u32 {
        let p = &self.policy.retention_periods;
        p.low.min(p.medium).min(p.high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ReportType, SqliteCatalog};
    use time::macros::datetime;

    const NOW: PrimitiveDateTime = datetime!(2025-06-01 12:00:00);

    fn make_record(
        report_id: &str,
        age_days: i64,
        importance_level: i64,
        location: FileLocation,
    ) -> ProcessedReportRecord {
        ProcessedReportRecord {
            report_id: report_id.to_string(),
            target_company: "Acme".into(),
            security_code: "1234".into(),
            holder_name: "Holder".into(),
            report_type: ReportType::Initial,
            processed_at: NOW - Duration::days(age_days),
            importance_level,
            change_percentage: None,
            holding_ratio_after: None,
            file_location: location,
            artifact_dir: None,
        }
    }

    #[test]
    fn test_bucket_by_level() {
        let policy = RetentionPolicy::default();
        let bucket = |level| {
            ImportanceBucket::for_record(&make_record("E1_1", 0, level, FileLocation::Active), &policy)
        };
        assert_eq!(bucket(0), ImportanceBucket::Low);
        assert_eq!(bucket(1), ImportanceBucket::Low);
        assert_eq!(bucket(2), ImportanceBucket::Medium);
        assert_eq!(bucket(3), ImportanceBucket::High);
        assert_eq!(bucket(5), ImportanceBucket::High);
    }

    #[test]
    fn test_bucket_escalation() {
        let policy = RetentionPolicy::default();
        let mut record = make_record("E1_1", 0, 1, FileLocation::Active);
        record.change_percentage = Some(-1.5);
        assert_eq!(ImportanceBucket::for_record(&record, &policy), ImportanceBucket::High);

        record.change_percentage = Some(1.49);
        assert_eq!(ImportanceBucket::for_record(&record, &policy), ImportanceBucket::Low);

        record.holding_ratio_after = Some(10.0);
        assert_eq!(ImportanceBucket::for_record(&record, &policy), ImportanceBucket::High);
    }

    #[test]
    fn test_is_eligible_with_override() {
        let policy = RetentionPolicy::default();
        let old = make_record("E1_1", 120, 3, FileLocation::Active);
        let young = make_record("E1_2", 60, 1, FileLocation::Active);
        assert!(is_eligible(&old, Some(90), &policy, NOW));
        assert!(!is_eligible(&young, Some(90), &policy, NOW));
    }

    #[test]
    fn test_is_eligible_per_bucket() {
        let policy = RetentionPolicy::default();
        assert!(is_eligible(&make_record("E1_1", 31, 1, FileLocation::Active), None, &policy, NOW));
        assert!(!is_eligible(&make_record("E1_2", 31, 2, FileLocation::Active), None, &policy, NOW));
        assert!(is_eligible(&make_record("E1_3", 91, 2, FileLocation::Active), None, &policy, NOW));
        assert!(!is_eligible(&make_record("E1_4", 179, 3, FileLocation::Active), None, &policy, NOW));
    }

    #[test]
    fn test_cutoff_is_exclusive() {
        let policy = RetentionPolicy::default();
        let exactly = make_record("E1_1", 90, 1, FileLocation::Active);
        assert!(!is_eligible(&exactly, Some(90), &policy, NOW));
    }

    #[test]
    fn test_only_active_is_eligible() {
        let policy = RetentionPolicy::default();
        let pending = make_record("E1_1", 400, 1, FileLocation::PendingArchive);
        let archived = make_record("E1_2", 400, 1, FileLocation::ArchivedAt("/a/E1_2.tar.gz".into()));
        assert!(!is_eligible(&pending, Some(1), &policy, NOW));
        assert!(!is_eligible(&archived, Some(1), &policy, NOW));
    }

    #[test]
    fn test_mark_eligible_is_idempotent() -> Result<()> {
        let catalog = SqliteCatalog::open_in_memory()?;
        catalog.upsert(&make_record("E1_1", 120, 1, FileLocation::Active))?;
        catalog.upsert(&make_record("E1_2", 10, 1, FileLocation::Active))?;
        catalog.upsert(&make_record("E1_3", 200, 1, FileLocation::ArchivedAt("/a/x.tar.gz".into())))?;

        let engine = RetentionEngine::new(RetentionPolicy::default());
        assert_eq!(engine.mark_eligible(&catalog, Some(90), NOW)?, 1);
        assert_eq!(engine.mark_eligible(&catalog, Some(90), NOW)?, 0);

        let pending: Vec<String> = catalog
            .pending()?
            .into_iter()
            .map(|r| r.map(|r| r.report_id))
            .collect::<Result<_>>()?;
        assert_eq!(pending, vec!["E1_1"]);
        Ok(())
    }

    #[test]
    fn test_mark_eligible_per_bucket() -> Result<()> {
        let catalog = SqliteCatalog::open_in_memory()?;
        catalog.upsert(&make_record("LOW_1", 40, 1, FileLocation::Active))?;
        catalog.upsert(&make_record("MED_1", 40, 2, FileLocation::Active))?;
        catalog.upsert(&make_record("HIGH_1", 200, 3, FileLocation::Active))?;

        let engine = RetentionEngine::new(RetentionPolicy::default());
        assert_eq!(engine.mark_eligible(&catalog, None, NOW)?, 2);
        assert_eq!(engine.mark_eligible(&catalog, None, NOW)?, 0);

        let mut pending: Vec<String> = catalog
            .pending()?
            .into_iter()
            .map(|r| r.map(|r| r.report_id))
            .collect::<Result<_>>()?;
        pending.sort();
        assert_eq!(pending, vec!["HIGH_1", "LOW_1"]);
        Ok(())
    }

    #[test]
    fn test_candidates_do_not_mutate() -> Result<()> {
        let catalog = SqliteCatalog::open_in_memory()?;
        catalog.upsert(&make_record("E1_1", 120, 1, FileLocation::Active))?;
        catalog.upsert(&make_record("E1_2", 150, 3, FileLocation::Active))?;

        let engine = RetentionEngine::new(RetentionPolicy::default());
        let ids: Vec<String> = engine
            .candidates(&catalog, Some(90), NOW)?
            .into_iter()
            .map(|r| r.report_id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(catalog.pending()?.is_empty());
        Ok(())
    }
}
