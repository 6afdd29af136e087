use std::fs;

use filing_archive::catalog::LocationKind;
use filing_archive::clock::FixedClock;
use filing_archive::lifecycle::ArchiveOrchestrator;
use filing_archive::{
    ArchiveConfig, CatalogStore, FileLocation, ProcessedReportRecord, ReportType, SqliteCatalog,
};
use tempfile::tempdir;
use time::macros::datetime;
use time::UtcOffset;

fn record(
    report_id: &str,
    report_type: ReportType,
    importance_level: i64,
    file_location: FileLocation,
) -> ProcessedReportRecord {
    ProcessedReportRecord {
        report_id: report_id.to_string(),
        target_company: "Acme Holdings".into(),
        security_code: "7203".into(),
        holder_name: "Example Asset Management".into(),
        report_type,
        processed_at: datetime!(2025-03-10 08:00:00),
        importance_level,
        change_percentage: None,
        holding_ratio_after: None,
        file_location,
        artifact_dir: None,
    }
}

#[test]
fn statistics_group_by_location_and_type() {
    let dir = tempdir().expect("tempdir");
    let config = ArchiveConfig {
        active_root: dir.path().join("downloads"),
        archive_root: dir.path().join("archives"),
        catalog_path: dir.path().join("reports.db"),
        ..Default::default()
    };
    let month = config.archive_root.join("2025-03");
    fs::create_dir_all(&month).expect("mkdir");
    let a = month.join("E4_0001.tar.gz");
    let b = month.join("E5_0001.tar.gz");
    fs::write(&a, [0u8; 2048]).expect("write a");
    fs::write(&b, [0u8; 1024]).expect("write b");

    let catalog = SqliteCatalog::open_in_memory().expect("catalog");
    let rows = [
        record("E1_0001", ReportType::Initial, 1, FileLocation::Active),
        record("E2_0001", ReportType::Change, 2, FileLocation::Active),
        record("E3_0001", ReportType::Change, 3, FileLocation::Active),
        record("E4_0001", ReportType::Initial, 1, FileLocation::ArchivedAt(a)),
        record("E5_0001", ReportType::Change, 2, FileLocation::ArchivedAt(b)),
    ];
    for row in &rows {
        catalog.upsert(row).expect("upsert");
    }

    let orchestrator = ArchiveOrchestrator::with_clock(
        config,
        catalog,
        FixedClock::new(datetime!(2025-04-01 00:00:00), UtcOffset::UTC),
    )
    .expect("orchestrator");
    let stats = orchestrator.statistics().expect("statistics");

    assert_eq!(stats.count(LocationKind::Active), 3);
    assert_eq!(stats.count(LocationKind::Archived), 2);
    assert_eq!(stats.count(LocationKind::Pending), 0);
    assert_eq!(stats.avg_importance(LocationKind::Active), Some(2.0));
    assert_eq!(stats.avg_importance(LocationKind::Archived), Some(1.5));

    assert_eq!(stats.report_types.get(ReportType::Initial.as_str()), Some(&2));
    assert_eq!(stats.report_types.get(ReportType::Change.as_str()), Some(&3));

    assert_eq!(stats.container_count, 2);
    assert_eq!(stats.total_archive_bytes, 3072);

    let json = serde_json::to_value(&stats).expect("json");
    assert_eq!(json["container_count"], 2);
}
