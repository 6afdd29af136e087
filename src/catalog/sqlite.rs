use std::path::{Path, PathBuf};

use log::warn;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use time::PrimitiveDateTime;

use crate::catalog::{
    CatalogStore, FileLocation, LocationGroup, LocationKind, ProcessedReportRecord, ReportType,
};
use crate::clock::{format_processed_at, parse_processed_at};
use crate::error::{Error, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS processed_reports (
    report_id           TEXT PRIMARY KEY,
    target_company      TEXT NOT NULL,
    security_code       TEXT NOT NULL,
    holder_name         TEXT NOT NULL,
    report_type         TEXT NOT NULL,
    processed_at        TEXT NOT NULL,
    importance_level    INTEGER NOT NULL DEFAULT 1,
    change_percentage   REAL,
    holding_ratio_after REAL,
    file_location       TEXT NOT NULL DEFAULT 'active',
    artifact_dir        TEXT
);
CREATE INDEX IF NOT EXISTS idx_processed_reports_location
    ON processed_reports (file_location, processed_at);
";

const COLUMNS: &str = "report_id, target_company, security_code, holder_name, report_type, \
     processed_at, importance_level, change_percentage, holding_ratio_after, file_location, \
     artifact_dir";

/// SQLite-backed catalog. `processed_at` is stored as sortable text so that
/// cutoff comparisons are plain string comparisons.
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Run a record query, decoding each row on its own so one bad row
    /// does not hide the rest.
    fn query_rows(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<Vec<Result<ProcessedReportRecord>>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(args, decode_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl CatalogStore for SqliteCatalog {
    fn upsert(&self, record: &ProcessedReportRecord) -> Result<()> {
        self.conn.execute(
            &format!("INSERT OR REPLACE INTO processed_reports ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
            params![
                record.report_id,
                record.target_company,
                record.security_code,
                record.holder_name,
                record.report_type.as_str(),
                format_processed_at(record.processed_at),
                record.importance_level,
                record.change_percentage,
                record.holding_ratio_after,
                record.file_location.to_column(),
                record
                    .artifact_dir
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            ],
        )?;
        Ok(())
    }

    fn get(&self, report_id: &str) -> Result<Option<ProcessedReportRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM processed_reports WHERE report_id = ?1"),
                params![report_id],
                map_record,
            )
            .optional()?;
        Ok(record)
    }

    fn active_before(&self, cutoff: PrimitiveDateTime) -> Result<Vec<ProcessedReportRecord>> {
        let rows = self.query_rows(
            &format!(
                "SELECT {COLUMNS} FROM processed_reports \
                 WHERE processed_at < ?1 AND file_location = 'active' \
                 ORDER BY importance_level ASC, processed_at DESC, report_id ASC"
            ),
            params![format_processed_at(cutoff)],
        )?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match row {
                Ok(record) => out.push(record),
                Err(err) => warn!("skipping {}", err),
            }
        }
        Ok(out)
    }

    fn mark_pending_before(&self, cutoff: PrimitiveDateTime) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE processed_reports SET file_location = 'archived' \
             WHERE processed_at < ?1 AND file_location = 'active'",
            params![format_processed_at(cutoff)],
        )?;
        Ok(changed)
    }

    fn mark_pending(&self, report_ids: &[String]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE processed_reports SET file_location = 'archived' \
                 WHERE report_id = ?1 AND file_location = 'active'",
            )?;
            for id in report_ids {
                changed += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    fn pending(&self) -> Result<Vec<Result<ProcessedReportRecord>>> {
        self.query_rows(
            &format!(
                "SELECT {COLUMNS} FROM processed_reports \
                 WHERE file_location = 'archived' \
                 ORDER BY processed_at DESC, report_id ASC"
            ),
            [],
        )
    }

    fn set_location(&self, report_id: &str, location: &FileLocation) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE processed_reports SET file_location = ?1 WHERE report_id = ?2",
            params![location.to_column(), report_id],
        )?;
        Ok(changed > 0)
    }

    fn location_summary(&self) -> Result<Vec<LocationGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT CASE file_location \
                        WHEN 'active' THEN 'active' \
                        WHEN 'archived' THEN 'pending' \
                        ELSE 'archived' END AS kind, \
                    COUNT(*), AVG(importance_level) \
             FROM processed_reports GROUP BY kind ORDER BY kind",
        )?;
        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(0)?;
            let kind = kind
                .parse::<LocationKind>()
                .map_err(|e| conversion_error(0, e))?;
            Ok(LocationGroup {
                kind,
                count: row.get::<_, i64>(1)? as u64,
                avg_importance: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn report_type_counts(&self) -> Result<Vec<(ReportType, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT report_type, COUNT(*) FROM processed_reports \
             GROUP BY report_type ORDER BY report_type",
        )?;
        let rows = stmt.query_map([], |row| {
            let raw: String = row.get(0)?;
            let report_type = raw
                .parse::<ReportType>()
                .map_err(|e| conversion_error(0, e))?;
            Ok((report_type, row.get::<_, i64>(1)? as u64))
        })?;
        let mut counts: Vec<(ReportType, u64)> = Vec::new();
        for row in rows {
            let (report_type, count) = row?;
            // Upstream and native labels for the same type group separately in SQL.
            match counts.iter_mut().find(|(t, _)| *t == report_type) {
                Some((_, total)) => *total += count,
                None => counts.push((report_type, count)),
            }
        }
        counts.sort_by_key(|(t, _)| *t);
        Ok(counts)
    }
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<ProcessedReportRecord> {
    let report_type: String = row.get(4)?;
    let processed_at: String = row.get(5)?;
    let file_location: String = row.get(9)?;
    let artifact_dir: Option<String> = row.get(10)?;

    Ok(ProcessedReportRecord {
        report_id: row.get(0)?,
        target_company: row.get(1)?,
        security_code: row.get(2)?,
        holder_name: row.get(3)?,
        report_type: report_type
            .parse()
            .map_err(|e: String| conversion_error(4, e))?,
        processed_at: parse_processed_at(&processed_at)
            .map_err(|e| conversion_error(5, e.to_string()))?,
        importance_level: row.get(6)?,
        change_percentage: row.get(7)?,
        holding_ratio_after: row.get(8)?,
        file_location: FileLocation::from_column(&file_location),
        artifact_dir: artifact_dir.filter(|s| !s.is_empty()).map(PathBuf::from),
    })
}

/// Decode failures become a per-row [`Error::MalformedRecord`]; anything
/// else is a store failure and aborts the query.
fn decode_row(row: &Row<'_>) -> rusqlite::Result<Result<ProcessedReportRecord>> {
    let report_id: String = row.get(0)?;
    match map_record(row) {
        Ok(record) => Ok(Ok(record)),
        Err(rusqlite::Error::FromSqlConversionFailure(_, _, err)) => {
            Ok(Err(Error::MalformedRecord {
                report_id,
                reason: err.to_string(),
            }))
        }
        Err(rusqlite::Error::InvalidColumnType(idx, name, ty)) => Ok(Err(Error::MalformedRecord {
            report_id,
            reason: format!("column {idx} ({name}) holds {ty}"),
        })),
        Err(err) => Err(err),
    }
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}
