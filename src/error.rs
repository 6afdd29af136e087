use std::path::PathBuf;

use thiserror::Error;

use crate::layout::LayoutError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("invalid layout: {0}")]
    Layout(#[from] LayoutError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid timestamp {value:?}: {reason}")]
    Timestamp { value: String, reason: String },
    #[error("no artifact directory found for report {0}")]
    DirectoryNotFound(String),
    #[error("unknown report {0}")]
    ReportNotFound(String),
    #[error("malformed catalog row {report_id}: {reason}")]
    MalformedRecord { report_id: String, reason: String },
    #[error("report {0} is not archived")]
    NotArchived(String),
    #[error("container missing for report {report_id}: {path}")]
    ContainerMissing { report_id: String, path: PathBuf },
    #[error("restore target already exists: {0}")]
    RestoreConflict(PathBuf),
}

impl Error {
    /// Per-record failures that a batch skips and counts. Catalog failures
    /// are never recoverable and abort the invocation.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Catalog(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::DirectoryNotFound(_) | Error::ReportNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_errors_are_fatal() {
        let err = Error::Catalog(rusqlite::Error::InvalidQuery);
        assert!(!err.is_recoverable());

        let err = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(err.is_recoverable());

        let err = Error::MalformedRecord {
            report_id: "E1_1".into(),
            reason: "bad timestamp".into(),
        };
        assert!(err.is_recoverable());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(Error::DirectoryNotFound("E1_1".into()).is_not_found());
        assert!(Error::ReportNotFound("E1_1".into()).is_not_found());
        assert!(!Error::NotArchived("E1_1".into()).is_not_found());
    }
}
