use std::fmt;
use std::path::{Path, PathBuf};

const COMPRESSED_EXT: &str = ".tar.gz";
const PLAIN_EXT: &str = ".tar";
const TMP_SUFFIX: &str = ".tmp";
const METADATA_SUFFIX: &str = "_metadata.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    EmptyComponent { field: &'static str },
    InvalidComponent { field: &'static str, value: String },
    InvalidMonth { value: String },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::EmptyComponent { field } => {
                write!(f, "empty path component: {field}")
            }
            LayoutError::InvalidComponent { field, value } => {
                write!(f, "invalid path component for {field}: {value}")
            }
            LayoutError::InvalidMonth { value } => {
                write!(f, "invalid month format (expected YYYY-MM): {value}")
            }
        }
    }
}

impl std::error::Error for LayoutError {}

type Result<T> = std::result::Result<T, LayoutError>;

/// Cold storage layout: `<root>/<YYYY-MM>/<report_id>.tar.gz`.
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    root: PathBuf,
}

impl ArchiveLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn month_dir(&self, year_month: &str) -> Result<PathBuf> {
        validate_month(year_month)?;
        Ok(self.root.join(year_month))
    }

    pub fn container_path(
        &self,
        year_month: &str,
        report_id: &str,
        compressed: bool,
    ) -> Result<PathBuf> {
        validate_component("report_id", report_id)?;
        Ok(self
            .month_dir(year_month)?
            .join(container_file_name(report_id, compressed)))
    }
}

pub fn container_file_name(report_id: &str, compressed: bool) -> String {
    let ext = if compressed { COMPRESSED_EXT } else { PLAIN_EXT };
    format!("{report_id}{ext}")
}

/// Temporary sibling a container is written to before being renamed into place.
pub fn container_tmp_path(container: &Path) -> Result<PathBuf> {
    let name = container
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(LayoutError::EmptyComponent { field: "container" })?;
    Ok(container.with_file_name(format!("{name}{TMP_SUFFIX}")))
}

pub fn is_container_name(name: &str) -> bool {
    name.ends_with(COMPRESSED_EXT) || name.ends_with(PLAIN_EXT)
}

pub fn is_compressed_container(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(COMPRESSED_EXT))
        .unwrap_or(false)
}

pub fn metadata_entry_name(base: &str) -> String {
    format!("{base}{METADATA_SUFFIX}")
}

pub fn is_metadata_entry(name: &str) -> bool {
    !name.contains('/') && name.ends_with(METADATA_SUFFIX)
}

pub(crate) fn validate_component(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(LayoutError::EmptyComponent { field });
    }
    if value == "." || value == ".." || value.contains('/') || value.contains('\\') {
        return Err(LayoutError::InvalidComponent {
            field,
            value: value.to_string(),
        });
    }
    if value.contains('\0') {
        return Err(LayoutError::InvalidComponent {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn validate_month(value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return Err(LayoutError::InvalidMonth {
            value: value.to_string(),
        });
    }
    for (idx, byte) in bytes.iter().enumerate() {
        if idx == 4 {
            continue;
        }
        if !byte.is_ascii_digit() {
            return Err(LayoutError::InvalidMonth {
                value: value.to_string(),
            });
        }
    }
    Ok(())
}
