//! Top-level active-storage directories considered during resolution.

use std::path::{Path, PathBuf};

use time::{Date, Duration, PrimitiveDateTime, UtcOffset};

use crate::clock::to_local;
use crate::config::SignatureSpec;

/// A directory under the active root together with its modification time.
/// Only lives for the duration of one resolution.
#[derive(Debug, Clone)]
pub struct DirectoryCandidate {
    pub path: PathBuf,
    pub name: String,
    pub modified_at: PrimitiveDateTime,
}

impl DirectoryCandidate {
    pub fn modified_date(&self) -> Date {
        self.modified_at.date()
    }

    /// Absolute distance between the directory's mtime and `ts`.
    pub fn distance_from(&self, ts: PrimitiveDateTime) -> Duration {
        (self.modified_at - ts).abs()
    }

    /// True when `<dir>/<subpath>` holds at least one header file and one body file.
    pub fn has_signature(&self, spec: &SignatureSpec) -> bool {
        let doc_dir = self.path.join(&spec.subpath);
        let entries = match std::fs::read_dir(&doc_dir) {
            Ok(entries) => entries,
            Err(_) => return false,
        };

        let mut header = false;
        let mut body = false;
        for entry in entries.flatten() {
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            header |= matches_pattern(name, &spec.header_pattern);
            body |= matches_pattern(name, &spec.body_pattern);
            if header && body {
                return true;
            }
        }
        false
    }
}

/// List top-level directories under `root`, skipping the reserved directory
/// and hidden entries, sorted by name.
pub fn list_candidates(
    root: &Path,
    reserved: &str,
    offset: UtcOffset,
) -> std::io::Result<Vec<DirectoryCandidate>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };
        if name == reserved || name.starts_with('.') {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(err) => {
                log::debug!("skipping {}: {}", entry.path().display(), err);
                continue;
            }
        };
        if !meta.is_dir() {
            continue;
        }
        let modified = match meta.modified() {
            Ok(modified) => modified,
            Err(err) => {
                log::debug!("no mtime for {}: {}", entry.path().display(), err);
                continue;
            }
        };
        out.push(DirectoryCandidate {
            path: entry.path(),
            name,
            modified_at: to_local(modified, offset),
        });
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

/// `*<needle>*.htm*`
fn matches_pattern(file_name: &str, needle: &str) -> bool {
    match file_name.find(needle) {
        Some(pos) => file_name[pos + needle.len()..].contains(".htm"),
        None => false,
    }
}
