//! Atomic directory packaging into month-bucketed tar containers.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, warn};
use time::{PrimitiveDateTime, UtcOffset};

use crate::catalog::ProcessedReportRecord;
use crate::clock::{rfc3339, to_system_time, year_month};
use crate::error::{Error, Result};
use crate::layout::{
    container_tmp_path, is_compressed_container, is_metadata_entry, metadata_entry_name,
    validate_component, ArchiveLayout, LayoutError,
};
use crate::lifecycle::metadata::ArchiveMetadataDescriptor;

/// Result of packaging one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutcome {
    pub container: PathBuf,
    pub original_size: u64,
    pub compressed_size: u64,
}

impl PackageOutcome {
    /// Negative for incompressible content.
    pub fn bytes_saved(&self) -> i64 {
        self.original_size as i64 - self.compressed_size as i64
    }

    pub fn saved_ratio(&self) -> f64 {
        if self.original_size == 0 {
            0.0
        } else {
            self.bytes_saved() as f64 / self.original_size as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactPackager {
    layout: ArchiveLayout,
    compress: bool,
    offset: UtcOffset,
}

impl ArtifactPackager {
    pub fn new(archive_root: impl Into<PathBuf>, compress: bool, offset: UtcOffset) -> Self {
        Self {
            layout: ArchiveLayout::new(archive_root),
            compress,
            offset,
        }
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    /// Package `source` and the record's metadata into
    /// `<archive root>/<YYYY-MM>/<report_id>.tar.gz`.
    ///
    /// The container is written to a `.tmp` sibling and renamed into place
    /// only once complete and synced, so readers never observe a partial
    /// container. `source` is left untouched.
    pub fn package(
        &self,
        source: &Path,
        record: &ProcessedReportRecord,
        archived_at: PrimitiveDateTime,
    ) -> Result<PackageOutcome> {
        let base = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LayoutError::EmptyComponent { field: "source" })?
            .to_string();

        let month = year_month(record.processed_at);
        let month_dir = self.layout.month_dir(&month)?;
        std::fs::create_dir_all(&month_dir)?;

        let container = self
            .layout
            .container_path(&month, &record.report_id, self.compress)?;
        let tmp = container_tmp_path(&container)?;

        // Clean up any leftover tmp file from an interrupted run
        let _ = std::fs::remove_file(&tmp);

        let original_size = directory_size(source)?;
        let metadata = ArchiveMetadataDescriptor::new(
            record,
            rfc3339(archived_at, self.offset),
            source,
            original_size,
        );
        let metadata = metadata.to_json()?;
        let mtime = to_system_time(archived_at, self.offset)
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        if let Err(err) = self.write_container(&tmp, source, &base, &metadata, mtime) {
            let _ = std::fs::remove_file(&tmp);
            return Err(err);
        }

        let published = std::fs::metadata(&tmp)
            .and_then(|meta| std::fs::rename(&tmp, &container).map(|()| meta.len()));
        let compressed_size = match published {
            Ok(size) => size,
            Err(err) => {
                let _ = std::fs::remove_file(&tmp);
                return Err(err.into());
            }
        };
        // The container is already synced and visible; failing here would
        // strand it without a catalog row.
        sync_dir(&month_dir);

        Ok(PackageOutcome {
            container,
            original_size,
            compressed_size,
        })
    }

    fn write_container(
        &self,
        tmp: &Path,
        source: &Path,
        base: &str,
        metadata: &[u8],
        mtime: u64,
    ) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp)?;

        let file = if self.compress {
            let encoder = GzEncoder::new(file, Compression::default());
            append_entries(encoder, source, base, metadata, mtime)?.finish()?
        } else {
            append_entries(file, source, base, metadata, mtime)?
        };
        file.sync_all()?;
        Ok(())
    }
}

fn append_entries<W: Write>(
    writer: W,
    source: &Path,
    base: &str,
    metadata: &[u8],
    mtime: u64,
) -> std::io::Result<W> {
    let mut builder = tar::Builder::new(writer);
    builder.follow_symlinks(false);
    builder.append_dir_all(base, source)?;

    let mut header = tar::Header::new_gnu();
    header.set_size(metadata.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(mtime);
    builder.append_data(&mut header, metadata_entry_name(base), metadata)?;

    builder.into_inner()
}

/// Extract a container under `dest_root`, skipping its metadata document.
///
/// Entries are unpacked into a hidden staging directory first and moved into
/// place only when extraction succeeded and none of the top-level names
/// already exist. Returns the restored top-level paths.
pub fn unpack_container(container: &Path, dest_root: &Path, staging_name: &str) -> Result<Vec<PathBuf>> {
    validate_component("staging", staging_name)?;
    std::fs::create_dir_all(dest_root)?;
    let staging = dest_root.join(format!(".restore-{staging_name}.tmp"));
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }
    std::fs::create_dir(&staging)?;

    let result = unpack_into(container, &staging).and_then(|()| publish_staged(&staging, dest_root));
    let _ = std::fs::remove_dir_all(&staging);
    result
}

fn unpack_into(container: &Path, staging: &Path) -> Result<()> {
    let file = BufReader::new(File::open(container)?);
    if is_compressed_container(container) {
        unpack_entries(tar::Archive::new(GzDecoder::new(file)), staging)
    } else {
        unpack_entries(tar::Archive::new(file), staging)
    }
}

fn unpack_entries<R: Read>(mut archive: tar::Archive<R>, staging: &Path) -> Result<()> {
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        if path.to_str().map(is_metadata_entry).unwrap_or(false) {
            continue;
        }
        // unpack_in refuses entries that would land outside `staging`
        if !entry.unpack_in(staging)? {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unsafe entry path {}", path.display()),
            )));
        }
    }
    Ok(())
}

fn publish_staged(staging: &Path, dest_root: &Path) -> Result<Vec<PathBuf>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(staging)? {
        names.push(entry?.file_name());
    }
    names.sort();

    for name in &names {
        let target = dest_root.join(name);
        if target.exists() {
            return Err(Error::RestoreConflict(target));
        }
    }

    let mut restored = Vec::with_capacity(names.len());
    for name in names {
        let target = dest_root.join(&name);
        std::fs::rename(staging.join(&name), &target)?;
        debug!("restored {}", target.display());
        restored.push(target);
    }
    Ok(restored)
}

/// Total size of regular files under `dir`. Symlinks are not followed.
pub fn directory_size(dir: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            total += directory_size(&entry.path())?;
        } else if file_type.is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Best-effort fsync of a directory entry list. Returns whether it synced.
fn sync_dir(path: &Path) -> bool {
    match File::open(path).and_then(|dir| dir.sync_all()) {
        Ok(()) => true,
        Err(err) => {
            warn!("fsync {} failed: {}", path.display(), err);
            false
        }
    }
}
