//! Filing lifecycle management.
//!
//! This module moves processed filings from active storage into cold
//! storage and back:
//! - Retention policy evaluation per importance bucket
//! - Resolution of catalog records to their artifact directories
//! - Atomic packaging into month-bucketed tar containers
//! - Statistics over the catalog and the archive root
//!
//! # Example
//!
//! ```rust,ignore
//! use filing_archive::catalog::SqliteCatalog;
//! use filing_archive::config::ArchiveConfig;
//! use filing_archive::lifecycle::ArchiveOrchestrator;
//!
//! let config = ArchiveConfig::default();
//! let catalog = SqliteCatalog::open(&config.catalog_path)?;
//! let orchestrator = ArchiveOrchestrator::new(config, catalog)?;
//!
//! let summary = orchestrator.archive(Some(90))?;
//! println!("archived {} reports, saved {} bytes",
//!     summary.archived_count, summary.total_size_saved);
//! ```

mod candidate;
mod manager;
mod metadata;
mod packager;
mod policy;
mod resolver;
mod stats;

pub use candidate::{list_candidates, DirectoryCandidate};
pub use manager::ArchiveOrchestrator;
pub use metadata::{archive_reason, read_metadata, ArchiveMetadataDescriptor};
pub use packager::{directory_size, unpack_container, ArtifactPackager, PackageOutcome};
pub use policy::{cutoff, is_eligible, ImportanceBucket, RetentionEngine};
pub use resolver::{DirectoryHint, DirectoryResolver, ResolvedBy, ResolvedDirectory};
pub use stats::{scan_containers, ArchiveRunSummary, ArchiveStatistics, ContainerTotals};
