use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use filing_archive::catalog::{LocationKind, SqliteCatalog};
use filing_archive::clock::format_processed_at;
use filing_archive::{ArchiveConfig, ArchiveOrchestrator, ArchiveStatistics};

#[derive(Parser)]
#[command(name = "filing-archive")]
#[command(about = "Archive, restore and inspect processed filing artifacts")]
struct Cli {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Active storage root (overrides config)
    #[arg(long, global = true)]
    active_root: Option<PathBuf>,

    /// Archive root (overrides config)
    #[arg(long, global = true)]
    archive_root: Option<PathBuf>,

    /// Catalog database path (overrides config)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark reports past retention and move them into the archive
    Archive {
        /// Uniform retention in days; per-importance periods when omitted
        #[arg(long)]
        retention_days: Option<u32>,

        /// List the reports that would be archived without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Extract an archived report back into active storage
    Restore {
        report_id: String,
    },
    /// Show catalog and archive statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ArchiveConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ArchiveConfig::default(),
    };
    if let Some(path) = cli.active_root {
        config.active_root = path;
    }
    if let Some(path) = cli.archive_root {
        config.archive_root = path;
    }
    if let Some(path) = cli.catalog {
        config.catalog_path = path;
    }

    let catalog = SqliteCatalog::open(&config.catalog_path)
        .with_context(|| format!("opening catalog {}", config.catalog_path.display()))?;
    let orchestrator = ArchiveOrchestrator::new(config, catalog)?;

    match cli.command {
        Commands::Archive {
            retention_days,
            dry_run,
            json,
        } => {
            if dry_run {
                let candidates = orchestrator.candidates(retention_days)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&candidates)?);
                } else {
                    println!("{} reports would be archived", candidates.len());
                    for record in &candidates {
                        println!(
                            "  {}  {}  importance={}  {}",
                            record.report_id,
                            format_processed_at(record.processed_at),
                            record.importance_level,
                            record.target_company
                        );
                    }
                }
                return Ok(());
            }

            let before = orchestrator.statistics()?;
            let summary = orchestrator.archive(retention_days)?;
            let after = orchestrator.statistics()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_statistics("before", &before);
                println!(
                    "archived: {}  failed: {}  not found: {}  saved: {:.2} MB",
                    summary.archived_count,
                    summary.failed_count,
                    summary.not_found_count,
                    summary.total_size_saved as f64 / (1024.0 * 1024.0)
                );
                print_statistics("after", &after);
            }
        }
        Commands::Restore { report_id } => {
            let restored = orchestrator
                .restore(&report_id)
                .with_context(|| format!("restoring {report_id}"))?;
            println!("{}", restored.display());
        }
        Commands::Stats { json } => {
            let stats = orchestrator.statistics()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_statistics("current", &stats);
            }
        }
    }

    Ok(())
}

fn print_statistics(label: &str, stats: &ArchiveStatistics) {
    println!("[{label}]");
    for kind in [LocationKind::Active, LocationKind::Pending, LocationKind::Archived] {
        match stats.avg_importance(kind) {
            Some(avg) => println!("  {:<9} {:>6}  avg importance {:.2}", kind.as_str(), stats.count(kind), avg),
            None => println!("  {:<9} {:>6}", kind.as_str(), 0),
        }
    }
    for (report_type, count) in &stats.report_types {
        println!("  {:<9} {:>6}", report_type, count);
    }
    println!(
        "  containers {}  ({:.2} MB)",
        stats.container_count,
        stats.total_archive_mb()
    );
}
