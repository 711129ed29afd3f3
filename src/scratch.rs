//! Scratch directory eviction
//!
//! The payload leaves intermediate media under the scratch directory. Anything
//! older than the configured age is removed at the next container start.

use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use walkdir::WalkDir;

/// Outcome of a single sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Files deleted
    pub removed: usize,
    /// Regular files young enough to keep
    pub retained: usize,
    /// Entries that could not be inspected or deleted
    pub failed: usize,
    /// Whether the scratch directory existed at all
    pub dir_present: bool,
}

/// Remove every regular file under `scratch_dir` last modified before
/// `now - max_age`.
///
/// Never fails: missing directories, permission problems and entries that
/// vanish mid-walk are counted in the report and otherwise ignored.
pub fn sweep_scratch(scratch_dir: &Path, max_age: Duration) -> SweepReport {
    let now = SystemTime::now();
    let cutoff = now.checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH);
    sweep_before(scratch_dir, cutoff)
}

/// Sweep against a precomputed cutoff
pub fn sweep_before(scratch_dir: &Path, cutoff: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();

    if !scratch_dir.is_dir() {
        tracing::debug!("Scratch directory {} not present", scratch_dir.display());
        return report;
    }
    report.dir_present = true;

    tracing::debug!(
        "Sweeping {} for files modified before {}",
        scratch_dir.display(),
        chrono::DateTime::<chrono::Utc>::from(cutoff).to_rfc3339()
    );

    for entry in WalkDir::new(scratch_dir).follow_links(false).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // Raced deletions surface as walk errors too
                if !is_not_found(e.io_error()) {
                    tracing::debug!("Scratch walk error: {}", e);
                    report.failed += 1;
                }
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let modified = match entry.metadata().map(|m| m.modified()) {
            Ok(Ok(modified)) => modified,
            Ok(Err(e)) => {
                tracing::debug!("No mtime for {}: {}", entry.path().display(), e);
                report.failed += 1;
                continue;
            }
            Err(e) => {
                if !is_not_found(e.io_error()) {
                    tracing::debug!("Cannot stat {}: {}", entry.path().display(), e);
                    report.failed += 1;
                }
                continue;
            }
        };

        if modified >= cutoff {
            report.retained += 1;
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => report.removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::debug!("Cannot remove {}: {}", entry.path().display(), e);
                report.failed += 1;
            }
        }
    }

    report
}

fn is_not_found(err: Option<&io::Error>) -> bool {
    err.map(|e| e.kind() == io::ErrorKind::NotFound)
        .unwrap_or(false)
}
