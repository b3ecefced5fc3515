//! Machine-readable run summary.
//!
//! Written after a run so failed page offsets can be fed back into a manual
//! re-run; nothing reads it back automatically.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::download::FetchStats;
use crate::probe::ProbeResult;

/// Errors writing the summary file.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Serialization failed.
    #[error("failed to serialize run summary: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The file could not be written.
    #[error("failed to write run summary to {path}: {source}")]
    Write {
        /// The summary path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Snapshot of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Filter expression sent as `query`.
    pub filter: String,
    /// Total hits reported by the probe.
    pub total_hits: u64,
    /// Pages planned from the probe.
    pub required_pages: u64,
    /// Records per page.
    pub page_size: u32,
    /// Directory the pages were written to.
    pub output_dir: PathBuf,
    /// Bytes written by completed pages.
    pub bytes: u64,
    /// Start offsets of pages written completely.
    pub completed_offsets: Vec<u64>,
    /// Start offsets of pages that failed.
    pub failed_offsets: Vec<u64>,
    /// Start offsets of dispatched pages stopped by the interrupt.
    pub cancelled_offsets: Vec<u64>,
    /// Start offset of the first page never requested, when the interrupt
    /// stopped dispatch early. Every later offset was skipped as well.
    pub undispatched_from: Option<u64>,
    /// True when the run was stopped by Ctrl+C.
    pub interrupted: bool,
}

impl RunSummary {
    /// Builds a summary from the probe and the engine's stats.
    #[must_use]
    pub fn new(
        filter: &str,
        probe: ProbeResult,
        required_pages: u64,
        page_size: u32,
        output_dir: &Path,
        stats: &FetchStats,
    ) -> Self {
        Self {
            filter: filter.to_string(),
            total_hits: probe.total_hits,
            required_pages,
            page_size,
            output_dir: output_dir.to_path_buf(),
            bytes: stats.bytes(),
            completed_offsets: stats.completed_offsets(),
            failed_offsets: stats.failed_offsets(),
            cancelled_offsets: stats.cancelled_offsets(),
            undispatched_from: undispatched_from(stats, required_pages, page_size),
            interrupted: stats.was_interrupted(),
        }
    }

    /// Writes the summary as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError`] if serialization or the write fails.
    pub fn write_to(&self, path: &Path) -> Result<(), SummaryError> {
        let json = serde_json::to_string_pretty(self).map_err(SummaryError::Serialize)?;
        fs::write(path, json + "\n").map_err(|source| SummaryError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "run summary written");
        Ok(())
    }
}

fn undispatched_from(stats: &FetchStats, required_pages: u64, page_size: u32) -> Option<u64> {
    let dispatched = stats.dispatched_pages();
    (dispatched < required_pages).then(|| dispatched * u64::from(page_size))
}
