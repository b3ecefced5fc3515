//! Console output for a finished run.

use std::io::{self, Write};

use soch_core::FetchStats;

/// Prints the completion summary to stdout.
pub(crate) fn print_completion_summary(stats: &FetchStats, required_pages: u64) -> io::Result<()> {
    let mut out = io::stdout().lock();
    write_completion_summary(&mut out, stats, required_pages)
}

fn write_completion_summary(
    out: &mut impl Write,
    stats: &FetchStats,
    required_pages: u64,
) -> io::Result<()> {
    writeln!(
        out,
        "Downloaded {}/{} pages ({} bytes)",
        stats.completed(),
        required_pages,
        stats.bytes()
    )?;

    let failed = stats.failed_offsets();
    if !failed.is_empty() {
        let offsets: Vec<String> = failed.iter().map(u64::to_string).collect();
        writeln!(
            out,
            "{} page(s) failed; startRecord offsets: {}",
            failed.len(),
            offsets.join(", ")
        )?;
    }

    if stats.was_interrupted() {
        writeln!(
            out,
            "Interrupted: {} page(s) were not downloaded",
            required_pages.saturating_sub(stats.completed() as u64 + failed.len() as u64)
        )?;
    }
    Ok(())
}
