//! Progress UI (bar) for page downloads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use soch_core::FetchStats;

/// Spawns the progress UI when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `show_progress` is false, returns (None, stop) with stop already true.
///
/// Nothing is drawn until the run has a page plan, so the bar never
/// overlaps the confirmation prompt.
pub(crate) fn spawn_progress_ui(
    show_progress: bool,
    stats: Arc<FetchStats>,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !show_progress {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_bar_inner(stats, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_bar_inner(stats: Arc<FetchStats>, stop: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut bar: Option<ProgressBar> = None;

        while !stop.load(Ordering::SeqCst) {
            let planned = stats.planned_pages();
            if planned > 0 {
                let bar = bar.get_or_insert_with(|| new_bar(planned));
                bar.set_position(stats.finished() as u64);
                if stats.failed() > 0 {
                    bar.set_message(format!("{} failed", stats.failed()));
                }
            }
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
    })
}

fn new_bar(planned: u64) -> ProgressBar {
    let bar = ProgressBar::new(planned);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{pos}/{len}] pages {wide_bar} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
