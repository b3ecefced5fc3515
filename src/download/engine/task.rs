//! Single page task: fetch, write, and record the outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::task::JoinError;
use tracing::{info, warn};

use super::FetchStats;
use crate::download::{HttpClient, TaskError};
use crate::query::RequestDescriptor;

/// Runs one page to a final state and records it in `stats`.
///
/// Failures are logged against the page offset and never propagate, so one
/// bad page cannot stop its siblings.
pub(super) async fn process_page(
    client: HttpClient,
    descriptor: RequestDescriptor,
    output_dir: PathBuf,
    stats: Arc<FetchStats>,
    interrupted: Arc<AtomicBool>,
) {
    let start_record = descriptor.start_record();
    match client
        .fetch_page(descriptor, &output_dir, interrupted.as_ref())
        .await
    {
        Ok(page) => {
            info!(
                start_record,
                bytes = page.bytes,
                path = %page.path.display(),
                "page saved"
            );
            stats.record_completed(start_record, page.bytes);
        }
        Err(error) => record_page_error(start_record, &error, &stats),
    }
}

fn record_page_error(start_record: u64, error: &TaskError, stats: &FetchStats) {
    if error.is_cancelled() {
        info!(start_record, "page cancelled by interrupt");
        stats.record_cancelled(start_record);
    } else {
        warn!(start_record, error = %error, "page failed");
        stats.record_failed(start_record);
    }
}

/// Records a page whose task panicked or was cancelled by the runtime.
pub(super) fn handle_task_join_error(start_record: u64, error: &JoinError, stats: &FetchStats) {
    if error.is_cancelled() {
        stats.record_cancelled(start_record);
    } else {
        warn!(start_record, error = %error, "page task panicked");
        stats.record_failed(start_record);
    }
}
