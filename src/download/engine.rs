//! Page engine: fans one query out into concurrent page downloads.
//!
//! The engine plans `required_pages` page tasks, builds a request for each
//! through the [`QueryBuilder`], and runs them on Tokio tasks gated by a
//! semaphore so at most `concurrency` requests are open at once. It waits for
//! every task before returning, so completion is observable from the returned
//! [`FetchStats`] and not only from the filesystem.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//! use soch_core::download::{HttpClient, PageEngine};
//! use soch_core::query::{ApiKey, QueryBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let builder = QueryBuilder::with_default_endpoint(ApiKey::new("test")?);
//! let engine = PageEngine::new(HttpClient::new(), builder, "data", 4)?;
//! let stats = engine.run("*", 3, Arc::new(AtomicBool::new(false))).await?;
//! println!("Completed: {}, Failed: {}", stats.completed(), stats.failed());
//! # Ok(())
//! # }
//! ```

mod task;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::HttpClient;
use super::constants::{INTERRUPT_GRACE, INTERRUPT_POLL, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::query::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Query, QueryBuilder, destination_for};

/// Error type for page engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Invalid page size provided.
    #[error("invalid page size {value}: must be between 1 and {MAX_PAGE_SIZE}")]
    InvalidPageSize {
        /// The invalid value that was provided.
        value: u32,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Pages needed to cover `total_hits` records at `page_size` records per page.
///
/// Returns 0 for a page size of 0.
#[must_use]
pub fn required_pages(total_hits: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_hits.div_ceil(u64::from(page_size))
}

/// One page of a run: its index and the record offset it starts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTask {
    /// Zero-based page index.
    pub page_index: u64,
    /// `page_index * page_size`.
    pub start_record: u64,
}

impl PageTask {
    /// File name the page is stored under.
    #[must_use]
    pub fn destination(&self) -> String {
        destination_for(self.start_record)
    }
}

/// Lazily plans the page tasks for a run, in index order.
pub fn plan_pages(required_pages: u64, page_size: u32) -> impl Iterator<Item = PageTask> {
    (0..required_pages).map(move |page_index| PageTask {
        page_index,
        start_record: page_index * u64::from(page_size),
    })
}

/// Statistics from a page run.
///
/// Counters are atomic so page tasks update them concurrently; offsets are
/// kept so failed pages can be reported for a manual re-run.
#[derive(Debug, Default)]
pub struct FetchStats {
    planned: AtomicU64,
    dispatched: AtomicU64,
    completed: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
    bytes: AtomicU64,
    interrupted: AtomicBool,
    completed_offsets: Mutex<Vec<u64>>,
    failed_offsets: Mutex<Vec<u64>>,
    cancelled_offsets: Mutex<Vec<u64>>,
}

impl FetchStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pages the run was planned with.
    #[must_use]
    pub fn planned_pages(&self) -> u64 {
        self.planned.load(Ordering::SeqCst)
    }

    /// Returns the number of pages handed to a worker.
    ///
    /// Pages are dispatched in index order, so pages `dispatched..planned`
    /// were never requested.
    #[must_use]
    pub fn dispatched_pages(&self) -> u64 {
        self.dispatched.load(Ordering::SeqCst)
    }

    /// Returns the number of pages written completely.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of pages that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the number of pages stopped by an interrupt.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the number of pages that reached a final state.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.completed() + self.failed() + self.cancelled()
    }

    /// Returns the total bytes written by completed pages.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }

    /// Returns true if the run stopped dispatching because of an interrupt.
    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Start offsets of completed pages, ascending.
    #[must_use]
    pub fn completed_offsets(&self) -> Vec<u64> {
        sorted(&self.completed_offsets)
    }

    /// Start offsets of failed pages, ascending.
    #[must_use]
    pub fn failed_offsets(&self) -> Vec<u64> {
        sorted(&self.failed_offsets)
    }

    /// Start offsets of pages stopped by an interrupt, ascending.
    #[must_use]
    pub fn cancelled_offsets(&self) -> Vec<u64> {
        sorted(&self.cancelled_offsets)
    }

    fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
    }

    fn record_completed(&self, start_record: u64, bytes: u64) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.bytes.fetch_add(bytes, Ordering::SeqCst);
        push(&self.completed_offsets, start_record);
    }

    fn record_failed(&self, start_record: u64) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        push(&self.failed_offsets, start_record);
    }

    fn record_cancelled(&self, start_record: u64) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
        push(&self.cancelled_offsets, start_record);
    }

    fn set_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }
}

fn push(offsets: &Mutex<Vec<u64>>, start_record: u64) {
    offsets
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(start_record);
}

fn sorted(offsets: &Mutex<Vec<u64>>) -> Vec<u64> {
    let mut values = offsets
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    values.sort_unstable();
    values
}

/// Concurrent page downloader for one query.
///
/// # Concurrency Model
///
/// - Each page runs in its own Tokio task
/// - A semaphore permit is acquired before starting each page
/// - Permits are released when pages finish (RAII)
/// - Pages complete in any order; `0.xml` may land after `500.xml`
///
/// # Interruption
///
/// When the shared interrupt flag is raised the engine stops dispatching.
/// In-flight pages observe the flag between body chunks and remove their
/// incomplete files; any page still running after a short grace period is
/// aborted and its file removed.
#[derive(Debug)]
pub struct PageEngine {
    client: HttpClient,
    builder: QueryBuilder,
    output_dir: PathBuf,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    page_size: u32,
}

impl PageEngine {
    /// Creates an engine writing pages into `output_dir` with at most
    /// `concurrency` pages in flight, using the default page size.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-32).
    #[instrument(level = "debug", skip(client, builder, output_dir))]
    pub fn new(
        client: HttpClient,
        builder: QueryBuilder,
        output_dir: impl Into<PathBuf>,
        concurrency: usize,
    ) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        let output_dir = output_dir.into();
        debug!(concurrency, output_dir = %output_dir.display(), "creating page engine");

        Ok(Self {
            client,
            builder,
            output_dir,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Overrides the number of records requested per page.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPageSize`] outside 1-500.
    pub fn with_page_size(mut self, page_size: u32) -> Result<Self, EngineError> {
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(EngineError::InvalidPageSize { value: page_size });
        }
        self.page_size = page_size;
        Ok(self)
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the records requested per page.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Returns the directory pages are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Downloads pages `0..required_pages` of `filter` and waits for all of them.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if permit acquisition fails.
    /// Individual page failures do NOT cause this method to error; they are
    /// counted in the returned stats.
    pub async fn run(
        &self,
        filter: &str,
        required_pages: u64,
        interrupted: Arc<AtomicBool>,
    ) -> Result<Arc<FetchStats>, EngineError> {
        let stats = Arc::new(FetchStats::new());
        self.run_with_stats(filter, required_pages, interrupted, Arc::clone(&stats))
            .await?;
        Ok(stats)
    }

    /// Same as [`Self::run`], recording into caller-owned `stats` so progress
    /// can be observed while the run is active.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if permit acquisition fails.
    #[instrument(skip(self, interrupted, stats), fields(output_dir = %self.output_dir.display()))]
    pub async fn run_with_stats(
        &self,
        filter: &str,
        required_pages: u64,
        interrupted: Arc<AtomicBool>,
        stats: Arc<FetchStats>,
    ) -> Result<(), EngineError> {
        let mut handles: Vec<(u64, JoinHandle<()>)> = Vec::new();

        stats.planned.store(required_pages, Ordering::SeqCst);
        info!(required_pages, page_size = self.page_size, "starting page downloads");

        for page in plan_pages(required_pages, self.page_size) {
            if interrupted.load(Ordering::SeqCst) {
                stats.set_interrupted();
                break;
            }
            drain_finished_page_tasks(&mut handles, stats.as_ref()).await;

            // Race the permit against the interrupt flag so Ctrl+C while all
            // workers are busy stops dispatch immediately.
            let permit = tokio::select! {
                biased;
                () = wait_for_interrupt(&interrupted) => {
                    stats.set_interrupted();
                    None
                }
                result = self.semaphore.clone().acquire_owned() => {
                    Some(result.map_err(|_| EngineError::SemaphoreClosed)?)
                }
            };
            let Some(permit) = permit else {
                break;
            };

            let descriptor = self
                .builder
                .build(&Query::new(filter, self.page_size, page.start_record));
            debug!(
                page_index = page.page_index,
                start_record = page.start_record,
                "dispatching page"
            );

            stats.record_dispatched();
            let client = self.client.clone();
            let output_dir = self.output_dir.clone();
            let stats = Arc::clone(&stats);
            let interrupted = Arc::clone(&interrupted);

            handles.push((
                page.start_record,
                tokio::spawn(async move {
                    // Permit is dropped when this block exits (RAII)
                    let _permit = permit;
                    task::process_page(client, descriptor, output_dir, stats, interrupted).await;
                }),
            ));
        }

        debug!(
            task_count = handles.len(),
            "waiting for page downloads to complete"
        );

        // An interrupt can also arrive after the last page was dispatched, so
        // every join races the flag.
        let mut pending: VecDeque<(u64, JoinHandle<()>)> = handles.into();
        while let Some((start_record, mut handle)) = pending.pop_front() {
            let joined = tokio::select! {
                biased;
                joined = &mut handle => Some(joined),
                () = wait_for_interrupt(&interrupted) => None,
            };
            match joined {
                Some(Ok(())) => {}
                Some(Err(e)) => task::handle_task_join_error(start_record, &e, stats.as_ref()),
                None => {
                    pending.push_front((start_record, handle));
                    break;
                }
            }
        }

        if !pending.is_empty() || interrupted.load(Ordering::SeqCst) {
            stats.set_interrupted();
            self.join_with_grace(pending, stats.as_ref()).await;
        }

        info!(
            completed = stats.completed(),
            failed = stats.failed(),
            cancelled = stats.cancelled(),
            bytes = stats.bytes(),
            interrupted = stats.was_interrupted(),
            "page downloads finished"
        );
        Ok(())
    }

    /// Waits up to [`INTERRUPT_GRACE`] for in-flight pages, then aborts the rest.
    async fn join_with_grace(&self, handles: VecDeque<(u64, JoinHandle<()>)>, stats: &FetchStats) {
        let deadline = tokio::time::Instant::now() + INTERRUPT_GRACE;
        for (start_record, mut handle) in handles {
            let now = tokio::time::Instant::now();
            let joined = if now >= deadline {
                None
            } else {
                tokio::time::timeout(deadline - now, &mut handle).await.ok()
            };

            match joined {
                Some(Ok(())) => {}
                Some(Err(e)) => task::handle_task_join_error(start_record, &e, stats),
                None => {
                    handle.abort();
                    // The task must be gone before its file is removed, or a
                    // pending create could bring the file back.
                    match handle.await {
                        Ok(()) => {}
                        Err(e) if e.is_cancelled() => {
                            let path = self.output_dir.join(destination_for(start_record));
                            let _ = tokio::fs::remove_file(&path).await;
                            warn!(start_record, "page aborted after interrupt grace period");
                            stats.record_cancelled(start_record);
                        }
                        Err(e) => task::handle_task_join_error(start_record, &e, stats),
                    }
                }
            }
        }
    }
}

async fn wait_for_interrupt(interrupted: &AtomicBool) {
    while !interrupted.load(Ordering::SeqCst) {
        tokio::time::sleep(INTERRUPT_POLL).await;
    }
}

/// Awaits handles that already finished so the handle list stays bounded by
/// the concurrency limit rather than the page count.
async fn drain_finished_page_tasks(handles: &mut Vec<(u64, JoinHandle<()>)>, stats: &FetchStats) {
    let mut index = 0;
    while index < handles.len() {
        if handles[index].1.is_finished() {
            let (start_record, handle) = handles.swap_remove(index);
            if let Err(e) = handle.await {
                task::handle_task_join_error(start_record, &e, stats);
            }
        } else {
            index += 1;
        }
    }
}
