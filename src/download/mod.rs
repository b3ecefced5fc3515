//! Page downloads for the search API.
//!
//! This module streams result pages to disk and runs them concurrently.
//!
//! # Features
//!
//! - Streaming downloads (a page is never held in memory as a whole)
//! - Bounded concurrency through a semaphore
//! - Per-page failure isolation with offsets recorded for re-runs
//! - Cooperative interruption with a short grace period
//!
//! # Example
//!
//! ```no_run
//! use soch_core::download::HttpClient;
//! use soch_core::query::{ApiKey, Query, QueryBuilder};
//! use std::path::Path;
//! use std::sync::atomic::AtomicBool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let builder = QueryBuilder::with_default_endpoint(ApiKey::new("test")?);
//! let descriptor = builder.build(&Query::new("*", 500, 0));
//! let page = HttpClient::new()
//!     .fetch_page(descriptor, Path::new("data"), &AtomicBool::new(false))
//!     .await?;
//! println!("Downloaded: {}", page.path.display());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod engine;
mod error;

pub use client::{HttpClient, PageDownload, is_service_success};
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, INTERRUPT_GRACE, MAX_CONCURRENCY, MIN_CONCURRENCY,
    READ_TIMEOUT_SECS,
};
pub use engine::{EngineError, FetchStats, PageEngine, PageTask, plan_pages, required_pages};
pub use error::TaskError;
