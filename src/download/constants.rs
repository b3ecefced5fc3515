//! Constants for the download module (timeouts, concurrency, shutdown).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout between body chunks (5 minutes).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default number of pages downloaded at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 32;

/// How long in-flight pages may keep running after an interrupt.
pub const INTERRUPT_GRACE: Duration = Duration::from_secs(5);

/// Poll interval for the interrupt flag while waiting for a worker slot.
pub const INTERRUPT_POLL: Duration = Duration::from_millis(50);
