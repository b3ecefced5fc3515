//! Exit code logic for the soch-download process.
//!
//! Single responsibility: map page outcomes to the process exit outcome.

use crate::ProcessExit;

/// Determines the process exit outcome from completed and failed page counts.
///
/// An interrupted run is a failure regardless of how many pages landed.
pub(crate) fn determine_exit_outcome(
    completed: usize,
    failed: usize,
    interrupted: bool,
) -> ProcessExit {
    if interrupted {
        ProcessExit::Failure
    } else if failed == 0 {
        ProcessExit::Success
    } else if completed > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}
