//! Confirmation gate between the count probe and the page downloads.
//!
//! The gate probes the total hit count, reports the download size to the
//! operator, and only dispatches page downloads after an explicit `y`.
//! Anything else, including end of input, declines cleanly.
//!
//! ```text
//! Idle -> Probing -> AwaitingConfirmation -> Running -> Done
//!            |                |
//!            +----------------+---------> Aborted
//! ```
//!
//! There is no edge back to `Probing`: a gate runs once.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::download::{EngineError, FetchStats, PageEngine};
use crate::probe::{CountProber, ProbeError, ProbeResult};

/// Lifecycle of one gated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Nothing has happened yet.
    Idle,
    /// The count probe is in flight.
    Probing,
    /// Waiting for the operator's answer.
    AwaitingConfirmation,
    /// Page downloads are running.
    Running,
    /// Stopped before downloading: probe failure, decline, or prompt error.
    Aborted,
    /// Every dispatched page reached a final state.
    Done,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::AwaitingConfirmation => "awaiting-confirmation",
            Self::Running => "running",
            Self::Aborted => "aborted",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Errors that stop a gated run.
#[derive(Debug, Error)]
pub enum GateError {
    /// The count probe failed; nothing was downloaded.
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Reading the operator's answer failed.
    #[error("failed to read confirmation: {0}")]
    Prompt(#[source] io::Error),

    /// The page engine failed as a whole.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The gate was asked to run a second time.
    #[error("confirmation gate already used (state: {state})")]
    AlreadyUsed {
        /// State the gate was in.
        state: GateState,
    },
}

/// How a gated run ended when no error occurred.
#[derive(Debug)]
pub enum GateOutcome {
    /// The operator did not answer `y`; no page was requested.
    Declined {
        /// The probe the operator was shown.
        probe: ProbeResult,
    },
    /// Page downloads ran to completion (or were interrupted).
    Completed {
        /// The probe the run was planned from.
        probe: ProbeResult,
        /// Number of pages planned.
        required_pages: u64,
        /// Per-page results.
        stats: Arc<FetchStats>,
    },
}

/// Source of the operator's go/no-go answer.
pub trait Prompt {
    /// Shows the probe result and the page count it implies.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the report cannot be written.
    fn report(&mut self, total_hits: u64, required_pages: u64) -> io::Result<()>;

    /// Reads one answer. `None` means input ended without an answer.
    ///
    /// # Errors
    ///
    /// Returns an IO error if input cannot be read.
    fn read_choice(&mut self) -> io::Result<Option<char>>;
}

/// Line-based prompt over a reader and writer, stdin/stdout by default.
#[derive(Debug)]
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stdout> {
    /// Prompt reading from stdin and writing to stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    /// Prompt over arbitrary streams.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Consumes the prompt and returns the output stream.
    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Prompt for TerminalPrompt<R, W> {
    fn report(&mut self, total_hits: u64, required_pages: u64) -> io::Result<()> {
        writeln!(
            self.output,
            "Found {total_hits} results, they would be split over {required_pages} requests/files"
        )?;
        writeln!(self.output, "Would you like to proceed with the download? y/n")?;
        self.output.flush()
    }

    fn read_choice(&mut self) -> io::Result<Option<char>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(line.trim_start().chars().next())
    }
}

/// Prompt that always answers `y`, for `--yes`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl Prompt for AutoConfirm {
    fn report(&mut self, total_hits: u64, required_pages: u64) -> io::Result<()> {
        info!(total_hits, required_pages, "confirmation skipped");
        Ok(())
    }

    fn read_choice(&mut self) -> io::Result<Option<char>> {
        Ok(Some('y'))
    }
}

/// Runs probe, confirmation and page downloads as one guarded sequence.
#[derive(Debug)]
pub struct ConfirmationGate {
    prober: CountProber,
    engine: PageEngine,
    interrupted: Arc<AtomicBool>,
    stats: Arc<FetchStats>,
    state: GateState,
}

impl ConfirmationGate {
    /// Creates an idle gate.
    #[must_use]
    pub fn new(prober: CountProber, engine: PageEngine, interrupted: Arc<AtomicBool>) -> Self {
        Self {
            prober,
            engine,
            interrupted,
            stats: Arc::new(FetchStats::new()),
            state: GateState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> GateState {
        self.state
    }

    /// Live page statistics, filled in once the gate is running.
    #[must_use]
    pub fn stats(&self) -> Arc<FetchStats> {
        Arc::clone(&self.stats)
    }

    /// Probes `filter`, asks `prompt`, and downloads every page on `y`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when the probe fails, the prompt cannot be read,
    /// the engine fails, or the gate has already been used. Single page
    /// failures are not errors; they are recorded in the outcome's stats.
    #[instrument(skip(self, prompt))]
    pub async fn confirm_and_run<P>(
        &mut self,
        filter: &str,
        prompt: &mut P,
    ) -> Result<GateOutcome, GateError>
    where
        P: Prompt + ?Sized,
    {
        if self.state != GateState::Idle {
            return Err(GateError::AlreadyUsed { state: self.state });
        }

        self.transition(GateState::Probing);
        let probe = match self.prober.probe(filter).await {
            Ok(probe) => probe,
            Err(e) => {
                self.transition(GateState::Aborted);
                return Err(e.into());
            }
        };
        let required_pages = probe.required_pages(self.engine.page_size());

        self.transition(GateState::AwaitingConfirmation);
        let choice = prompt
            .report(probe.total_hits, required_pages)
            .and_then(|()| prompt.read_choice());
        let choice = match choice {
            Ok(choice) => choice,
            Err(e) => {
                self.transition(GateState::Aborted);
                return Err(GateError::Prompt(e));
            }
        };

        if choice != Some('y') {
            info!(?choice, "download declined");
            self.transition(GateState::Aborted);
            return Ok(GateOutcome::Declined { probe });
        }

        self.transition(GateState::Running);
        let result = self
            .engine
            .run_with_stats(
                filter,
                required_pages,
                Arc::clone(&self.interrupted),
                Arc::clone(&self.stats),
            )
            .await;
        if let Err(e) = result {
            self.transition(GateState::Aborted);
            return Err(e.into());
        }

        self.transition(GateState::Done);
        Ok(GateOutcome::Completed {
            probe,
            required_pages,
            stats: self.stats(),
        })
    }

    fn transition(&mut self, next: GateState) {
        debug!(from = %self.state, to = %next, "gate transition");
        self.state = next;
    }
}
