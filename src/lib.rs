//! SOCH Download Core Library
//!
//! This library provides the core functionality for the soch-download tool,
//! which bulk-downloads search results from the K-samsok (SOCH) API as
//! paginated XML files.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`query`] - Request construction, actions and API keys
//! - [`probe`] - Total hit count lookup
//! - [`download`] - Streaming page downloads and the concurrent page engine
//! - [`gate`] - Probe, confirm, then download
//! - [`output_dir`] - Output directory preconditions
//! - [`config`] - TOML file defaults
//! - [`summary`] - JSON run summary

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod gate;
pub mod output_dir;
pub mod probe;
pub mod query;
pub mod summary;
mod user_agent;
pub mod validation;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{ConfigError, FileConfig, LoadedConfig, load_default_file_config};
pub use download::{
    DEFAULT_CONCURRENCY, EngineError, FetchStats, HttpClient, PageEngine, TaskError,
    required_pages,
};
pub use gate::{AutoConfirm, ConfirmationGate, GateError, GateOutcome, GateState, Prompt, TerminalPrompt};
pub use probe::{CountProber, ProbeError, ProbeResult};
pub use query::{Action, ApiKey, AuthError, Query, QueryBuilder, RequestDescriptor};
pub use summary::{RunSummary, SummaryError};
pub use validation::ValidationError;
