//! Configuration lifecycle: load file config, merge CLI overrides.

use std::path::PathBuf;

use anyhow::{Context, Result};
use soch_core::config::load_default_file_config;
use soch_core::download::{CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, READ_TIMEOUT_SECS};
use soch_core::output_dir::DEFAULT_OUTPUT_DIR;
use soch_core::query::{DEFAULT_API_KEY, DEFAULT_ENDPOINT, DEFAULT_PAGE_SIZE};
use soch_core::FileConfig;
use tracing::debug;
use url::Url;

use crate::cli::Args;

/// Settings for one run after CLI values override the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunSettings {
    /// Unvalidated API key.
    pub(crate) api_key: String,
    pub(crate) endpoint: Url,
    pub(crate) output_dir: PathBuf,
    pub(crate) concurrency: usize,
    pub(crate) page_size: u32,
    pub(crate) connect_timeout_secs: u64,
    pub(crate) read_timeout_secs: u64,
}

/// Loads the default config file and merges `args` over it.
pub(crate) fn resolve_settings(args: &Args) -> Result<RunSettings> {
    let loaded = load_default_file_config()?;
    if let Some(path) = loaded.path.as_deref()
        && loaded.config.is_some()
    {
        debug!(path = %path.display(), "using config file");
    }
    merge_settings(args, loaded.config.as_ref())
}

fn merge_settings(args: &Args, file: Option<&FileConfig>) -> Result<RunSettings> {
    let defaults = FileConfig::default();
    let file = file.unwrap_or(&defaults);

    let endpoint_raw = args
        .endpoint
        .clone()
        .or_else(|| file.endpoint.clone())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let endpoint = Url::parse(&endpoint_raw)
        .with_context(|| format!("Invalid endpoint URL '{endpoint_raw}'"))?;

    Ok(RunSettings {
        api_key: args
            .key
            .clone()
            .or_else(|| file.api_key.clone())
            .unwrap_or_else(|| DEFAULT_API_KEY.to_string()),
        endpoint,
        output_dir: args
            .output_dir
            .clone()
            .or_else(|| file.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        concurrency: args
            .concurrency
            .map(usize::from)
            .or(file.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY),
        page_size: file.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        connect_timeout_secs: file.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
        read_timeout_secs: file.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS),
    })
}
