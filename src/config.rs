//! File configuration for CLI defaults.
//!
//! An optional `config.toml` supplies defaults that command-line flags
//! override. Every key is optional; unknown keys are rejected so typos do
//! not go unnoticed.
//!
//! ```toml
//! api_key = "my-key"
//! output_dir = "records"
//! concurrency = 8
//! read_timeout_secs = 600
//! ```

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::download::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::query::MAX_PAGE_SIZE;

/// Directory name under the XDG config home.
pub const CONFIG_DIR_NAME: &str = "soch-download";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors from reading or validating the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unknown keys or wrong types.
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config value for `{field}`: {value}. Expected {expected}")]
    InvalidValue {
        /// The offending key.
        field: &'static str,
        /// The value as written.
        value: String,
        /// Description of the accepted values.
        expected: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, value: impl ToString, expected: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.to_string(),
            expected: expected.into(),
        }
    }
}

/// TOML-backed defaults for the downloader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Default API key.
    pub api_key: Option<String>,
    /// Search API endpoint.
    pub endpoint: Option<String>,
    /// Default output directory.
    pub output_dir: Option<PathBuf>,
    /// Default number of pages in flight (same range as the CLI).
    pub concurrency: Option<usize>,
    /// Records requested per page.
    pub page_size: Option<u32>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Parses and validates config text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::InvalidValue`] for out-of-range values.
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates values against runtime and CLI constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(concurrency) = self.concurrency
            && !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency)
        {
            return Err(ConfigError::invalid(
                "concurrency",
                concurrency,
                format!("range {MIN_CONCURRENCY}..={MAX_CONCURRENCY}"),
            ));
        }

        if let Some(page_size) = self.page_size
            && !(1..=MAX_PAGE_SIZE).contains(&page_size)
        {
            return Err(ConfigError::invalid(
                "page_size",
                page_size,
                format!("range 1..={MAX_PAGE_SIZE}"),
            ));
        }

        if let Some(endpoint) = &self.endpoint
            && Url::parse(endpoint).is_err()
        {
            return Err(ConfigError::invalid("endpoint", endpoint, "an absolute URL"));
        }

        if let Some(api_key) = &self.api_key
            && api_key.trim().is_empty()
        {
            return Err(ConfigError::invalid("api_key", "\"\"", "a non-empty key"));
        }

        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &'static str, value: Option<u64>) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::invalid(field, value, "range 1..=3600"));
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/soch-download/config.toml`
/// 2. `$HOME/.config/soch-download/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_path_from(
        env_var_non_empty_os("XDG_CONFIG_HOME"),
        env_var_non_empty_os("HOME"),
    )
}

fn config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg_config_home) = xdg_config_home {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    let home = home?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file exists but cannot be read, parsed
/// or validated. A missing file is not an error.
pub fn load_default_file_config() -> Result<LoadedConfig, ConfigError> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

/// Loads and validates one config file.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read, parsed or validated.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = FileConfig::from_toml_str(&raw, path)?;
    debug!(path = %path.display(), "loaded config file");
    Ok(config)
}
