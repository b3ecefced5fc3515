//! Operator input errors detected before any network activity.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid invocation: unknown action, missing action argument, or an
/// unusable output directory.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Action name outside the supported set.
    #[error("unknown action '{action}' (expected one of: {expected})")]
    UnknownAction {
        /// The rejected action name.
        action: String,
        /// Comma separated list of accepted names.
        expected: String,
    },

    /// `institution` action given without an institution.
    #[error("institution action given without specified institution")]
    MissingInstitution,

    /// `query` action given without a filter expression.
    #[error("query action given without a query expression")]
    MissingQuery,

    /// Output directory already holds files from an earlier run.
    #[error("the output directory {path} is not empty")]
    OutputDirNotEmpty {
        /// Offending directory.
        path: PathBuf,
    },

    /// Output path exists but is not a directory.
    #[error("the output path {path} is not a directory")]
    OutputNotDirectory {
        /// Offending path.
        path: PathBuf,
    },

    /// Output directory could not be inspected or created.
    #[error("cannot prepare output directory {path}: {source}")]
    OutputDirIo {
        /// Offending directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ValidationError {
    /// Creates an output directory IO error.
    pub fn output_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputDirIo {
            path: path.into(),
            source,
        }
    }
}
