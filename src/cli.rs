//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Bulk download search results from the SOCH (K-samsok) API.
///
/// The total hit count is looked up first and the download only starts
/// after confirmation: type `y` and press Enter to proceed, anything else
/// declines. Every page of up to 500 records is written to
/// `<output-dir>/<startRecord>.xml`.
///
/// Ctrl+C before the download starts exits at once. During the download the
/// first Ctrl+C stops new requests and a second one exits immediately.
#[derive(Parser, Debug, Clone)]
#[command(name = "soch-download")]
#[command(author, version, about)]
pub struct Args {
    /// What to download: all, institution, geodata-exists, query
    #[arg(long, default_value = "all")]
    pub action: String,

    /// SOCH API key [default: config file, then "test"]
    #[arg(long, env = "SOCH_API_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// The institution abbreviation (only applies if action=institution)
    #[arg(long)]
    pub institution: Option<String>,

    /// Raw filter expression (only applies if action=query)
    #[arg(long)]
    pub query: Option<String>,

    /// Directory the pages are written to; must be empty [default: data]
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum pages downloaded at once (1-32) [default: 4]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub concurrency: Option<u8>,

    /// Search API endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Skip the confirmation prompt (otherwise answer with y + Enter)
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Write a JSON run summary (with failed page offsets) to this file
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored log output
    #[arg(long)]
    pub no_color: bool,
}

impl Args {
    /// Default log level from the verbosity flags.
    ///
    /// Priority: quiet flag > verbose flag > default (info); `RUST_LOG`
    /// overrides all of them when set.
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["soch-download"]).unwrap();
        assert_eq!(args.action, "all");
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(!args.yes);
        assert!(args.concurrency.is_none());
        assert!(args.output_dir.is_none());
        assert!(args.institution.is_none());
    }

    #[test]
    fn test_cli_action_and_institution() {
        let args = Args::try_parse_from([
            "soch-download",
            "--action",
            "institution",
            "--institution",
            "RAA",
        ])
        .unwrap();
        assert_eq!(args.action, "institution");
        assert_eq!(args.institution.as_deref(), Some("RAA"));
    }

    #[test]
    fn test_cli_unknown_action_is_left_for_validation() {
        let args = Args::try_parse_from(["soch-download", "--action", "everything"]).unwrap();
        assert_eq!(args.action, "everything");
    }

    #[test]
    fn test_cli_key_flag() {
        let args = Args::try_parse_from(["soch-download", "--key", "abc"]).unwrap();
        assert_eq!(args.key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["soch-download", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);
        assert_eq!(args.default_log_level(), "debug");

        let args = Args::try_parse_from(["soch-download", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.default_log_level(), "trace");
    }

    #[test]
    fn test_cli_quiet_flag_wins_over_verbose() {
        let args = Args::try_parse_from(["soch-download", "-q", "-v"]).unwrap();
        assert!(args.quiet);
        assert_eq!(args.default_log_level(), "error");
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["soch-download", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let result = Args::try_parse_from(["soch-download", "--version"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let result = Args::try_parse_from(["soch-download", "--invalid-flag"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_concurrency_bounds() {
        let args = Args::try_parse_from(["soch-download", "-c", "1"]).unwrap();
        assert_eq!(args.concurrency, Some(1));
        let args = Args::try_parse_from(["soch-download", "--concurrency", "32"]).unwrap();
        assert_eq!(args.concurrency, Some(32));

        for bad in ["0", "33"] {
            let err = Args::try_parse_from(["soch-download", "-c", bad]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn test_cli_output_summary_and_yes() {
        let args = Args::try_parse_from([
            "soch-download",
            "-o",
            "out",
            "--summary",
            "run.json",
            "-y",
            "--no-color",
        ])
        .unwrap();
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert_eq!(args.summary, Some(PathBuf::from("run.json")));
        assert!(args.yes);
        assert!(args.no_color);
    }
}
