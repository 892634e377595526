//! Run configuration: positional arguments plus environment toggles.

use crate::cli::Cli;
use std::path::PathBuf;

/// Suppress the run summary.
pub const QUIET_ENV: &str = "BURP_WORDLISTS_QUIET";
/// Print the run summary as JSON.
pub const JSON_ENV: &str = "BURP_WORDLISTS_JSON";
/// Process input files in parallel.
pub const PARALLEL_ENV: &str = "BURP_WORDLISTS_PARALLEL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub output_dir: PathBuf,
    pub inputs: Vec<PathBuf>,
    pub quiet: bool,
    pub json: bool,
    pub parallel: bool,
}

impl Config {
    /// Merge parsed arguments with the process environment.
    pub fn from_cli(cli: Cli) -> Self {
        Self::resolve(cli, |key| std::env::var_os(key).is_some())
    }

    /// Merge parsed arguments with toggles looked up through `is_set`.
    ///
    /// A toggle is on when its variable is set, whatever its value.
    pub fn resolve(cli: Cli, is_set: impl Fn(&str) -> bool) -> Self {
        Self {
            quiet: is_set(QUIET_ENV),
            json: is_set(JSON_ENV),
            parallel: is_set(PARALLEL_ENV),
            output_dir: cli.output_dir,
            inputs: cli.inputs,
        }
    }
}
