//! Command-line front end for `burp-wordlists`.

pub mod cli;
pub mod config;
pub mod output;

use anyhow::Result;
use burp_wordlists::process_files;
use config::Config;
use output::{write_wordlists, Summary};
use tracing::info;

/// Read every input, write the wordlists and return the run summary.
///
/// Unreadable or malformed inputs are reported in the summary; only a
/// failure to write the output directory is an error.
pub fn run(config: &Config) -> Result<Summary> {
    info!(
        "reading {} export(s){}",
        config.inputs.len(),
        if config.parallel { " in parallel" } else { "" }
    );
    let run = process_files(&config.inputs, config.parallel);
    let lists = write_wordlists(&config.output_dir, &run.sets)?;
    info!("wrote {} wordlists to {}", lists.len(), config.output_dir.display());

    Ok(Summary {
        output_dir: config.output_dir.clone(),
        lists,
        report: run.report,
    })
}
