//! Weights command - per-site nucleotide frequencies and coverage.

use std::path::PathBuf;

use clap::Args;

use crate::cli::{print_json, print_tsv, OutputFormat};
use crate::consensus::pipeline::weights_from_path;
use crate::core::config::WeightsConfig;
use crate::tables::weights::WeightsRow;

#[derive(Args)]
pub struct WeightsArgs {
    /// Input alignment (SAM or BAM)
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output relative nucleotide frequencies
    #[arg(long)]
    pub relative: bool,

    /// Skip confidence calculation
    #[arg(long)]
    pub no_confidence: bool,
}

/// Execute the weights command
///
/// # Errors
///
/// Returns an error if the input cannot be read or output cannot be written.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: WeightsArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = WeightsConfig {
        relative: args.relative,
        no_confidence: args.no_confidence,
    };
    let rows = weights_from_path(&args.input, config)?;

    if verbose {
        eprintln!("Weights: {} sites from {}", rows.len(), args.input.display());
    }

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Text | OutputFormat::Tsv => print_tsv(
            &WeightsRow::tsv_header(!config.no_confidence),
            rows.iter().map(WeightsRow::to_tsv),
        ),
    }
}
