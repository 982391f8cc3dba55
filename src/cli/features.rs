//! Features command - per-site frequencies with indel and soft-clip counts.

use std::path::PathBuf;

use clap::Args;

use crate::cli::{print_json, print_tsv, OutputFormat};
use crate::consensus::pipeline::features_from_path;
use crate::tables::weights::FeaturesRow;

#[derive(Args)]
pub struct FeaturesArgs {
    /// Input alignment (SAM or BAM)
    #[arg(required = true)]
    pub input: PathBuf,
}

/// Execute the features command
///
/// # Errors
///
/// Returns an error if the input cannot be read or output cannot be written.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: FeaturesArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let rows = features_from_path(&args.input)?;

    if verbose {
        eprintln!("Features: {} sites from {}", rows.len(), args.input.display());
    }

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Text | OutputFormat::Tsv => {
            print_tsv(FeaturesRow::TSV_HEADER, rows.iter().map(FeaturesRow::to_tsv))
        }
    }
}
