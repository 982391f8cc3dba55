//! Variants command - alleles exceeding absolute and relative frequency thresholds.

use std::path::PathBuf;

use clap::Args;

use crate::cli::{print_json, print_tsv, OutputFormat};
use crate::consensus::pipeline::variants_from_path;
use crate::core::config::{VariantConfig, DEFAULT_ABS_THRESHOLD, DEFAULT_REL_THRESHOLD};
use crate::tables::variants::VariantRecord;

#[derive(Args)]
pub struct VariantsArgs {
    /// Input alignment (SAM or BAM)
    #[arg(required = true)]
    pub input: PathBuf,

    /// Minimum allele count (0-∞) at which to call a variant
    #[arg(long, default_value_t = DEFAULT_ABS_THRESHOLD)]
    pub abs_threshold: u32,

    /// Minimum allele frequency (0.0-1.0) at which to call a variant
    #[arg(long, default_value_t = DEFAULT_REL_THRESHOLD)]
    pub rel_threshold: f64,

    /// Exclude invariant sites from output
    #[arg(long)]
    pub only_variants: bool,

    /// Report absolute allele counts instead of frequencies
    #[arg(long)]
    pub absolute: bool,
}

/// Execute the variants command
///
/// # Errors
///
/// Returns an error if the thresholds are invalid, the input cannot be read,
/// or output cannot be written.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: VariantsArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = VariantConfig {
        abs_threshold: args.abs_threshold,
        rel_threshold: args.rel_threshold,
        only_variants: args.only_variants,
        absolute: args.absolute,
    };
    let records = variants_from_path(&args.input, &config)?;

    if verbose {
        let called = records.iter().filter(|r| r.called).count();
        eprintln!("Variants: {called} called alleles from {}", args.input.display());
    }

    match format {
        OutputFormat::Json => print_json(&records),
        OutputFormat::Text | OutputFormat::Tsv => print_tsv(
            VariantRecord::TSV_HEADER,
            records.iter().map(|r| r.to_tsv(config.absolute)),
        ),
    }
}
