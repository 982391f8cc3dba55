//! Command-line interface for clip-consensus.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **consensus**: Infer consensus sequence(s) from a SAM/BAM alignment
//! - **weights**: Per-site nucleotide frequencies and depth
//! - **features**: Per-site frequencies plus indel and soft-clip counts
//! - **variants**: Alleles passing absolute and relative frequency thresholds
//!
//! ## Usage
//!
//! ```text
//! # Consensus FASTA on stdout, report on stderr
//! clip-consensus consensus sample.bam > sample.cns.fa
//!
//! # Close gaps around soft-clipped regions
//! clip-consensus consensus sample.bam --realign --min-overlap 9
//!
//! # Relative frequencies without confidence columns
//! clip-consensus weights sample.bam --relative --no-confidence
//!
//! # Variants as JSON
//! clip-consensus variants sample.bam --only-variants --format json
//! ```

use std::io::{self, Write};

use clap::{Parser, Subcommand};
use serde::Serialize;

pub mod consensus;
pub mod features;
pub mod variants;
pub mod weights;

#[derive(Parser)]
#[command(name = "clip-consensus")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Infer consensus sequences, weights and variants from SAM/BAM alignments")]
#[command(
    long_about = "clip-consensus builds a consensus sequence for every reference contig of a SAM/BAM file.\n\nEach reference site is resolved by majority vote over the aligned reads, with Ns where coverage is too low. With --realign, soft-clipped read tails are used to reconstruct sequence across gaps the reference does not represent."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Infer consensus sequence(s) from an alignment in SAM/BAM format
    Consensus(consensus::ConsensusArgs),

    /// Table of per-site nucleotide frequencies and coverage
    Weights(weights::WeightsArgs),

    /// Table of per-site nucleotide frequencies and coverage including indels and clips
    Features(features::FeaturesArgs),

    /// Variants exceeding absolute and relative frequency thresholds
    Variants(variants::VariantsArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

/// Print `rows` to stdout as a JSON array
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub(crate) fn print_json<T: Serialize>(rows: &T) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, rows)?;
    writeln!(out)?;
    Ok(())
}

/// Print a header line and one line per row to stdout
///
/// # Errors
///
/// Returns an error if writing fails.
pub(crate) fn print_tsv<I>(header: &str, lines: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = String>,
{
    let mut out = io::BufWriter::new(io::stdout().lock());
    writeln!(out, "{header}")?;
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}
