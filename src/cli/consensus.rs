//! Consensus command - infer one consensus sequence per reference contig.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use crate::cli::OutputFormat;
use crate::consensus::pipeline::{consensus_from_path, ConsensusResult};
use crate::consensus::report::ReportAssembler;
use crate::core::config::{
    ConsensusConfig, DEFAULT_CLIP_DECAY_THRESHOLD, DEFAULT_MIN_DEPTH, DEFAULT_MIN_OVERLAP,
};
use crate::parsing::fasta::write_consensuses;

/// Arguments for the consensus command
#[derive(Args)]
pub struct ConsensusArgs {
    /// Input alignment (SAM or BAM)
    #[arg(required = true)]
    pub input: PathBuf,

    /// Attempt to reconstruct sequence around soft-clip boundaries
    #[arg(long)]
    pub realign: bool,

    /// Substitute Ns at coverage depths beneath this value
    #[arg(long, default_value_t = DEFAULT_MIN_DEPTH)]
    pub min_depth: u32,

    /// Match length required to close soft-clipped gaps
    #[arg(long, default_value_t = DEFAULT_MIN_OVERLAP)]
    pub min_overlap: usize,

    /// Read depth fraction at which to cease clip extension (0.0-1.0)
    #[arg(long, default_value_t = DEFAULT_CLIP_DECAY_THRESHOLD)]
    pub clip_decay_threshold: f64,

    /// Trim ambiguous nucleotides (Ns) from sequence ends
    #[arg(long)]
    pub trim_ends: bool,

    /// Close gaps using the uppercase alphabet
    #[arg(long)]
    pub uppercase: bool,

    /// Write FASTA here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the report here instead of stderr
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl From<&ConsensusArgs> for ConsensusConfig {
    fn from(args: &ConsensusArgs) -> Self {
        Self {
            realign: args.realign,
            min_depth: args.min_depth,
            min_overlap: args.min_overlap,
            clip_decay_threshold: args.clip_decay_threshold,
            trim_ends: args.trim_ends,
            uppercase: args.uppercase,
        }
    }
}

/// Execute the consensus command
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the input cannot be read,
/// or the output cannot be written.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: ConsensusArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = ConsensusConfig::from(&args);

    if verbose {
        eprintln!(
            "Consensus: min depth {}, realign {}, min overlap {}, clip decay {}",
            config.min_depth, config.realign, config.min_overlap, config.clip_decay_threshold
        );
    }

    let result = consensus_from_path(&args.input, &config)
        .with_context(|| format!("Failed to build consensus from {}", args.input.display()))?;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_consensuses(&mut writer, &result.consensuses)?;
            writer.flush()?;
        }
        None => {
            let mut writer = BufWriter::new(io::stdout().lock());
            write_consensuses(&mut writer, &result.consensuses)?;
            writer.flush()?;
        }
    }

    let report = render_report(&result, &config, format)?;
    match &args.report {
        Some(path) => std::fs::write(path, report)
            .with_context(|| format!("Failed to write report to {}", path.display()))?,
        None => eprint!("{report}"),
    }

    Ok(())
}

fn render_report(
    result: &ConsensusResult,
    config: &ConsensusConfig,
    format: OutputFormat,
) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Text => result.report.clone(),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&result.summaries)?;
            json.push('\n');
            json
        }
        OutputFormat::Tsv => {
            ReportAssembler::new(config.min_depth, config.realign).render_tsv(&result.summaries)
        }
    })
}
