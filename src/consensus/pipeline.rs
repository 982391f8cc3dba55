//! End-to-end runs from an alignment file to consensus sequences and tables.
//!
//! Configuration is validated before the file is opened. Records are tallied in a
//! single pass; afterwards each contig is resolved on its own with `rayon`, and
//! results are returned in header order.

use std::path::Path;

use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::consensus::realign::{ClipRealigner, RealignPolicy};
use crate::consensus::report::{ContigSummary, ReportAssembler};
use crate::consensus::resolver::{ConsensusDraft, ConsensusResolver, ResolverPolicy};
use crate::core::config::{ConsensusConfig, VariantConfig, WeightsConfig};
use crate::core::tally::ContigTally;
use crate::parsing::alignment::{tally_path, ParseError};
use crate::tables::variants::{VariantCaller, VariantRecord};
use crate::tables::weights::{features_table, weights_table, FeaturesRow, WeightsRow};
use crate::utils::validation::ConfigError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// The resolved consensus of one contig
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigConsensus {
    pub name: String,
    /// Rendered sequence with the case policy applied
    pub sequence: String,
    pub draft: ConsensusDraft,
}

impl ContigConsensus {
    /// FASTA record name
    #[must_use]
    pub fn record_name(&self) -> String {
        format!("{}_cns", self.name)
    }
}

/// Consensus sequences in header order plus their report
#[derive(Debug, Clone)]
pub struct ConsensusResult {
    pub consensuses: Vec<ContigConsensus>,
    pub summaries: Vec<ContigSummary>,
    pub report: String,
}

/// Resolve, optionally realign, trim and summarize every tallied contig
///
/// # Errors
///
/// Returns `ConfigError` if `config` is invalid.
pub fn build_consensus(
    tallies: &[ContigTally],
    config: &ConsensusConfig,
) -> Result<ConsensusResult, ConfigError> {
    config.validate()?;

    let resolver = ConsensusResolver::new(ResolverPolicy {
        min_depth: config.min_depth,
        trim_ends: config.trim_ends,
        uppercase: config.uppercase,
    });
    let realigner = config.realign.then(|| {
        ClipRealigner::new(RealignPolicy {
            min_overlap: config.min_overlap,
            clip_decay_threshold: config.clip_decay_threshold,
        })
    });
    let assembler = ReportAssembler::new(config.min_depth, config.realign);

    let (consensuses, summaries): (Vec<_>, Vec<_>) = tallies
        .par_iter()
        .map(|tally| {
            let draft = resolver.resolve(&tally.table);
            let (draft, gaps) = match &realigner {
                Some(realigner) => {
                    let realignment = realigner.realign(&tally.table, &draft);
                    (realignment.draft, realignment.gaps)
                }
                None => (draft, Vec::new()),
            };
            let draft = resolver.finish(draft);
            let summary = assembler.summarize(&tally.contig, &tally.table, &draft, &gaps);

            info!(
                contig = %tally.contig.name,
                length = summary.consensus_length,
                ns = summary.ambiguous_bases,
                gaps_closed = summary.gaps_closed,
                gaps_unresolved = summary.gaps_unresolved,
                "Resolved consensus"
            );

            let consensus = ContigConsensus {
                name: tally.contig.name.clone(),
                sequence: resolver.render(&draft),
                draft,
            };
            (consensus, summary)
        })
        .unzip();

    let report = assembler.render(&summaries);

    Ok(ConsensusResult {
        consensuses,
        summaries,
        report,
    })
}

/// Build consensus sequences for every contig of a SAM/BAM file
///
/// # Errors
///
/// Returns `PipelineError::Config` before reading anything if `config` is invalid,
/// or `PipelineError::Parse` if the file cannot be read.
pub fn consensus_from_path(
    path: &Path,
    config: &ConsensusConfig,
) -> Result<ConsensusResult, PipelineError> {
    config.validate()?;
    let tallies = tally_path(path)?;
    Ok(build_consensus(&tallies, config)?)
}

/// Per-site weights table for a SAM/BAM file
///
/// # Errors
///
/// Returns `PipelineError::Parse` if the file cannot be read.
pub fn weights_from_path(path: &Path, config: WeightsConfig) -> Result<Vec<WeightsRow>, PipelineError> {
    let tallies = tally_path(path)?;
    Ok(weights_table(&tallies, config))
}

/// Per-site features table for a SAM/BAM file
///
/// # Errors
///
/// Returns `PipelineError::Parse` if the file cannot be read.
pub fn features_from_path(path: &Path) -> Result<Vec<FeaturesRow>, PipelineError> {
    let tallies = tally_path(path)?;
    Ok(features_table(&tallies))
}

/// Called variants for a SAM/BAM file
///
/// # Errors
///
/// Returns `PipelineError::Config` before reading anything if `config` is invalid,
/// or `PipelineError::Parse` if the file cannot be read.
pub fn variants_from_path(
    path: &Path,
    config: &VariantConfig,
) -> Result<Vec<VariantRecord>, PipelineError> {
    config.validate()?;
    let tallies = tally_path(path)?;
    Ok(VariantCaller::new(config.clone()).call_all(&tallies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{AlignedRecord, ReferenceContig};
    use crate::core::tally::tally_records;

    fn tallies() -> Vec<ContigTally> {
        let contigs = vec![ReferenceContig::new("a", 6), ReferenceContig::new("b", 4)];
        let records: Vec<Result<AlignedRecord, std::convert::Infallible>> = vec![
            Ok(AlignedRecord::from_cigar(0, 0, "6M", "ACGTAC").unwrap()),
            Ok(AlignedRecord::from_cigar(0, 0, "6M", "ACGTAC").unwrap()),
            Ok(AlignedRecord::from_cigar(1, 1, "3M", "GGA").unwrap()),
            Ok(AlignedRecord::from_cigar(1, 1, "3M", "GGA").unwrap()),
        ];
        tally_records(&contigs, records).unwrap()
    }

    #[test]
    fn test_build_consensus_keeps_header_order() {
        let result = build_consensus(&tallies(), &ConsensusConfig::default()).unwrap();
        let names: Vec<&str> = result.consensuses.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(result.consensuses[0].sequence, "ACGTAC");
        assert_eq!(result.consensuses[1].sequence, "NGGA");
        assert_eq!(result.consensuses[1].record_name(), "b_cns");
        assert_eq!(result.summaries[1].ambiguous_bases, 1);
        assert!(result.report.contains("MD5"));
    }

    #[test]
    fn test_trim_ends_applies_after_resolution() {
        let config = ConsensusConfig {
            trim_ends: true,
            realign: true,
            ..ConsensusConfig::default()
        };
        let result = build_consensus(&tallies(), &config).unwrap();
        assert_eq!(result.consensuses[1].sequence, "GGA");
    }

    #[test]
    fn test_invalid_config_fails_before_reading() {
        let config = ConsensusConfig {
            clip_decay_threshold: 2.0,
            ..ConsensusConfig::default()
        };
        let result = consensus_from_path(Path::new("/nonexistent/reads.sam"), &config);
        assert!(matches!(result, Err(PipelineError::Config(_))));

        let variants = VariantConfig {
            rel_threshold: 1.5,
            ..VariantConfig::default()
        };
        let result = variants_from_path(Path::new("/nonexistent/reads.sam"), &variants);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_a_parse_error() {
        let result = features_from_path(Path::new("/nonexistent/reads.sam"));
        assert!(matches!(result, Err(PipelineError::Parse(ParseError::Io(_)))));
    }
}
