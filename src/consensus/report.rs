//! Per-contig consensus statistics and their text rendering.

use std::fmt::Write as _;

use serde::Serialize;

use crate::consensus::realign::GapOutcome;
use crate::consensus::resolver::ConsensusDraft;
use crate::core::record::ReferenceContig;
use crate::core::tally::{SiteTallyTable, TallyStats};
use crate::utils::validation::count_to_f64;

/// Depth distribution over the reference sites of one contig
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DepthStats {
    pub min: u32,
    pub max: u32,
    pub mean: f64,
    pub median: f64,
    /// Fraction of sites with depth at or above the resolver's minimum
    pub sufficient_fraction: f64,
}

impl DepthStats {
    /// Compute depth statistics for `table`; all zero for an empty contig
    #[must_use]
    pub fn from_table(table: &SiteTallyTable, min_depth: u32) -> Self {
        let mut depths: Vec<u32> = table.sites().iter().map(|s| s.total_depth).collect();
        if depths.is_empty() {
            return Self::default();
        }
        depths.sort_unstable();

        let n = depths.len();
        let sum: u64 = depths.iter().map(|&d| u64::from(d)).sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = sum as f64 / count_to_f64(n);
        let median = if n % 2 == 0 {
            (f64::from(depths[n / 2 - 1]) + f64::from(depths[n / 2])) / 2.0
        } else {
            f64::from(depths[n / 2])
        };
        let sufficient = depths.iter().filter(|&&d| d >= min_depth).count();

        Self {
            min: depths[0],
            max: depths[n - 1],
            mean,
            median,
            sufficient_fraction: count_to_f64(sufficient) / count_to_f64(n),
        }
    }
}

/// Everything reported about one contig's consensus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContigSummary {
    pub name: String,
    pub reference_length: usize,
    pub consensus_length: usize,
    pub depth: DepthStats,
    pub ambiguous_bases: usize,
    pub reconstructed_bases: usize,
    pub gaps_closed: usize,
    pub gaps_unresolved: usize,
    pub records: TallyStats,
    /// MD5 of the uppercase consensus
    pub md5: String,
    pub gaps: Vec<GapOutcome>,
}

/// Builds [`ContigSummary`] values and renders them for humans
#[derive(Debug, Clone, Copy)]
pub struct ReportAssembler {
    min_depth: u32,
    realign: bool,
}

impl ReportAssembler {
    #[must_use]
    pub fn new(min_depth: u32, realign: bool) -> Self {
        Self { min_depth, realign }
    }

    #[must_use]
    pub fn summarize(
        &self,
        contig: &ReferenceContig,
        table: &SiteTallyTable,
        draft: &ConsensusDraft,
        gaps: &[GapOutcome],
    ) -> ContigSummary {
        let gaps_closed = gaps.iter().filter(|g| g.closed).count();

        ContigSummary {
            name: contig.name.clone(),
            reference_length: contig.length,
            consensus_length: draft.len(),
            depth: DepthStats::from_table(table, self.min_depth),
            ambiguous_bases: draft.ambiguous_count(),
            reconstructed_bases: draft.reconstructed_count(),
            gaps_closed,
            gaps_unresolved: gaps.len() - gaps_closed,
            records: table.stats(),
            md5: format!("{:x}", md5::compute(draft.bases())),
            gaps: gaps.to_vec(),
        }
    }

    /// Render summaries as a text block, one section per contig
    #[must_use]
    pub fn render(&self, summaries: &[ContigSummary]) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "Consensus report (min depth {})", self.min_depth);
        let _ = writeln!(out, "{}", "=".repeat(60));

        for summary in summaries {
            let _ = writeln!(out, "\n{}", summary.name);
            let _ = writeln!(
                out,
                "   Length: {} reference, {} consensus",
                summary.reference_length, summary.consensus_length
            );
            let _ = writeln!(
                out,
                "   Depth: min {}, max {}, mean {:.2}, median {:.1}",
                summary.depth.min, summary.depth.max, summary.depth.mean, summary.depth.median
            );
            let _ = writeln!(
                out,
                "   Sites at min depth: {:.1}%",
                summary.depth.sufficient_fraction * 100.0
            );
            let _ = writeln!(out, "   Ns: {}", summary.ambiguous_bases);
            if self.realign {
                let _ = writeln!(
                    out,
                    "   Gaps: {} closed, {} unresolved ({} bases reconstructed)",
                    summary.gaps_closed, summary.gaps_unresolved, summary.reconstructed_bases
                );
            }
            let _ = writeln!(
                out,
                "   Records: {} tallied, {} ignored, {} rejected",
                summary.records.tallied, summary.records.ignored, summary.records.rejected
            );
            let _ = writeln!(out, "   MD5: {}", summary.md5);
        }

        out
    }

    /// Render summaries as TSV with a header row
    #[must_use]
    pub fn render_tsv(&self, summaries: &[ContigSummary]) -> String {
        let mut out = String::from(
            "contig\treference_length\tconsensus_length\tmin_depth\tmax_depth\tmean_depth\tmedian_depth\tsufficient_fraction\tns\tgaps_closed\tgaps_unresolved\ttallied\tignored\trejected\tmd5\n",
        );
        for s in summaries {
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{:.4}\t{:.1}\t{:.4}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                s.name,
                s.reference_length,
                s.consensus_length,
                s.depth.min,
                s.depth.max,
                s.depth.mean,
                s.depth.median,
                s.depth.sufficient_fraction,
                s.ambiguous_bases,
                s.gaps_closed,
                s.gaps_unresolved,
                s.records.tallied,
                s.records.ignored,
                s.records.rejected,
                s.md5,
            );
        }
        out
    }
}
