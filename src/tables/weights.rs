//! Per-site weights and features tables.
//!
//! The weights table lists nucleotide counts (or frequencies) and depth for every
//! reference site, optionally with the majority base, a 95% Wilson score interval
//! on its frequency and the Shannon entropy of the ACGT distribution. The features
//! table adds indel and soft-clip counts.

use std::fmt;

use serde::Serialize;

use crate::core::config::WeightsConfig;
use crate::core::site::{Nucleotide, ReferenceSite};
use crate::core::tally::ContigTally;

/// z for a two-sided 95% interval
const WILSON_Z: f64 = 1.96;

/// A table cell holding either a raw count or a relative frequency
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Weight {
    Count(u32),
    Frequency(f64),
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(count) => write!(f, "{count}"),
            Self::Frequency(freq) => write!(f, "{freq}"),
        }
    }
}

/// Majority base and the uncertainty around it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Confidence {
    pub consensus: Nucleotide,
    pub lower_ci: f64,
    pub upper_ci: f64,
    pub shannon: f64,
}

impl Confidence {
    #[must_use]
    pub fn for_site(site: &ReferenceSite) -> Self {
        let consensus = site.majority_base().unwrap_or(Nucleotide::N);
        let support = if consensus == Nucleotide::N {
            0
        } else {
            site.count(consensus)
        };
        let (lower_ci, upper_ci) = wilson_interval(support, site.total_depth);
        let acgt: Vec<u32> = Nucleotide::ACGT.iter().map(|&n| site.count(n)).collect();

        Self {
            consensus,
            lower_ci,
            upper_ci,
            shannon: shannon_entropy(&acgt),
        }
    }
}

/// One row of the weights table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightsRow {
    pub contig: String,
    /// 1-based reference position
    pub pos: usize,
    #[serde(rename = "A")]
    pub a: Weight,
    #[serde(rename = "C")]
    pub c: Weight,
    #[serde(rename = "G")]
    pub g: Weight,
    #[serde(rename = "T")]
    pub t: Weight,
    #[serde(rename = "N")]
    pub n: Weight,
    pub depth: u32,
    #[serde(flatten)]
    pub confidence: Option<Confidence>,
}

impl WeightsRow {
    #[must_use]
    pub fn tsv_header(with_confidence: bool) -> String {
        let mut header = String::from("contig\tpos\tA\tC\tG\tT\tN\tdepth");
        if with_confidence {
            header.push_str("\tconsensus\tlower_ci\tupper_ci\tshannon");
        }
        header
    }

    #[must_use]
    pub fn to_tsv(&self) -> String {
        let mut line = format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.contig, self.pos, self.a, self.c, self.g, self.t, self.n, self.depth
        );
        if let Some(conf) = &self.confidence {
            line.push_str(&format!(
                "\t{}\t{}\t{}\t{}",
                conf.consensus, conf.lower_ci, conf.upper_ci, conf.shannon
            ));
        }
        line
    }
}

/// One row of the features table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeaturesRow {
    pub contig: String,
    pub pos: usize,
    #[serde(rename = "A")]
    pub a: u32,
    #[serde(rename = "C")]
    pub c: u32,
    #[serde(rename = "G")]
    pub g: u32,
    #[serde(rename = "T")]
    pub t: u32,
    #[serde(rename = "N")]
    pub n: u32,
    pub depth: u32,
    pub insertions: u32,
    pub deletions: u32,
    pub clip_starts: u32,
    pub clip_ends: u32,
}

impl FeaturesRow {
    pub const TSV_HEADER: &'static str =
        "contig\tpos\tA\tC\tG\tT\tN\tdepth\tinsertions\tdeletions\tclip_starts\tclip_ends";

    #[must_use]
    pub fn to_tsv(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.contig,
            self.pos,
            self.a,
            self.c,
            self.g,
            self.t,
            self.n,
            self.depth,
            self.insertions,
            self.deletions,
            self.clip_starts,
            self.clip_ends
        )
    }
}

/// Weights rows for every site of every contig, in header and position order
#[must_use]
pub fn weights_table(tallies: &[ContigTally], config: WeightsConfig) -> Vec<WeightsRow> {
    tallies
        .iter()
        .flat_map(|tally| {
            tally
                .table
                .sites()
                .iter()
                .enumerate()
                .map(move |(i, site)| {
                    let weight = |n: Nucleotide| {
                        if config.relative {
                            Weight::Frequency(site.frequency(site.count(n)))
                        } else {
                            Weight::Count(site.count(n))
                        }
                    };
                    WeightsRow {
                        contig: tally.contig.name.clone(),
                        pos: i + 1,
                        a: weight(Nucleotide::A),
                        c: weight(Nucleotide::C),
                        g: weight(Nucleotide::G),
                        t: weight(Nucleotide::T),
                        n: weight(Nucleotide::N),
                        depth: site.total_depth,
                        confidence: (!config.no_confidence).then(|| Confidence::for_site(site)),
                    }
                })
        })
        .collect()
}

/// Features rows for every site of every contig
#[must_use]
pub fn features_table(tallies: &[ContigTally]) -> Vec<FeaturesRow> {
    tallies
        .iter()
        .flat_map(|tally| {
            tally
                .table
                .sites()
                .iter()
                .enumerate()
                .map(move |(i, site)| FeaturesRow {
                    contig: tally.contig.name.clone(),
                    pos: i + 1,
                    a: site.count(Nucleotide::A),
                    c: site.count(Nucleotide::C),
                    g: site.count(Nucleotide::G),
                    t: site.count(Nucleotide::T),
                    n: site.count(Nucleotide::N),
                    depth: site.total_depth,
                    insertions: site.insertion_total(),
                    deletions: site.deletion_count,
                    clip_starts: site.soft_clip_start_count,
                    clip_ends: site.soft_clip_end_count,
                })
        })
        .collect()
}

/// 95% Wilson score interval for `successes` out of `trials`; `(0, 0)` with no trials
#[must_use]
pub fn wilson_interval(successes: u32, trials: u32) -> (f64, f64) {
    if trials == 0 {
        return (0.0, 0.0);
    }
    let n = f64::from(trials);
    let p = f64::from(successes) / n;
    let z2 = WILSON_Z * WILSON_Z;

    let denominator = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denominator;
    let half_width = WILSON_Z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denominator;

    ((center - half_width).max(0.0), (center + half_width).min(1.0))
}

/// Shannon entropy in bits; zero for an empty distribution
#[must_use]
pub fn shannon_entropy(counts: &[u32]) -> f64 {
    let total: u32 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = f64::from(total);
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = f64::from(c) / total;
            -p * p.log2()
        })
        .sum()
}
