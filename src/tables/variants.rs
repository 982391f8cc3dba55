//! Threshold-based allele calling over a tally table.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::core::config::VariantConfig;
use crate::core::site::{Nucleotide, ReferenceSite};
use crate::core::tally::{ContigTally, SiteTallyTable};
use crate::tables::weights::Weight;

/// Value printed in place of an allele or frequency on uncalled rows
pub const NA_VALUE: &str = "0";

/// An alternative to the majority base at a site
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Allele {
    Base(Nucleotide),
    /// The site is deleted in the read
    Deletion,
    /// Bases inserted after the site
    Insertion(Vec<u8>),
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base(n) => write!(f, "{n}"),
            Self::Deletion => f.write_str("-"),
            Self::Insertion(bases) => write!(f, "+{}", String::from_utf8_lossy(bases)),
        }
    }
}

impl Serialize for Allele {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One (site, allele) pair, or an uncalled site
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantRecord {
    pub contig: String,
    /// 0-based reference site
    #[serde(rename = "pos", serialize_with = "one_based")]
    pub site: usize,
    #[serde(rename = "ref")]
    pub reference: Nucleotide,
    #[serde(rename = "alt")]
    pub allele: Option<Allele>,
    pub count: u32,
    pub frequency: f64,
    pub depth: u32,
    pub called: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn one_based<S: Serializer>(site: &usize, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64((*site as u64) + 1)
}

impl VariantRecord {
    /// The reported value: count or frequency
    #[must_use]
    pub fn value(&self, absolute: bool) -> Weight {
        if absolute {
            Weight::Count(self.count)
        } else {
            Weight::Frequency(self.frequency)
        }
    }

    pub const TSV_HEADER: &'static str = "contig\tpos\tref\talt\tvalue\tdepth";

    #[must_use]
    pub fn to_tsv(&self, absolute: bool) -> String {
        let (alt, value) = match (&self.allele, self.called) {
            (Some(allele), true) => (allele.to_string(), self.value(absolute).to_string()),
            _ => (NA_VALUE.to_string(), NA_VALUE.to_string()),
        };
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.contig,
            self.site + 1,
            self.reference,
            alt,
            value,
            self.depth
        )
    }
}

/// Calls alleles whose support passes both absolute and relative thresholds
#[derive(Debug, Clone)]
pub struct VariantCaller {
    config: VariantConfig,
}

impl VariantCaller {
    #[must_use]
    pub fn new(config: VariantConfig) -> Self {
        Self { config }
    }

    fn passes(&self, site: &ReferenceSite, count: u32) -> bool {
        count > 0
            && count >= self.config.abs_threshold
            && site.frequency(count) >= self.config.rel_threshold
    }

    /// Candidate alleles at a site with their counts, in a fixed order
    fn candidates(site: &ReferenceSite, reference: Nucleotide) -> Vec<(Allele, u32)> {
        let mut alleles: Vec<(Allele, u32)> = Nucleotide::ALL
            .iter()
            .filter(|&&n| n != reference)
            .map(|&n| (Allele::Base(n), site.count(n)))
            .collect();
        if site.deletion_count > 0 {
            alleles.push((Allele::Deletion, site.deletion_count));
        }
        for (bases, &count) in &site.insertion_counts {
            alleles.push((Allele::Insertion(bases.clone()), count));
        }
        alleles
    }

    /// Call every site of one contig
    #[must_use]
    pub fn call(&self, contig: &str, table: &SiteTallyTable) -> Vec<VariantRecord> {
        let mut records = Vec::new();

        for (position, site) in table.sites().iter().enumerate() {
            let reference = site.majority_base().unwrap_or(Nucleotide::N);
            let before = records.len();

            for (allele, count) in Self::candidates(site, reference) {
                if self.passes(site, count) {
                    records.push(VariantRecord {
                        contig: contig.to_string(),
                        site: position,
                        reference,
                        allele: Some(allele),
                        count,
                        frequency: site.frequency(count),
                        depth: site.total_depth,
                        called: true,
                    });
                }
            }

            if records.len() == before && !self.config.only_variants {
                records.push(VariantRecord {
                    contig: contig.to_string(),
                    site: position,
                    reference,
                    allele: None,
                    count: 0,
                    frequency: 0.0,
                    depth: site.total_depth,
                    called: false,
                });
            }
        }

        records
    }

    /// Call every contig in header order
    #[must_use]
    pub fn call_all(&self, tallies: &[ContigTally]) -> Vec<VariantRecord> {
        tallies
            .iter()
            .flat_map(|t| self.call(&t.contig.name, &t.table))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::AlignedRecord;
    use crate::core::tally::SiteTallyBuilder;

    fn table(records: &[(usize, &str, &str)], length: usize) -> SiteTallyTable {
        let mut builder = SiteTallyBuilder::new(length);
        for &(start, cigar, seq) in records {
            builder
                .add_record(&AlignedRecord::from_cigar(0, start, cigar, seq).unwrap())
                .unwrap();
        }
        builder.finish()
    }

    /// One site with 95 A and 5 C
    fn mixed_site() -> SiteTallyTable {
        let mut records = vec![(0, "1M", "A"); 95];
        records.extend(vec![(0, "1M", "C"); 5]);
        table(&records, 1)
    }

    fn caller(rel_threshold: f64, only_variants: bool) -> VariantCaller {
        VariantCaller::new(VariantConfig {
            rel_threshold,
            only_variants,
            ..VariantConfig::default()
        })
    }

    #[test]
    fn test_minor_allele_called_at_low_threshold() {
        let records = caller(0.01, true).call("chr1", &mixed_site());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reference, Nucleotide::A);
        assert_eq!(records[0].allele, Some(Allele::Base(Nucleotide::C)));
        assert_eq!(records[0].count, 5);
        assert!((records[0].frequency - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_minor_allele_not_called_at_high_threshold() {
        let records = caller(0.10, true).call("chr1", &mixed_site());
        assert!(records.is_empty());

        let all = caller(0.10, false).call("chr1", &mixed_site());
        assert_eq!(all.len(), 1);
        assert!(!all[0].called);
        assert_eq!(all[0].to_tsv(false), "chr1\t1\tA\t0\t0\t100");
    }

    #[test]
    fn test_absolute_threshold() {
        let strict = VariantCaller::new(VariantConfig {
            abs_threshold: 6,
            only_variants: true,
            ..VariantConfig::default()
        });
        assert!(strict.call("chr1", &mixed_site()).is_empty());
    }

    #[test]
    fn test_indel_alleles() {
        let table = table(
            &[
                (0, "1M1I1M", "ATC"),
                (0, "1M1I1M", "ATC"),
                (0, "1M1D1M", "AC"),
                (0, "3M", "AGC"),
            ],
            3,
        );
        let records = caller(0.01, true).call("chr1", &table);
        let alleles: Vec<String> = records
            .iter()
            .map(|r| r.allele.as_ref().unwrap().to_string())
            .collect();
        // Site 0: A4 plus insertion T in two reads. Site 1: C2 G1 and one deletion.
        assert_eq!(alleles, vec!["+T", "G", "-"]);
        assert_eq!(records[0].site, 0);
        assert_eq!(records[0].count, 2);
        assert_eq!(records[2].site, 1);
        assert_eq!(records[2].to_tsv(true), "chr1\t2\tC\t-\t1\t4");
    }

    #[test]
    fn test_only_variants_is_subset() {
        let table = table(
            &[(0, "4M", "ACGT"), (0, "4M", "ACGA"), (0, "4M", "TCGA")],
            4,
        );
        let all = caller(0.01, false).call("chr1", &table);
        let variants = caller(0.01, true).call("chr1", &table);

        assert!(variants.len() < all.len());
        for record in &variants {
            assert!(all.contains(record));
        }
        // One row per uncalled site, at least one row per site
        let sites: std::collections::BTreeSet<usize> = all.iter().map(|r| r.site).collect();
        assert_eq!(sites.len(), 4);
    }

    #[test]
    fn test_json_uses_one_based_positions() {
        let records = caller(0.01, true).call("chr1", &mixed_site());
        let value = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(value["pos"], 1);
        assert_eq!(value["ref"], "A");
        assert_eq!(value["alt"], "C");
    }
}
