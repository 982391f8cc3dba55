//! Per-site evidence tables built from aligned records.
//!
//! A [`SiteTallyTable`] is a contiguous arena of [`ReferenceSite`]s, one per
//! reference coordinate, plus the soft-clipped reads recorded at each clip
//! boundary. Tables are built by a [`SiteTallyBuilder`] in a single forward pass
//! over the records of one contig; [`ContigTallies`] routes records from a
//! whole file to one builder per contig.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::record::{AlignedRecord, OpKind, ReferenceContig};
use crate::core::site::ReferenceSite;

/// Reasons a record is excluded from the tally
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("Alignment spans [{start}, {end}) outside reference of length {length}")]
    OutOfBounds {
        start: usize,
        end: usize,
        length: usize,
    },

    #[error("Operations consume {expected} read bases but the sequence has {actual}")]
    SequenceLengthMismatch { expected: usize, actual: usize },

    #[error("Record refers to unknown contig index {0}")]
    UnknownContig(usize),
}

/// What happened to a record offered to a builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Tallied,
    /// No read base was placed against the reference
    Ignored,
}

/// A read recorded at a soft-clip boundary.
///
/// For a start clip the aligned bases follow the first `clip_len` bases; for an
/// end clip they precede the last `clip_len` bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClippedRead {
    pub bases: Vec<u8>,
    pub clip_len: usize,
}

impl ClippedRead {
    pub fn new(bases: impl Into<Vec<u8>>, clip_len: usize) -> Self {
        Self {
            bases: bases.into(),
            clip_len,
        }
    }
}

/// Record counts seen by a builder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TallyStats {
    pub tallied: usize,
    pub ignored: usize,
    pub rejected: usize,
}

/// Position-indexed evidence for one reference contig
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteTallyTable {
    sites: Vec<ReferenceSite>,
    start_clips: BTreeMap<usize, Vec<ClippedRead>>,
    end_clips: BTreeMap<usize, Vec<ClippedRead>>,
    stats: TallyStats,
}

impl SiteTallyTable {
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    #[must_use]
    pub fn site(&self, position: usize) -> Option<&ReferenceSite> {
        self.sites.get(position)
    }

    #[must_use]
    pub fn sites(&self) -> &[ReferenceSite] {
        &self.sites
    }

    /// Reads soft clipped before their alignment start at `position`
    #[must_use]
    pub fn start_clips_at(&self, position: usize) -> &[ClippedRead] {
        self.start_clips.get(&position).map_or(&[], Vec::as_slice)
    }

    /// Reads soft clipped after their alignment end at `position`
    #[must_use]
    pub fn end_clips_at(&self, position: usize) -> &[ClippedRead] {
        self.end_clips.get(&position).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn stats(&self) -> TallyStats {
        self.stats
    }
}

/// Accumulates records for one contig into a [`SiteTallyTable`]
#[derive(Debug, Clone)]
pub struct SiteTallyBuilder {
    table: SiteTallyTable,
}

impl SiteTallyBuilder {
    #[must_use]
    pub fn new(length: usize) -> Self {
        Self {
            table: SiteTallyTable {
                sites: vec![ReferenceSite::default(); length],
                ..SiteTallyTable::default()
            },
        }
    }

    /// Add one record's evidence.
    ///
    /// The record is validated in full before any site is touched, so a rejected
    /// record leaves no partial counts behind.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if the operations reach outside the reference or
    /// disagree with the read sequence length. The builder stays usable.
    pub fn add_record(&mut self, record: &AlignedRecord) -> Result<RecordOutcome, MalformedRecord> {
        if let Err(e) = self.validate(record) {
            self.table.stats.rejected += 1;
            return Err(e);
        }

        if !record.has_aligned_bases() {
            self.table.stats.ignored += 1;
            return Ok(RecordOutcome::Ignored);
        }

        self.tally(record);
        self.table.stats.tallied += 1;
        Ok(RecordOutcome::Tallied)
    }

    fn validate(&self, record: &AlignedRecord) -> Result<(), MalformedRecord> {
        let expected = record.read_span();
        if expected != record.sequence.len() {
            return Err(MalformedRecord::SequenceLengthMismatch {
                expected,
                actual: record.sequence.len(),
            });
        }

        let length = self.table.sites.len();
        let end = record.start.saturating_add(record.reference_span());
        if record.start >= length || end > length {
            return Err(MalformedRecord::OutOfBounds {
                start: record.start,
                end,
                length,
            });
        }

        // An insertion is attributed to the site before it
        let mut ref_pos = record.start;
        for op in &record.ops {
            if op.kind == OpKind::Insertion && op.len > 0 && ref_pos == 0 {
                return Err(MalformedRecord::OutOfBounds {
                    start: record.start,
                    end,
                    length,
                });
            }
            if op.kind.consumes_reference() {
                ref_pos += op.len;
            }
        }

        Ok(())
    }

    fn tally(&mut self, record: &AlignedRecord) {
        let sequence = &record.sequence;
        let sites = &mut self.table.sites;
        let mut ref_pos = record.start;
        let mut read_pos = 0;

        for op in &record.ops {
            let len = op.len;
            match op.kind {
                OpKind::Match => {
                    for (site, &base) in sites[ref_pos..ref_pos + len]
                        .iter_mut()
                        .zip(&sequence[read_pos..read_pos + len])
                    {
                        site.add_base(base);
                    }
                    ref_pos += len;
                    read_pos += len;
                }
                OpKind::Insertion => {
                    if len > 0 {
                        sites[ref_pos - 1].add_insertion(&sequence[read_pos..read_pos + len]);
                    }
                    read_pos += len;
                }
                OpKind::Deletion => {
                    for site in &mut sites[ref_pos..ref_pos + len] {
                        site.add_deletion();
                    }
                    ref_pos += len;
                }
                OpKind::Skip => ref_pos += len,
                OpKind::SoftClip => read_pos += len,
                OpKind::HardClip | OpKind::Pad => {}
            }
        }

        let leading = record.leading_soft_clip();
        if leading > 0 {
            sites[record.start].soft_clip_start_count += 1;
            self.table
                .start_clips
                .entry(record.start)
                .or_default()
                .push(ClippedRead::new(sequence.clone(), leading));
        }

        let trailing = record.trailing_soft_clip();
        if trailing > 0 {
            let end_site = ref_pos - 1;
            sites[end_site].soft_clip_end_count += 1;
            self.table
                .end_clips
                .entry(end_site)
                .or_default()
                .push(ClippedRead::new(sequence.clone(), trailing));
        }
    }

    #[must_use]
    pub fn finish(self) -> SiteTallyTable {
        self.table
    }
}

/// A finished table together with the contig it describes
#[derive(Debug, Clone)]
pub struct ContigTally {
    pub contig: ReferenceContig,
    pub table: SiteTallyTable,
}

/// Routes records of a whole alignment file to one builder per contig
#[derive(Debug)]
pub struct ContigTallies {
    contigs: Vec<ReferenceContig>,
    builders: Vec<SiteTallyBuilder>,
    unplaced: usize,
}

impl ContigTallies {
    #[must_use]
    pub fn new(contigs: &[ReferenceContig]) -> Self {
        Self {
            contigs: contigs.to_vec(),
            builders: contigs
                .iter()
                .map(|c| SiteTallyBuilder::new(c.length))
                .collect(),
            unplaced: 0,
        }
    }

    /// Add a record to its contig's builder, logging and excluding malformed ones
    pub fn add_record(&mut self, record: &AlignedRecord) -> Result<RecordOutcome, MalformedRecord> {
        let Some(builder) = self.builders.get_mut(record.contig) else {
            self.unplaced += 1;
            let e = MalformedRecord::UnknownContig(record.contig);
            warn!(contig = record.contig, error = %e, "Excluding record");
            return Err(e);
        };

        builder.add_record(record).inspect_err(|e| {
            warn!(
                contig = %self.contigs[record.contig].name,
                start = record.start,
                error = %e,
                "Excluding malformed record"
            );
        })
    }

    #[must_use]
    pub fn finish(self) -> Vec<ContigTally> {
        if self.unplaced > 0 {
            warn!(count = self.unplaced, "Records on unknown contigs were excluded");
        }

        self.contigs
            .into_iter()
            .zip(self.builders)
            .map(|(contig, builder)| {
                let table = builder.finish();
                debug!(
                    contig = %contig.name,
                    tallied = table.stats.tallied,
                    ignored = table.stats.ignored,
                    rejected = table.stats.rejected,
                    "Finished tally"
                );
                ContigTally { contig, table }
            })
            .collect()
    }
}

/// Tally a stream of records against the given contigs in one pass.
///
/// Malformed records are excluded; errors from the stream itself abort.
///
/// # Errors
///
/// Returns the first error yielded by `records`.
pub fn tally_records<I, E>(contigs: &[ReferenceContig], records: I) -> Result<Vec<ContigTally>, E>
where
    I: IntoIterator<Item = Result<AlignedRecord, E>>,
{
    let mut tallies = ContigTallies::new(contigs);
    for result in records {
        let record = result?;
        // Malformed records are logged by the router and skipped
        let _ = tallies.add_record(&record);
    }
    Ok(tallies.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::site::Nucleotide;

    fn record(start: usize, cigar: &str, sequence: &str) -> AlignedRecord {
        AlignedRecord::from_cigar(0, start, cigar, sequence).unwrap()
    }

    fn build(length: usize, records: &[AlignedRecord]) -> SiteTallyTable {
        let mut builder = SiteTallyBuilder::new(length);
        for r in records {
            let _ = builder.add_record(r);
        }
        builder.finish()
    }

    #[test]
    fn test_table_length_matches_reference() {
        let table = build(25, &[]);
        assert_eq!(table.len(), 25);
        assert!(table.sites().iter().all(|s| s.total_depth == 0));
    }

    #[test]
    fn test_matches_increment_counts_and_depth() {
        let table = build(10, &[record(2, "4M", "ACGT"), record(3, "2M", "CA")]);
        let site = table.site(3).unwrap();
        assert_eq!(site.count(Nucleotide::C), 2);
        assert_eq!(site.total_depth, 2);
        assert_eq!(table.site(4).unwrap().count(Nucleotide::G), 1);
        assert_eq!(table.site(4).unwrap().count(Nucleotide::A), 1);
        assert_eq!(table.site(1).unwrap().total_depth, 0);
    }

    #[test]
    fn test_insertion_attributed_to_preceding_site() {
        let table = build(10, &[record(0, "3M2I2M", "ACGTTAC")]);
        let site = table.site(2).unwrap();
        assert_eq!(site.insertion_counts.get(b"TT".as_slice()), Some(&1));
        assert_eq!(site.count(Nucleotide::G), 1);
        assert_eq!(table.site(3).unwrap().count(Nucleotide::A), 1);
    }

    #[test]
    fn test_deletion_counts_toward_depth() {
        let table = build(10, &[record(0, "2M2D2M", "ACGT")]);
        assert_eq!(table.site(2).unwrap().deletion_count, 1);
        assert_eq!(table.site(3).unwrap().total_depth, 1);
        assert_eq!(table.site(4).unwrap().count(Nucleotide::G), 1);
    }

    #[test]
    fn test_skip_consumes_reference_without_evidence() {
        let table = build(10, &[record(0, "2M3N2M", "ACGT")]);
        assert_eq!(table.site(3).unwrap().total_depth, 0);
        assert_eq!(table.site(5).unwrap().count(Nucleotide::G), 1);
    }

    #[test]
    fn test_soft_clips_recorded_at_boundaries() {
        let table = build(20, &[record(5, "3S4M2S", "GGGACGTCC")]);
        assert_eq!(table.site(5).unwrap().soft_clip_start_count, 1);
        assert_eq!(table.site(8).unwrap().soft_clip_end_count, 1);
        assert_eq!(table.site(5).unwrap().total_depth, 1);

        let starts = table.start_clips_at(5);
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].clip_len, 3);
        assert_eq!(starts[0].bases, b"GGGACGTCC");
        assert_eq!(table.end_clips_at(8)[0].clip_len, 2);
        assert!(table.end_clips_at(5).is_empty());
    }

    #[test]
    fn test_record_without_aligned_bases_is_ignored() {
        let mut builder = SiteTallyBuilder::new(10);
        let outcome = builder.add_record(&record(0, "4S", "ACGT")).unwrap();
        assert_eq!(outcome, RecordOutcome::Ignored);
        let table = builder.finish();
        assert_eq!(table.stats().ignored, 1);
        assert_eq!(table.site(0).unwrap().soft_clip_start_count, 0);
    }

    #[test]
    fn test_out_of_range_record_rejected() {
        let mut builder = SiteTallyBuilder::new(5);
        let result = builder.add_record(&record(3, "4M", "ACGT"));
        assert!(matches!(result, Err(MalformedRecord::OutOfBounds { .. })));
        let table = builder.finish();
        assert_eq!(table.stats().rejected, 1);
        assert!(table.sites().iter().all(|s| s.total_depth == 0));
    }

    #[test]
    fn test_sequence_mismatch_rejected() {
        let mut builder = SiteTallyBuilder::new(10);
        let result = builder.add_record(&record(0, "6M", "ACGT"));
        assert_eq!(
            result,
            Err(MalformedRecord::SequenceLengthMismatch {
                expected: 6,
                actual: 4
            })
        );
    }

    #[test]
    fn test_leading_insertion_at_origin_rejected() {
        let mut builder = SiteTallyBuilder::new(10);
        let result = builder.add_record(&record(0, "2I4M", "TTACGT"));
        assert!(matches!(result, Err(MalformedRecord::OutOfBounds { .. })));
    }

    #[test]
    fn test_malformed_record_does_not_change_valid_contributions() {
        let valid = vec![record(0, "6M", "ACGTAC"), record(2, "4M", "GTAC")];
        let clean = build(8, &valid);

        let mut with_bad = valid.clone();
        with_bad.insert(1, record(5, "6M", "TTTTTT"));
        let dirty = build(8, &with_bad);

        assert_eq!(clean.sites(), dirty.sites());
        assert_eq!(dirty.stats().rejected, 1);
        assert_eq!(dirty.stats().tallied, 2);
    }

    #[test]
    fn test_counts_never_exceed_depth() {
        let table = build(
            12,
            &[
                record(0, "3M1D4M", "ACGTACG"),
                record(1, "2S5M1I2M", "TTCGTACATG"),
                record(4, "4M2S", "ANGTCC"),
            ],
        );
        for site in table.sites() {
            let sum: u32 = site.nucleotide_counts().iter().sum();
            assert!(sum <= site.total_depth);
            assert!(site.nucleotide_counts().iter().all(|&c| c <= site.total_depth));
        }
    }

    #[test]
    fn test_contig_tallies_route_by_contig() {
        let contigs = vec![ReferenceContig::new("a", 5), ReferenceContig::new("b", 8)];
        let records: Vec<Result<AlignedRecord, std::convert::Infallible>> = vec![
            Ok(AlignedRecord::from_cigar(0, 0, "3M", "ACG").unwrap()),
            Ok(AlignedRecord::from_cigar(1, 4, "4M", "TTTT").unwrap()),
            Ok(AlignedRecord::from_cigar(7, 0, "1M", "A").unwrap()),
        ];

        let tallies = tally_records(&contigs, records).unwrap();
        assert_eq!(tallies.len(), 2);
        assert_eq!(tallies[0].contig.name, "a");
        assert_eq!(tallies[0].table.site(1).unwrap().count(Nucleotide::C), 1);
        assert_eq!(tallies[1].table.site(7).unwrap().count(Nucleotide::T), 1);
        assert_eq!(tallies[1].table.stats().tallied, 1);
    }

    #[test]
    fn test_tally_records_propagates_stream_errors() {
        let contigs = vec![ReferenceContig::new("a", 5)];
        let records = vec![Ok(record(0, "1M", "A")), Err("truncated")];
        assert_eq!(tally_records(&contigs, records).unwrap_err(), "truncated");
    }
}
