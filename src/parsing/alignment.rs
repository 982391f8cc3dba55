//! SAM/BAM record source built on noodles.
//!
//! [`AlignmentReader`] reads the header once, exposes its `@SQ` entries as
//! [`ReferenceContig`]s and then yields [`AlignedRecord`]s lazily in file order.
//! Unmapped and secondary records are skipped.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::RecordBuf;
use noodles::{bam, sam};
use thiserror::Error;
use tracing::debug;

use crate::core::record::{AlignedRecord, AlignmentOp, OpKind, ReferenceContig};
use crate::core::tally::{tally_records, ContigTally};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid alignment file: {0}")]
    InvalidFormat(String),

    #[error("noodles error: {0}")]
    Noodles(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// Anything that can fill a [`RecordBuf`] from a stream of alignment records
pub trait RecordBufSource {
    /// Read the next record; returns 0 at end of input.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the record cannot be read or decoded.
    fn read_record_buf(&mut self, header: &sam::Header, record: &mut RecordBuf)
        -> io::Result<usize>;
}

impl<R: BufRead> RecordBufSource for sam::io::Reader<R> {
    fn read_record_buf(
        &mut self,
        header: &sam::Header,
        record: &mut RecordBuf,
    ) -> io::Result<usize> {
        sam::io::Reader::read_record_buf(self, header, record)
    }
}

impl<R: Read> RecordBufSource for bam::io::Reader<R> {
    fn read_record_buf(
        &mut self,
        header: &sam::Header,
        record: &mut RecordBuf,
    ) -> io::Result<usize> {
        bam::io::Reader::read_record_buf(self, header, record)
    }
}

/// Lazy, single-pass reader of aligned records
pub struct AlignmentReader {
    source: Box<dyn RecordBufSource>,
    header: sam::Header,
    contigs: Vec<ReferenceContig>,
    buf: RecordBuf,
    skipped: usize,
}

impl AlignmentReader {
    /// Open a SAM or BAM file, choosing the codec by extension
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Io` if the file cannot be opened, `ParseError::Noodles`
    /// if the header cannot be read, `ParseError::UnsupportedFormat` for unknown
    /// extensions, or `ParseError::InvalidFormat` if the header has no `@SQ` lines.
    pub fn open(path: &Path) -> Result<Self, ParseError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("sam") | None => Self::from_sam(BufReader::new(File::open(path)?)),
            Some("bam") => Self::from_bam(File::open(path)?),
            Some(ext) => Err(ParseError::UnsupportedFormat(ext.to_string())),
        }
    }

    /// Read SAM text from any buffered reader
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Noodles` if the header is invalid, or
    /// `ParseError::InvalidFormat` if it has no `@SQ` lines.
    pub fn from_sam<R: BufRead + 'static>(reader: R) -> Result<Self, ParseError> {
        let mut reader = sam::io::Reader::new(reader);
        let header = reader
            .read_header()
            .map_err(|e| ParseError::Noodles(e.to_string()))?;
        Self::with_source(Box::new(reader), header)
    }

    /// Read BGZF-compressed BAM from any reader
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Noodles` if the header is invalid, or
    /// `ParseError::InvalidFormat` if it has no `@SQ` lines.
    pub fn from_bam<R: Read + 'static>(reader: R) -> Result<Self, ParseError> {
        let mut reader = bam::io::Reader::new(reader);
        let header = reader
            .read_header()
            .map_err(|e| ParseError::Noodles(e.to_string()))?;
        Self::with_source(Box::new(reader), header)
    }

    fn with_source(
        source: Box<dyn RecordBufSource>,
        header: sam::Header,
    ) -> Result<Self, ParseError> {
        let contigs: Vec<ReferenceContig> = header
            .reference_sequences()
            .iter()
            .map(|(name, map)| ReferenceContig::new(name.to_string(), map.length().get()))
            .collect();

        if contigs.is_empty() {
            return Err(ParseError::InvalidFormat(
                "No @SQ lines found in header".to_string(),
            ));
        }

        Ok(Self {
            source,
            header,
            contigs,
            buf: RecordBuf::default(),
            skipped: 0,
        })
    }

    /// Reference contigs in header order
    #[must_use]
    pub fn contigs(&self) -> &[ReferenceContig] {
        &self.contigs
    }

    /// Records skipped so far as unmapped, secondary or unplaced
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Convert the buffered record, or `None` if it carries no placed alignment
    fn convert(&self) -> Option<AlignedRecord> {
        let record = &self.buf;
        let flags = record.flags();
        if flags.is_unmapped() || flags.is_secondary() {
            return None;
        }

        let contig = record.reference_sequence_id()?;
        let start = usize::from(record.alignment_start()?) - 1;
        let ops = record
            .cigar()
            .as_ref()
            .iter()
            .map(|op| AlignmentOp::new(op_kind(op.kind()), op.len()))
            .collect();

        Some(AlignedRecord::new(
            contig,
            start,
            ops,
            record.sequence().as_ref().to_vec(),
        ))
    }
}

fn op_kind(kind: Kind) -> OpKind {
    match kind {
        Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch => OpKind::Match,
        Kind::Insertion => OpKind::Insertion,
        Kind::Deletion => OpKind::Deletion,
        Kind::Skip => OpKind::Skip,
        Kind::SoftClip => OpKind::SoftClip,
        Kind::HardClip => OpKind::HardClip,
        Kind::Pad => OpKind::Pad,
    }
}

impl Iterator for AlignmentReader {
    type Item = Result<AlignedRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.source.read_record_buf(&self.header, &mut self.buf) {
                Ok(0) => {
                    debug!(skipped = self.skipped, "Finished reading records");
                    return None;
                }
                Ok(_) => match self.convert() {
                    Some(record) => return Some(Ok(record)),
                    None => self.skipped += 1,
                },
                Err(e) => return Some(Err(ParseError::Noodles(e.to_string()))),
            }
        }
    }
}

/// Open `path` and tally all of its records, one table per header contig
///
/// # Errors
///
/// Returns `ParseError` if the file cannot be opened or a record cannot be read.
pub fn tally_path(path: &Path) -> Result<Vec<ContigTally>, ParseError> {
    let reader = AlignmentReader::open(path)?;
    let contigs = reader.contigs().to_vec();
    debug!(path = %path.display(), contigs = contigs.len(), "Tallying records");
    tally_records(&contigs, reader)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const SAM: &str = "@HD\tVN:1.6\tSO:coordinate
@SQ\tSN:chr1\tLN:12
@SQ\tSN:chr2\tLN:6
r1\t0\tchr1\t1\t60\t2S4M\t*\t0\t0\tTTACGT\t*
r2\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\t*
r3\t256\tchr1\t3\t60\t4M\t*\t0\t0\tGTAC\t*
r4\t16\tchr2\t2\t60\t2M1I1M\t*\t0\t0\tACGT\t*
";

    fn reader(text: &str) -> AlignmentReader {
        AlignmentReader::from_sam(Cursor::new(text.as_bytes().to_vec())).unwrap()
    }

    #[test]
    fn test_header_contigs() {
        let reader = reader(SAM);
        assert_eq!(
            reader.contigs(),
            &[ReferenceContig::new("chr1", 12), ReferenceContig::new("chr2", 6)]
        );
    }

    #[test]
    fn test_records_skip_unmapped_and_secondary() {
        let mut reader = reader(SAM);
        let records: Vec<AlignedRecord> = reader.by_ref().map(Result::unwrap).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].contig, 0);
        assert_eq!(records[0].start, 0);
        assert_eq!(records[0].leading_soft_clip(), 2);
        assert_eq!(records[0].sequence, b"TTACGT");
        assert_eq!(records[1].contig, 1);
        assert_eq!(records[1].start, 1);
        assert_eq!(records[1].ops[1], AlignmentOp::new(OpKind::Insertion, 1));
        assert_eq!(reader.skipped(), 2);
    }

    #[test]
    fn test_header_without_sq_is_rejected() {
        let result = AlignmentReader::from_sam(Cursor::new(b"@HD\tVN:1.6\n".to_vec()));
        assert!(matches!(result, Err(ParseError::InvalidFormat(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = AlignmentReader::open(Path::new("reads.cram"));
        assert!(matches!(result, Err(ParseError::UnsupportedFormat(ext)) if ext == "cram"));
    }

    #[test]
    fn test_records_feed_tally() {
        let reader = reader(SAM);
        let contigs = reader.contigs().to_vec();
        let tallies = tally_records(&contigs, reader).unwrap();
        assert_eq!(tallies[0].table.start_clips_at(0).len(), 1);
        assert_eq!(tallies[1].table.site(2).unwrap().insertion_counts.len(), 1);
    }
}
