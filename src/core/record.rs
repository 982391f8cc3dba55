use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A reference sequence named in the alignment header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceContig {
    /// Sequence name (SN tag in SAM)
    pub name: String,

    /// Sequence length (LN tag in SAM)
    pub length: usize,
}

impl ReferenceContig {
    pub fn new(name: impl Into<String>, length: usize) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

/// Alignment operation kinds, collapsed from the SAM CIGAR alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// M, = or X: consumes reference and read
    Match,
    /// I: consumes read only
    Insertion,
    /// D: consumes reference only, counts as evidence
    Deletion,
    /// N: consumes reference only, no evidence
    Skip,
    /// S: consumes read only, not placed against the reference
    SoftClip,
    /// H: consumes neither
    HardClip,
    /// P: consumes neither
    Pad,
}

impl OpKind {
    #[must_use]
    pub fn consumes_reference(self) -> bool {
        matches!(self, Self::Match | Self::Deletion | Self::Skip)
    }

    #[must_use]
    pub fn consumes_read(self) -> bool {
        matches!(self, Self::Match | Self::Insertion | Self::SoftClip)
    }

    fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            'M' | '=' | 'X' => Some(Self::Match),
            'I' => Some(Self::Insertion),
            'D' => Some(Self::Deletion),
            'N' => Some(Self::Skip),
            'S' => Some(Self::SoftClip),
            'H' => Some(Self::HardClip),
            'P' => Some(Self::Pad),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentOp {
    pub kind: OpKind,
    pub len: usize,
}

impl AlignmentOp {
    #[must_use]
    pub fn new(kind: OpKind, len: usize) -> Self {
        Self { kind, len }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CigarError {
    #[error("Invalid CIGAR length in '{0}'")]
    InvalidLength(String),

    #[error("Unknown CIGAR operation '{op}' in '{cigar}'")]
    UnknownOperation { op: char, cigar: String },
}

/// Parse a CIGAR string such as `3S10M2I5M` into alignment operations.
///
/// `*` yields no operations. The SAM/BAM reader maps noodles CIGAR operations
/// directly; this is for callers that build records by hand.
///
/// # Errors
///
/// Returns `CigarError` if a length is missing or an operation symbol is unknown.
pub fn parse_cigar(cigar: &str) -> Result<Vec<AlignmentOp>, CigarError> {
    if cigar == "*" {
        return Ok(Vec::new());
    }

    let mut ops = Vec::new();
    let mut num_start = 0;

    for (i, c) in cigar.char_indices() {
        if c.is_ascii_digit() {
            continue;
        }
        let len: usize = cigar[num_start..i]
            .parse()
            .map_err(|_| CigarError::InvalidLength(cigar.to_string()))?;
        let kind = OpKind::from_symbol(c).ok_or_else(|| CigarError::UnknownOperation {
            op: c,
            cigar: cigar.to_string(),
        })?;
        ops.push(AlignmentOp::new(kind, len));
        num_start = i + 1;
    }

    if num_start != cigar.len() {
        return Err(CigarError::InvalidLength(cigar.to_string()));
    }

    Ok(ops)
}

/// One read placed against a reference contig.
///
/// `start` is 0-based. `ops` are in read order, which is also reference order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRecord {
    /// Index of the contig in the header's reference sequence list
    pub contig: usize,

    /// 0-based reference position of the first reference-consuming operation
    pub start: usize,

    pub ops: Vec<AlignmentOp>,

    /// Read bases, including soft-clipped ones
    pub sequence: Vec<u8>,
}

impl AlignedRecord {
    pub fn new(
        contig: usize,
        start: usize,
        ops: Vec<AlignmentOp>,
        sequence: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            contig,
            start,
            ops,
            sequence: sequence.into(),
        }
    }

    /// Build a record from a CIGAR string
    ///
    /// # Errors
    ///
    /// Returns `CigarError` if the CIGAR cannot be parsed.
    pub fn from_cigar(
        contig: usize,
        start: usize,
        cigar: &str,
        sequence: &str,
    ) -> Result<Self, CigarError> {
        Ok(Self::new(
            contig,
            start,
            parse_cigar(cigar)?,
            sequence.as_bytes(),
        ))
    }

    /// Number of reference sites spanned by the alignment
    #[must_use]
    pub fn reference_span(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| op.kind.consumes_reference())
            .map(|op| op.len)
            .sum()
    }

    /// Number of read bases the operations expect
    #[must_use]
    pub fn read_span(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| op.kind.consumes_read())
            .map(|op| op.len)
            .sum()
    }

    /// Whether any operation places read bases against the reference
    #[must_use]
    pub fn has_aligned_bases(&self) -> bool {
        self.ops
            .iter()
            .any(|op| op.kind == OpKind::Match && op.len > 0)
    }

    /// Length of the soft clip at the start of the read, ignoring hard clips
    #[must_use]
    pub fn leading_soft_clip(&self) -> usize {
        self.ops
            .iter()
            .find(|op| op.kind != OpKind::HardClip)
            .filter(|op| op.kind == OpKind::SoftClip)
            .map_or(0, |op| op.len)
    }

    /// Length of the soft clip at the end of the read, ignoring hard clips
    #[must_use]
    pub fn trailing_soft_clip(&self) -> usize {
        self.ops
            .iter()
            .rev()
            .find(|op| op.kind != OpKind::HardClip)
            .filter(|op| op.kind == OpKind::SoftClip)
            .map_or(0, |op| op.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cigar() {
        let ops = parse_cigar("3S10M2I5M1D4M2S5H").unwrap();
        assert_eq!(ops.len(), 8);
        assert_eq!(ops[0], AlignmentOp::new(OpKind::SoftClip, 3));
        assert_eq!(ops[2], AlignmentOp::new(OpKind::Insertion, 2));
        assert_eq!(ops[4], AlignmentOp::new(OpKind::Deletion, 1));
        assert_eq!(ops[7], AlignmentOp::new(OpKind::HardClip, 5));
    }

    #[test]
    fn test_parse_cigar_star_is_empty() {
        assert!(parse_cigar("*").unwrap().is_empty());
    }

    #[test]
    fn test_parse_cigar_rejects_garbage() {
        assert!(matches!(
            parse_cigar("10Q"),
            Err(CigarError::UnknownOperation { op: 'Q', .. })
        ));
        assert!(matches!(parse_cigar("M"), Err(CigarError::InvalidLength(_))));
        assert!(matches!(parse_cigar("10M5"), Err(CigarError::InvalidLength(_))));
    }

    #[test]
    fn test_spans() {
        let record = AlignedRecord::from_cigar(0, 0, "2S4M1I3M2D1N3M", "AAACGTACGTACGT").unwrap();
        assert_eq!(record.reference_span(), 4 + 3 + 2 + 1 + 3);
        assert_eq!(record.read_span(), 2 + 4 + 1 + 3 + 3);
        assert!(record.has_aligned_bases());
    }

    #[test]
    fn test_soft_clips_skip_hard_clips() {
        let record = AlignedRecord::from_cigar(0, 0, "5H3S4M2S7H", "AAACGTAC").unwrap();
        assert_eq!(record.leading_soft_clip(), 3);
        assert_eq!(record.trailing_soft_clip(), 2);

        let record = AlignedRecord::from_cigar(0, 0, "4M", "ACGT").unwrap();
        assert_eq!(record.leading_soft_clip(), 0);
        assert_eq!(record.trailing_soft_clip(), 0);
    }

    #[test]
    fn test_clip_only_record_has_no_aligned_bases() {
        let record = AlignedRecord::from_cigar(0, 0, "4S", "ACGT").unwrap();
        assert!(!record.has_aligned_bases());
    }
}
