use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Base symbols tallied per site
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Nucleotide {
    A,
    C,
    G,
    T,
    N,
}

impl Nucleotide {
    /// All tallied symbols, in column order
    pub const ALL: [Self; 5] = [Self::A, Self::C, Self::G, Self::T, Self::N];

    /// The unambiguous bases, in tie-break priority order
    pub const ACGT: [Self; 4] = [Self::A, Self::C, Self::G, Self::T];

    /// Map a read symbol to a nucleotide; anything outside ACGT folds to `N`
    #[must_use]
    pub fn from_ascii(base: u8) -> Self {
        match base.to_ascii_uppercase() {
            b'A' => Self::A,
            b'C' => Self::C,
            b'G' => Self::G,
            b'T' => Self::T,
            _ => Self::N,
        }
    }

    #[must_use]
    pub fn as_ascii(self) -> u8 {
        match self {
            Self::A => b'A',
            Self::C => b'C',
            Self::G => b'G',
            Self::T => b'T',
            Self::N => b'N',
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Nucleotide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", char::from(self.as_ascii()))
    }
}

/// Evidence accumulated at one 0-based reference position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSite {
    nucleotide_counts: [u32; 5],

    /// Inserted subsequence (uppercase) following this site -> count
    pub insertion_counts: BTreeMap<Vec<u8>, u32>,

    pub deletion_count: u32,

    /// Reads whose alignment starts here after a soft clip
    pub soft_clip_start_count: u32,

    /// Reads whose alignment ends here before a soft clip
    pub soft_clip_end_count: u32,

    /// Aligned bases plus deletions covering this site; clips excluded
    pub total_depth: u32,
}

impl ReferenceSite {
    #[must_use]
    pub fn count(&self, nucleotide: Nucleotide) -> u32 {
        self.nucleotide_counts[nucleotide.index()]
    }

    /// Counts in A, C, G, T, N order
    #[must_use]
    pub fn nucleotide_counts(&self) -> [u32; 5] {
        self.nucleotide_counts
    }

    pub(crate) fn add_base(&mut self, base: u8) {
        self.nucleotide_counts[Nucleotide::from_ascii(base).index()] += 1;
        self.total_depth += 1;
    }

    pub(crate) fn add_deletion(&mut self) {
        self.deletion_count += 1;
        self.total_depth += 1;
    }

    pub(crate) fn add_insertion(&mut self, bases: &[u8]) {
        let key: Vec<u8> = bases.iter().map(u8::to_ascii_uppercase).collect();
        *self.insertion_counts.entry(key).or_insert(0) += 1;
    }

    /// Sum of insertion counts over all inserted sequences
    #[must_use]
    pub fn insertion_total(&self) -> u32 {
        self.insertion_counts.values().sum()
    }

    /// Base with the strictly highest count among A, C, G, T.
    ///
    /// Ties go to the earliest of A < C < G < T; `None` when no ACGT evidence exists.
    #[must_use]
    pub fn majority_base(&self) -> Option<Nucleotide> {
        let mut best: Option<(Nucleotide, u32)> = None;
        for nucleotide in Nucleotide::ACGT {
            let count = self.count(nucleotide);
            if count == 0 {
                continue;
            }
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((nucleotide, count));
            }
        }
        best.map(|(nucleotide, _)| nucleotide)
    }

    /// Most frequent inserted sequence and its count; ties go to the lexically smallest
    #[must_use]
    pub fn majority_insertion(&self) -> Option<(&[u8], u32)> {
        let mut best: Option<(&[u8], u32)> = None;
        for (sequence, &count) in &self.insertion_counts {
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((sequence.as_slice(), count));
            }
        }
        best
    }

    /// Whether `count` is more than half of the total depth
    #[must_use]
    pub fn exceeds_majority(&self, count: u32) -> bool {
        2 * u64::from(count) > u64::from(self.total_depth)
    }

    /// Depth of reads covering this site that were not soft clipped at its start
    #[must_use]
    pub fn unclipped_start_depth(&self) -> u32 {
        self.total_depth.saturating_sub(self.soft_clip_start_count)
    }

    /// Depth of reads covering this site that were not soft clipped at its end
    #[must_use]
    pub fn unclipped_end_depth(&self) -> u32 {
        self.total_depth.saturating_sub(self.soft_clip_end_count)
    }

    /// Start clips outnumber reads that align through the site's left edge
    #[must_use]
    pub fn start_clips_dominate(&self) -> bool {
        self.soft_clip_start_count > self.unclipped_start_depth()
    }

    /// End clips outnumber reads that align through the site's right edge
    #[must_use]
    pub fn end_clips_dominate(&self) -> bool {
        self.soft_clip_end_count > self.unclipped_end_depth()
    }

    /// Relative frequency of `count` at this site; zero at zero depth
    #[must_use]
    pub fn frequency(&self, count: u32) -> f64 {
        if self.total_depth == 0 {
            0.0
        } else {
            f64::from(count) / f64::from(self.total_depth)
        }
    }
}
