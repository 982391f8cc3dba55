use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::site::Nucleotide;
use crate::core::tally::SiteTallyTable;

/// Where a draft base came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Resolved from aligned evidence at a reference site
    Observed,
    /// Filled in from soft-clipped reads during gap closing
    Reconstructed,
}

/// Resolved consensus symbols with per-position depth, provenance and origin.
///
/// Bases are stored uppercase; case is applied only by [`ConsensusDraft::render`].
/// `origins` maps each position back to its reference site, `None` for inserted
/// and reconstructed bases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsensusDraft {
    bases: Vec<u8>,
    depths: Vec<u32>,
    provenance: Vec<Provenance>,
    origins: Vec<Option<usize>>,
}

impl ConsensusDraft {
    #[must_use]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    #[must_use]
    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    #[must_use]
    pub fn depths(&self) -> &[u32] {
        &self.depths
    }

    #[must_use]
    pub fn provenance(&self) -> &[Provenance] {
        &self.provenance
    }

    #[must_use]
    pub fn origins(&self) -> &[Option<usize>] {
        &self.origins
    }

    pub fn push(&mut self, base: u8, depth: u32, provenance: Provenance, origin: Option<usize>) {
        self.bases.push(base.to_ascii_uppercase());
        self.depths.push(depth);
        self.provenance.push(provenance);
        self.origins.push(origin);
    }

    /// Append a copy of `range` from `other`
    pub fn extend_from(&mut self, other: &Self, range: Range<usize>) {
        self.bases.extend_from_slice(&other.bases[range.clone()]);
        self.depths.extend_from_slice(&other.depths[range.clone()]);
        self.provenance.extend_from_slice(&other.provenance[range.clone()]);
        self.origins.extend_from_slice(&other.origins[range]);
    }

    /// Append all of `other`
    pub fn append(&mut self, other: &Self) {
        self.extend_from(other, 0..other.len());
    }

    /// Number of `N` symbols
    #[must_use]
    pub fn ambiguous_count(&self) -> usize {
        self.bases.iter().filter(|&&b| b == b'N').count()
    }

    /// Number of bases reconstructed from clipped reads
    #[must_use]
    pub fn reconstructed_count(&self) -> usize {
        self.provenance
            .iter()
            .filter(|&&p| p == Provenance::Reconstructed)
            .count()
    }

    /// Strip leading and trailing runs of `N`
    pub fn trim_ambiguous_ends(&mut self) {
        let start = self.bases.iter().position(|&b| b != b'N');
        let Some(start) = start else {
            *self = Self::default();
            return;
        };
        let end = self
            .bases
            .iter()
            .rposition(|&b| b != b'N')
            .map_or(start, |i| i + 1);

        self.bases.truncate(end);
        self.depths.truncate(end);
        self.provenance.truncate(end);
        self.origins.truncate(end);

        self.bases.drain(..start);
        self.depths.drain(..start);
        self.provenance.drain(..start);
        self.origins.drain(..start);
    }

    /// Serialize to a string. Reconstructed bases are lowercase unless `uppercase`.
    #[must_use]
    pub fn render(&self, uppercase: bool) -> String {
        self.bases
            .iter()
            .zip(&self.provenance)
            .map(|(&base, &provenance)| {
                if !uppercase && provenance == Provenance::Reconstructed {
                    char::from(base.to_ascii_lowercase())
                } else {
                    char::from(base)
                }
            })
            .collect()
    }
}

/// Depth and case policy applied when resolving a tally table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverPolicy {
    pub min_depth: u32,
    pub trim_ends: bool,
    pub uppercase: bool,
}

/// Turns a [`SiteTallyTable`] into a [`ConsensusDraft`] using majority rules
#[derive(Debug, Clone, Copy)]
pub struct ConsensusResolver {
    policy: ResolverPolicy,
}

impl ConsensusResolver {
    #[must_use]
    pub fn new(policy: ResolverPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> ResolverPolicy {
        self.policy
    }

    /// Resolve every site in order. End trimming is left to [`Self::finish`] so that
    /// gap closing can still see terminal `N` runs.
    #[must_use]
    pub fn resolve(&self, table: &SiteTallyTable) -> ConsensusDraft {
        let mut draft = ConsensusDraft::default();

        for (position, site) in table.sites().iter().enumerate() {
            let depth = site.total_depth;

            if depth < self.policy.min_depth {
                draft.push(b'N', depth, Provenance::Observed, Some(position));
                continue;
            }

            if site.exceeds_majority(site.deletion_count) {
                continue;
            }

            let base = site.majority_base().unwrap_or(Nucleotide::N);
            draft.push(base.as_ascii(), depth, Provenance::Observed, Some(position));

            if let Some((inserted, count)) = site.majority_insertion() {
                if site.exceeds_majority(count) {
                    for &b in inserted {
                        draft.push(b, count, Provenance::Observed, None);
                    }
                }
            }
        }

        draft
    }

    /// Apply end trimming to a resolved (and possibly realigned) draft
    #[must_use]
    pub fn finish(&self, mut draft: ConsensusDraft) -> ConsensusDraft {
        if self.policy.trim_ends {
            draft.trim_ambiguous_ends();
        }
        draft
    }

    /// Apply the case policy
    #[must_use]
    pub fn render(&self, draft: &ConsensusDraft) -> String {
        draft.render(self.policy.uppercase)
    }

    /// Resolve, trim and render in one step
    #[must_use]
    pub fn resolve_sequence(&self, table: &SiteTallyTable) -> String {
        self.render(&self.finish(self.resolve(table)))
    }
}
