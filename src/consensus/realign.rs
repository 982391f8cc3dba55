//! Gap closing across soft-clip boundaries.
//!
//! Where reads were soft clipped at a draft boundary instead of being aligned
//! through it, the clipped bases are often real sequence the aligner could not
//! place. [`ClipRealigner`] walks outward from such a boundary one base at a
//! time, using only clipped reads whose anchor bases match the draft exactly
//! over `min_overlap` positions, and stops as soon as support decays below a
//! fraction of the boundary's peak clip depth, the reads run out, or the reads
//! disagree.

use std::ops::Range;

use serde::Serialize;
use tracing::debug;

use crate::consensus::resolver::{ConsensusDraft, Provenance};
use crate::core::site::Nucleotide;
use crate::core::tally::{ClippedRead, SiteTallyTable};
use crate::utils::validation::count_to_f64;

/// Direction in which a boundary is extended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// From a boundary that reads start at, using their start clips
    Leftward,
    /// From a boundary that reads end at, using their end clips
    Rightward,
}

/// State of an extension walk; every variant except `Extending` is a stop reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionStop {
    Extending,
    /// The best-supported next bases tied
    Ambiguous,
    /// No consistent read has a base left to offer
    ExhaustedCandidates,
    /// Reads agreeing on the next base fell below the decay fraction of peak depth
    BelowDecay,
}

/// A draft boundary where soft-clip evidence dominates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapRegion {
    /// Draft index of the last observed base before the gap
    pub boundary: usize,
    /// Reference site of the boundary base
    pub site: usize,
    pub direction: Direction,
    /// Number of clipped reads recorded at the boundary
    pub peak_depth: usize,
}

/// Bases reconstructed from one boundary, in draft order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub bases: Vec<u8>,
    /// Supporting reads per base
    pub depths: Vec<u32>,
    pub stop: ExtensionStop,
}

impl Extension {
    #[must_use]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    fn to_draft(&self) -> ConsensusDraft {
        let mut draft = ConsensusDraft::default();
        for (&base, &depth) in self.bases.iter().zip(&self.depths) {
            draft.push(base, depth, Provenance::Reconstructed, None);
        }
        draft
    }
}

/// Where in the draft a gap sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    Leading,
    Internal,
    Trailing,
}

/// Result of attempting to close one gap
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GapOutcome {
    pub kind: GapKind,
    /// Length of the `N` run the gap started with
    pub ambiguous_span: usize,
    /// Bases placed from clipped reads
    pub reconstructed: usize,
    pub closed: bool,
    pub stops: Vec<(Direction, ExtensionStop)>,
}

/// Draft after gap closing plus what happened at each gap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Realignment {
    pub draft: ConsensusDraft,
    pub gaps: Vec<GapOutcome>,
}

impl Realignment {
    #[must_use]
    pub fn closed_count(&self) -> usize {
        self.gaps.iter().filter(|g| g.closed).count()
    }

    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.gaps.len() - self.closed_count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealignPolicy {
    pub min_overlap: usize,
    pub clip_decay_threshold: f64,
}

/// A clipped read positioned against the draft frontier
struct Candidate<'a> {
    bases: &'a [u8],
    /// Rightward: index of the next base. Leftward: one past it.
    cursor: usize,
    direction: Direction,
}

impl Candidate<'_> {
    fn peek(&self) -> Option<u8> {
        match self.direction {
            Direction::Rightward => self.bases.get(self.cursor).copied(),
            Direction::Leftward => self.cursor.checked_sub(1).map(|i| self.bases[i]),
        }
    }

    fn advance(&mut self) {
        match self.direction {
            Direction::Rightward => self.cursor += 1,
            Direction::Leftward => self.cursor -= 1,
        }
    }
}

/// Closes gaps bounded by dominant soft-clip evidence
#[derive(Debug, Clone, Copy)]
pub struct ClipRealigner {
    policy: RealignPolicy,
}

impl ClipRealigner {
    #[must_use]
    pub fn new(policy: RealignPolicy) -> Self {
        Self { policy }
    }

    /// Whether the observed base at draft index `flank` bounds a gap in `direction`
    #[must_use]
    pub fn detect(
        &self,
        table: &SiteTallyTable,
        draft: &ConsensusDraft,
        flank: usize,
        direction: Direction,
    ) -> Option<GapRegion> {
        let site_index = (*draft.origins().get(flank)?)?;
        let site = table.site(site_index)?;

        let (dominant, peak_depth) = match direction {
            Direction::Leftward => (
                site.start_clips_dominate(),
                table.start_clips_at(site_index).len(),
            ),
            Direction::Rightward => (
                site.end_clips_dominate(),
                table.end_clips_at(site_index).len(),
            ),
        };

        dominant.then_some(GapRegion {
            boundary: flank,
            site: site_index,
            direction,
            peak_depth,
        })
    }

    /// Walk outward from `region`, one base per step
    #[must_use]
    pub fn extend(
        &self,
        table: &SiteTallyTable,
        draft: &ConsensusDraft,
        region: &GapRegion,
    ) -> Extension {
        let mut candidates = self.candidates(table, draft, region);
        let floor = self.policy.clip_decay_threshold * count_to_f64(region.peak_depth);

        let mut bases = Vec::new();
        let mut depths = Vec::new();
        let mut state = ExtensionStop::Extending;

        while state == ExtensionStop::Extending {
            let mut votes = [0u32; 5];
            let mut live = 0usize;
            for candidate in &candidates {
                if let Some(base) = candidate.peek() {
                    votes[Nucleotide::from_ascii(base).index()] += 1;
                    live += 1;
                }
            }

            state = if live == 0 {
                ExtensionStop::ExhaustedCandidates
            } else if count_to_f64(live) < floor {
                ExtensionStop::BelowDecay
            } else if let Some(winner) = best_supported(&votes) {
                let support = votes[winner.index()];
                // The agreeing reads, not all live ones, must clear the floor
                if f64::from(support) < floor {
                    ExtensionStop::BelowDecay
                } else {
                    bases.push(winner.as_ascii());
                    depths.push(support);
                    candidates.retain(|c| c.peek().map(Nucleotide::from_ascii) == Some(winner));
                    for candidate in &mut candidates {
                        candidate.advance();
                    }
                    ExtensionStop::Extending
                }
            } else {
                ExtensionStop::Ambiguous
            };
        }

        if region.direction == Direction::Leftward {
            bases.reverse();
            depths.reverse();
        }

        debug!(
            site = region.site,
            direction = ?region.direction,
            peak = region.peak_depth,
            extended = bases.len(),
            stop = ?state,
            "Extension finished"
        );

        Extension {
            bases,
            depths,
            stop: state,
        }
    }

    /// Clipped reads whose anchor matches the draft over `min_overlap` bases
    fn candidates<'a>(
        &self,
        table: &'a SiteTallyTable,
        draft: &ConsensusDraft,
        region: &GapRegion,
    ) -> Vec<Candidate<'a>> {
        let k = self.policy.min_overlap;
        let flank = region.boundary;
        let bases = draft.bases();

        match region.direction {
            Direction::Rightward => {
                let Some(window_start) = (flank + 1).checked_sub(k) else {
                    return Vec::new();
                };
                let window = &bases[window_start..=flank];
                table
                    .end_clips_at(region.site)
                    .iter()
                    .filter_map(|read| {
                        let anchor_end = read.bases.len() - read.clip_len;
                        let anchor = read.bases.get(anchor_end.checked_sub(k)?..anchor_end)?;
                        anchor.eq_ignore_ascii_case(window).then_some(Candidate {
                            bases: &read.bases,
                            cursor: anchor_end,
                            direction: Direction::Rightward,
                        })
                    })
                    .collect()
            }
            Direction::Leftward => {
                let Some(window) = bases.get(flank..flank + k) else {
                    return Vec::new();
                };
                table
                    .start_clips_at(region.site)
                    .iter()
                    .filter_map(|read: &'a ClippedRead| {
                        let anchor = read.bases.get(read.clip_len..read.clip_len + k)?;
                        anchor.eq_ignore_ascii_case(window).then_some(Candidate {
                            bases: &read.bases,
                            cursor: read.clip_len,
                            direction: Direction::Leftward,
                        })
                    })
                    .collect()
            }
        }
    }

    /// Close every gap the draft has and return the rebuilt draft
    #[must_use]
    pub fn realign(&self, table: &SiteTallyTable, draft: &ConsensusDraft) -> Realignment {
        let bases = draft.bases();
        let (Some(first), Some(last)) = (
            bases.iter().position(|&b| b != b'N'),
            bases.iter().rposition(|&b| b != b'N'),
        ) else {
            return Realignment {
                draft: draft.clone(),
                gaps: Vec::new(),
            };
        };

        let mut replacements: Vec<(Range<usize>, ConsensusDraft)> = Vec::new();
        let mut gaps = Vec::new();

        if let Some(region) = self.detect(table, draft, first, Direction::Leftward) {
            let extension = self.extend(table, draft, &region);
            let (segment, outcome) = close_terminal(&extension, first, GapKind::Leading);
            replacements.push((0..first, segment));
            gaps.push(outcome);
        }

        let mut prev_end = first;
        let mut i = first;
        while i < last {
            if bases[i] != b'N' {
                i += 1;
                continue;
            }
            let j = i + bases[i..].iter().position(|&b| b != b'N').unwrap_or(bases.len() - i);
            if let Some((range, segment, outcome)) = self.close_internal(table, draft, i..j, prev_end) {
                replacements.push((range, segment));
                gaps.push(outcome);
            }
            prev_end = j;
            i = j;
        }

        if let Some(region) = self.detect(table, draft, last, Direction::Rightward) {
            let extension = self.extend(table, draft, &region);
            let run = bases.len() - last - 1;
            let (segment, outcome) = close_terminal(&extension, run, GapKind::Trailing);
            replacements.push((last + 1..bases.len(), segment));
            gaps.push(outcome);
        }

        let mut rebuilt = ConsensusDraft::default();
        let mut cursor = 0;
        for (range, segment) in &replacements {
            rebuilt.extend_from(draft, cursor..range.start);
            rebuilt.append(segment);
            cursor = range.end;
        }
        rebuilt.extend_from(draft, cursor..draft.len());

        Realignment {
            draft: rebuilt,
            gaps,
        }
    }

    /// Try to fill the internal `N` run `run` from both flanks.
    ///
    /// The rightward extension from the left flank and the leftward extension from
    /// the right flank are joined when the sequence ending at the former overlaps
    /// the sequence starting at the latter by at least `min_overlap` bases. The
    /// join may reach back into the left flank, but never past `prev_end`.
    fn close_internal(
        &self,
        table: &SiteTallyTable,
        draft: &ConsensusDraft,
        run: Range<usize>,
        prev_end: usize,
    ) -> Option<(Range<usize>, ConsensusDraft, GapOutcome)> {
        let (i, j) = (run.start, run.end);
        let rightward = self.detect(table, draft, i - 1, Direction::Rightward);
        let leftward = self.detect(table, draft, j, Direction::Leftward);
        if rightward.is_none() && leftward.is_none() {
            return None;
        }

        let empty = Extension {
            bases: Vec::new(),
            depths: Vec::new(),
            stop: ExtensionStop::ExhaustedCandidates,
        };
        let mut stops = Vec::new();
        let right_ext = rightward.map_or_else(
            || empty.clone(),
            |region| {
                let extension = self.extend(table, draft, &region);
                stops.push((Direction::Rightward, extension.stop));
                extension
            },
        );
        let left_ext = leftward.map_or_else(
            || empty.clone(),
            |region| {
                let extension = self.extend(table, draft, &region);
                stops.push((Direction::Leftward, extension.stop));
                extension
            },
        );

        let (l, r) = (right_ext.len(), left_ext.len());
        let reconstructed = l + r;
        let bases = draft.bases();

        // Sequence ending at the right extension, and sequence starting at the left one
        let mut head = bases[i - (i - prev_end).min(r)..i].to_vec();
        head.extend_from_slice(&right_ext.bases);
        let mut tail = left_ext.bases.clone();
        tail.extend_from_slice(&bases[j..(j + l).min(bases.len())]);

        let longest = (l + r).min(head.len()).min(tail.len());
        let overlap = (self.policy.min_overlap..=longest)
            .rev()
            .find(|&o| head[head.len() - o..].eq_ignore_ascii_case(&tail[..o]));

        let mut segment = ConsensusDraft::default();
        let range;
        let closed;
        match overlap {
            Some(o) => {
                segment.append(&right_ext.to_draft());
                let kept = l.saturating_sub(o);
                segment = truncated(segment, kept);
                segment.append(&left_ext.to_draft());
                range = (i - o.saturating_sub(l))..j;
                closed = true;
            }
            None => {
                segment.append(&right_ext.to_draft());
                let remaining = (j - i).saturating_sub(reconstructed).max(1);
                for _ in 0..remaining {
                    segment.push(b'N', 0, Provenance::Observed, None);
                }
                segment.append(&left_ext.to_draft());
                range = i..j;
                closed = false;
            }
        }

        debug!(
            start = i,
            end = j,
            rightward = l,
            leftward = r,
            overlap = ?overlap,
            closed,
            "Internal gap"
        );

        Some((
            range,
            segment,
            GapOutcome {
                kind: GapKind::Internal,
                ambiguous_span: j - i,
                reconstructed,
                closed,
                stops,
            },
        ))
    }
}

fn truncated(draft: ConsensusDraft, len: usize) -> ConsensusDraft {
    let mut out = ConsensusDraft::default();
    out.extend_from(&draft, 0..len.min(draft.len()));
    out
}

/// Segment replacing a terminal `N` run of length `run`
fn close_terminal(extension: &Extension, run: usize, kind: GapKind) -> (ConsensusDraft, GapOutcome) {
    let mut padding = ConsensusDraft::default();
    for _ in 0..run.saturating_sub(extension.len()) {
        padding.push(b'N', 0, Provenance::Observed, None);
    }

    let mut segment = ConsensusDraft::default();
    match kind {
        GapKind::Leading => {
            segment.append(&padding);
            segment.append(&extension.to_draft());
        }
        _ => {
            segment.append(&extension.to_draft());
            segment.append(&padding);
        }
    }

    let direction = if kind == GapKind::Leading {
        Direction::Leftward
    } else {
        Direction::Rightward
    };

    let outcome = GapOutcome {
        kind,
        ambiguous_span: run,
        reconstructed: extension.len(),
        closed: !extension.is_empty() && extension.len() >= run,
        stops: vec![(direction, extension.stop)],
    };
    (segment, outcome)
}

/// Base with the highest vote; `None` on a tie for first place or an `N` winner
fn best_supported(votes: &[u32; 5]) -> Option<Nucleotide> {
    let mut ranked: Vec<Nucleotide> = Nucleotide::ALL.to_vec();
    ranked.sort_by(|a, b| votes[b.index()].cmp(&votes[a.index()]));
    let (best, runner_up) = (ranked[0], ranked[1]);
    if votes[best.index()] == 0
        || votes[best.index()] == votes[runner_up.index()]
        || best == Nucleotide::N
    {
        None
    } else {
        Some(best)
    }
}
