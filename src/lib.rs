//! # clip-consensus
//!
//! A library for inferring consensus sequences from SAM/BAM alignments.
//!
//! Reads aligned against a reference are tallied site by site; each site is then
//! resolved to a consensus base using majority rules and a minimum depth. Where
//! the aligner soft clipped reads at the edge of a poorly covered region, the
//! clipped bases can be used to reconstruct sequence the reference does not
//! contain.
//!
//! ## Features
//!
//! - **Majority consensus**: per-site base, deletion and insertion resolution
//! - **Gap closing**: extension across soft-clip boundaries with exact overlap
//!   anchoring and a depth-decay stopping rule
//! - **Tables**: per-site nucleotide weights, indel/clip features and called variants
//! - **Reports**: depth distribution, ambiguity and gap statistics per contig
//!
//! ## Example
//!
//! ```rust,no_run
//! use clip_consensus::consensus::pipeline::consensus_from_path;
//! use clip_consensus::ConsensusConfig;
//! use std::path::Path;
//!
//! let config = ConsensusConfig {
//!     realign: true,
//!     ..ConsensusConfig::default()
//! };
//! let result = consensus_from_path(Path::new("sample.bam"), &config).unwrap();
//!
//! for consensus in &result.consensuses {
//!     println!(">{}\n{}", consensus.record_name(), consensus.sequence);
//! }
//! eprintln!("{}", result.report);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: records, sites, tally tables and configuration
//! - [`consensus`]: resolution, gap closing, reports and the file pipeline
//! - [`tables`]: weights, features and variant tables
//! - [`parsing`]: SAM/BAM input and FASTA output
//! - [`cli`]: Command-line interface implementation

pub mod cli;
pub mod consensus;
pub mod core;
pub mod parsing;
pub mod tables;
pub mod utils;

// Re-export commonly used types for convenience
pub use crate::consensus::pipeline::{ConsensusResult, ContigConsensus, PipelineError};
pub use crate::consensus::resolver::{ConsensusDraft, ConsensusResolver};
pub use crate::core::config::{ConsensusConfig, VariantConfig, WeightsConfig};
pub use crate::core::record::{AlignedRecord, ReferenceContig};
pub use crate::core::tally::{SiteTallyBuilder, SiteTallyTable};
