//! Core data types and the per-site tally.
//!
//! - [`record`]: aligned records, alignment operations and reference contigs
//! - [`site`]: nucleotides and the evidence accumulated at one reference site
//! - [`tally`]: building per-contig [`tally::SiteTallyTable`]s from records
//! - [`config`]: validated settings for consensus, weights and variant calling

pub mod config;
pub mod record;
pub mod site;
pub mod tally;
