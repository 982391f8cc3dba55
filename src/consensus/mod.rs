//! Consensus construction.
//!
//! A [`resolver::ConsensusResolver`] turns each site of a tally table into a
//! consensus symbol. When realignment is enabled, a [`realign::ClipRealigner`]
//! then closes gaps bounded by soft-clipped reads, and a
//! [`report::ReportAssembler`] summarizes the result. [`pipeline`] ties these
//! together for whole files.

pub mod pipeline;
pub mod realign;
pub mod report;
pub mod resolver;
