//! Tabular views of a tally: per-site weights, features and called variants.

pub mod variants;
pub mod weights;
