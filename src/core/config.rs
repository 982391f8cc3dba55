use serde::{Deserialize, Serialize};

use crate::utils::validation::{require_at_least, require_fraction, ConfigError};

pub const DEFAULT_MIN_DEPTH: u32 = 2;
pub const DEFAULT_MIN_OVERLAP: usize = 7;
pub const DEFAULT_CLIP_DECAY_THRESHOLD: f64 = 0.1;
pub const DEFAULT_ABS_THRESHOLD: u32 = 1;
pub const DEFAULT_REL_THRESHOLD: f64 = 0.01;

/// Settings for consensus construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Reconstruct sequence around soft-clip boundaries
    pub realign: bool,
    /// Sites below this depth resolve to `N`
    pub min_depth: u32,
    /// Exact match length required to accept a clipped read during extension
    pub min_overlap: usize,
    /// Fraction of peak clip depth below which extension stops
    pub clip_decay_threshold: f64,
    /// Strip leading and trailing `N` runs
    pub trim_ends: bool,
    /// Render reconstructed bases in uppercase too
    pub uppercase: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            realign: false,
            min_depth: DEFAULT_MIN_DEPTH,
            min_overlap: DEFAULT_MIN_OVERLAP,
            clip_decay_threshold: DEFAULT_CLIP_DECAY_THRESHOLD,
            trim_ends: false,
            uppercase: false,
        }
    }
}

impl ConsensusConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` if `min_overlap` is zero or `clip_decay_threshold`
    /// is outside [0, 1].
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_at_least("min_overlap", self.min_overlap, 1)?;
        require_fraction("clip_decay_threshold", self.clip_decay_threshold)
    }
}

/// Settings for the per-site weights table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightsConfig {
    /// Report base frequencies instead of counts
    pub relative: bool,
    /// Skip the confidence columns
    pub no_confidence: bool,
}

/// Settings for variant calling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    /// Minimum allele count
    pub abs_threshold: u32,
    /// Minimum allele frequency
    pub rel_threshold: f64,
    /// Drop sites without a called allele
    pub only_variants: bool,
    /// Report counts instead of frequencies
    pub absolute: bool,
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self {
            abs_threshold: DEFAULT_ABS_THRESHOLD,
            rel_threshold: DEFAULT_REL_THRESHOLD,
            only_variants: false,
            absolute: false,
        }
    }
}

impl VariantConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` if `rel_threshold` is outside [0, 1].
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_fraction("rel_threshold", self.rel_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ConsensusConfig::default().validate().is_ok());
        assert!(VariantConfig::default().validate().is_ok());
    }

    #[test]
    fn test_consensus_config_rejects_zero_overlap() {
        let config = ConsensusConfig {
            min_overlap: 0,
            ..ConsensusConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BelowMinimum {
                name: "min_overlap",
                ..
            })
        ));
    }

    #[test]
    fn test_consensus_config_rejects_decay_outside_unit_interval() {
        let config = ConsensusConfig {
            clip_decay_threshold: 1.2,
            ..ConsensusConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_variant_config_rejects_bad_rel_threshold() {
        let config = VariantConfig {
            rel_threshold: -0.01,
            ..VariantConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotAFraction {
                name: "rel_threshold",
                ..
            })
        ));
    }
}
