//! Centralized validation and helper functions.

use thiserror::Error;

/// Rejected configuration values. Raised before any tally work begins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    NotAFraction { name: &'static str, value: f64 },

    #[error("{name} must be at least {min}, got {value}")]
    BelowMinimum {
        name: &'static str,
        value: usize,
        min: usize,
    },
}

/// Check that `value` is a finite number in the closed unit interval.
///
/// # Examples
///
/// ```
/// use clip_consensus::utils::validation::is_fraction;
///
/// assert!(is_fraction(0.0));
/// assert!(is_fraction(1.0));
/// assert!(!is_fraction(1.5));
/// assert!(!is_fraction(f64::NAN));
/// ```
#[must_use]
pub fn is_fraction(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Require a parameter to lie within [0, 1]; never clamps.
///
/// # Errors
///
/// Returns `ConfigError::NotAFraction` naming the parameter.
pub fn require_fraction(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if is_fraction(value) {
        Ok(())
    } else {
        Err(ConfigError::NotAFraction { name, value })
    }
}

/// Require a parameter to be at least `min`.
///
/// # Errors
///
/// Returns `ConfigError::BelowMinimum` naming the parameter.
pub fn require_at_least(name: &'static str, value: usize, min: usize) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::BelowMinimum { name, value, min })
    }
}

/// Convert a count to `f64` for ratios
#[inline]
#[must_use]
pub fn count_to_f64(count: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64
    }
}
