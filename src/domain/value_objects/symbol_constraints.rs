//! Broker-side volume constraints for a traded symbol

use serde::{Deserialize, Serialize};

/// Volume limits and spread reported by the broker for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolConstraints {
    /// Smallest volume the broker accepts
    pub volume_min: f64,
    /// Largest volume the broker accepts
    pub volume_max: f64,
    /// Volume increment
    pub volume_step: f64,
    /// Current spread in points
    pub spread: f64,
}

impl SymbolConstraints {
    /// Create constraints with validation
    ///
    /// # Errors
    /// Returns an error if min is not positive, max < min or step is not positive
    pub fn new(volume_min: f64, volume_max: f64, volume_step: f64, spread: f64) -> Result<Self, String> {
        if !(volume_min.is_finite() && volume_max.is_finite() && volume_step.is_finite()) {
            return Err("volume constraints must be finite".to_string());
        }
        if volume_min <= 0.0 {
            return Err("volume_min must be positive".to_string());
        }
        if volume_max < volume_min {
            return Err("volume_max must be >= volume_min".to_string());
        }
        if volume_step <= 0.0 {
            return Err("volume_step must be positive".to_string());
        }
        Ok(Self {
            volume_min,
            volume_max,
            volume_step,
            spread,
        })
    }

    /// Clamp a raw volume into [min, max] and snap it to the nearest step
    ///
    /// NaN or non-positive input yields the minimum volume; an overflowed
    /// (infinite) volume saturates at the maximum.
    pub fn clamp_volume(&self, raw: f64) -> f64 {
        if raw.is_nan() || raw <= 0.0 {
            return self.volume_min;
        }
        if raw == f64::INFINITY {
            return self.volume_max;
        }
        let clamped = raw.clamp(self.volume_min, self.volume_max);
        let snapped = (clamped / self.volume_step).round() * self.volume_step;
        // Snapping can push a value just outside the band
        let bounded = snapped.clamp(self.volume_min, self.volume_max);
        (bounded * 1e8).round() / 1e8
    }

    /// Whether a volume lies inside the broker band
    pub fn contains(&self, volume: f64) -> bool {
        volume >= self.volume_min && volume <= self.volume_max
    }
}

impl Default for SymbolConstraints {
    /// Typical retail gold contract limits
    fn default() -> Self {
        Self {
            volume_min: 0.01,
            volume_max: 10.0,
            volume_step: 0.01,
            spread: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_inverted_band() {
        assert!(SymbolConstraints::new(1.0, 0.5, 0.01, 0.0).is_err());
    }

    #[test]
    fn test_new_rejects_zero_step() {
        assert!(SymbolConstraints::new(0.01, 10.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_clamp_below_min() {
        let constraints = SymbolConstraints::default();
        assert_eq!(constraints.clamp_volume(0.001), 0.01);
    }

    #[test]
    fn test_clamp_above_max() {
        let constraints = SymbolConstraints::default();
        assert_eq!(constraints.clamp_volume(250.0), 10.0);
    }

    #[test]
    fn test_snap_to_step() {
        let constraints = SymbolConstraints::default();
        assert_eq!(constraints.clamp_volume(0.256), 0.26);
        assert_eq!(constraints.clamp_volume(1.234), 1.23);
    }

    #[test]
    fn test_snap_with_coarse_step() {
        let constraints = SymbolConstraints::new(0.1, 5.0, 0.1, 0.0).unwrap();
        assert_eq!(constraints.clamp_volume(0.34), 0.3);
        assert_eq!(constraints.clamp_volume(4.99), 5.0);
    }

    #[test]
    fn test_non_finite_gives_min() {
        let constraints = SymbolConstraints::default();
        assert_eq!(constraints.clamp_volume(f64::NAN), 0.01);
        assert_eq!(constraints.clamp_volume(-3.0), 0.01);
        assert_eq!(constraints.clamp_volume(f64::NEG_INFINITY), 0.01);
    }

    #[test]
    fn test_infinite_saturates_at_max() {
        let constraints = SymbolConstraints::default();
        assert_eq!(constraints.clamp_volume(f64::INFINITY), 10.0);
    }

    #[test]
    fn test_contains() {
        let constraints = SymbolConstraints::default();
        assert!(constraints.contains(0.01));
        assert!(constraints.contains(10.0));
        assert!(!constraints.contains(10.01));
    }
}
