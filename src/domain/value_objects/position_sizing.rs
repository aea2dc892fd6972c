//! Position sizing settings and decision value objects

use serde::{Deserialize, Serialize};

/// Risk and escalation settings consumed by the position sizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSettings {
    /// Percentage of balance risked per trade (e.g. 5.0 for 5%)
    pub risk_percentage: f64,
    /// Upper bound for the progressive escalation
    pub max_risk_percentage: f64,
    /// Enable risk escalation on a loss streak
    pub enable_progressive_risk: bool,
    /// Escalation starts once consecutive losses exceed this count
    pub progressive_threshold: u32,
    /// Fraction added to the risk percentage per consecutive loss
    pub progressive_step: f64,
    /// Enable martingale stake multiplication
    pub enable_martingale: bool,
    /// Base of the martingale power
    pub martingale_multiplier: f64,
    /// Enable the fixed volume booster
    pub enable_volume_booster: bool,
    /// Booster factor applied on top of everything else
    pub volume_multiplier: f64,
    /// Monetary value of one price point per contract unit
    pub point_value: f64,
    /// Contract units per lot (100 oz for gold)
    pub contract_size: f64,
    /// Volume returned when broker constraints are unavailable
    pub platform_min_volume: f64,
}

impl RiskSettings {
    /// Validate this configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.risk_percentage > 0.0 && self.risk_percentage <= 100.0) {
            return Err("risk_percentage must be in range (0, 100]".to_string());
        }
        if self.max_risk_percentage < self.risk_percentage || self.max_risk_percentage > 100.0 {
            return Err("max_risk_percentage must be in range [risk_percentage, 100]".to_string());
        }
        if self.progressive_step < 0.0 {
            return Err("progressive_step must be non-negative".to_string());
        }
        if self.martingale_multiplier < 1.0 {
            return Err("martingale_multiplier must be >= 1.0".to_string());
        }
        if self.volume_multiplier < 1.0 {
            return Err("volume_multiplier must be >= 1.0".to_string());
        }
        if self.point_value <= 0.0 || self.contract_size <= 0.0 {
            return Err("point_value and contract_size must be positive".to_string());
        }
        if self.platform_min_volume <= 0.0 {
            return Err("platform_min_volume must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            risk_percentage: 5.0,
            max_risk_percentage: 10.0,
            enable_progressive_risk: true,
            progressive_threshold: 2,
            progressive_step: 0.3,
            enable_martingale: false,
            martingale_multiplier: 2.0,
            enable_volume_booster: false,
            volume_multiplier: 1.0,
            point_value: 1.0,
            contract_size: 100.0,
            platform_min_volume: 0.01,
        }
    }
}

/// Result of a position sizing calculation
#[derive(Debug, Clone, PartialEq)]
pub struct SizingDecision {
    /// Final broker-valid volume
    pub volume: f64,
    /// Risk percentage after progressive escalation
    pub risk_percent: f64,
    /// Martingale multiplier applied
    pub multiplier: f64,
    /// Volume booster applied
    pub booster: f64,
    /// Volume before clamping and step snapping
    pub raw_volume: f64,
    /// Whether clamping changed the raw volume's band
    pub clamped: bool,
    /// Whether the platform minimum was returned because inputs were unavailable
    pub fallback: bool,
}

impl SizingDecision {
    /// Conservative decision used when broker constraints cannot be fetched
    pub fn fallback(platform_min_volume: f64) -> Self {
        Self {
            volume: platform_min_volume,
            risk_percent: 0.0,
            multiplier: 1.0,
            booster: 1.0,
            raw_volume: platform_min_volume,
            clamped: false,
            fallback: true,
        }
    }
}
