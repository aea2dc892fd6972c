//! Position sizing service that turns a stop distance into a broker-valid volume
//!
//! This service implements fixed-fractional sizing that respects:
//! - The configured risk percentage of the account balance
//! - Progressive risk escalation and martingale on a loss streak
//! - An optional fixed volume booster
//! - Broker volume constraints (min/max/step)
//!
//! The sizer is pure: it reads `RiskState` but never writes it. The session
//! stores the returned multiplier back into `RiskState::current_multiplier`.

use crate::domain::entities::risk_state::RiskState;
use crate::domain::value_objects::position_sizing::{RiskSettings, SizingDecision};
use crate::domain::value_objects::symbol_constraints::SymbolConstraints;

/// PositionSizer service for calculating order volumes
#[derive(Debug, Clone)]
pub struct PositionSizer {
    settings: RiskSettings,
}

impl PositionSizer {
    /// Create a new PositionSizer instance
    pub fn new(settings: RiskSettings) -> Self {
        Self { settings }
    }

    /// Risk percentage after progressive escalation
    pub fn effective_risk_percent(&self, risk_state: &RiskState) -> f64 {
        let base = self.settings.risk_percentage;
        let losses = risk_state.consecutive_losses;
        if self.settings.enable_progressive_risk && losses > self.settings.progressive_threshold {
            let escalated = base * (1.0 + losses as f64 * self.settings.progressive_step);
            escalated.min(self.settings.max_risk_percentage)
        } else {
            base
        }
    }

    /// Martingale multiplier for the current loss streak
    pub fn martingale_multiplier(&self, risk_state: &RiskState) -> f64 {
        let losses = risk_state.consecutive_losses;
        if self.settings.enable_martingale && losses > 0 {
            let exponent = i32::try_from(losses).unwrap_or(i32::MAX);
            self.settings.martingale_multiplier.powi(exponent)
        } else {
            1.0
        }
    }

    fn booster(&self) -> f64 {
        if self.settings.enable_volume_booster {
            self.settings.volume_multiplier
        } else {
            1.0
        }
    }

    /// Size a position from the stop distance and account balance
    ///
    /// A missing balance or missing broker constraints yields exactly the
    /// platform minimum volume with `fallback` set; nothing is raised.
    ///
    /// # Arguments
    /// * `stop_loss` - Protective stop price
    /// * `entry_price` - Expected fill price
    /// * `balance` - Account balance, if it could be fetched
    /// * `risk_state` - Current streak counters
    /// * `constraints` - Broker volume limits, if they could be fetched
    pub fn size_position(
        &self,
        stop_loss: f64,
        entry_price: f64,
        balance: Option<f64>,
        risk_state: &RiskState,
        constraints: Option<&SymbolConstraints>,
    ) -> SizingDecision {
        let (balance, constraints) = match (balance, constraints) {
            (Some(balance), Some(constraints)) => (balance, constraints),
            _ => {
                tracing::warn!(
                    "Sizing inputs unavailable, using platform minimum {}",
                    self.settings.platform_min_volume
                );
                return SizingDecision::fallback(self.settings.platform_min_volume);
            }
        };

        let risk_percent = self.effective_risk_percent(risk_state);
        let multiplier = self.martingale_multiplier(risk_state);
        let booster = self.booster();

        let risk_amount = balance * risk_percent / 100.0 * multiplier * booster;
        let stop_distance = (entry_price - stop_loss).abs();

        let raw_volume = if stop_distance > 0.0 && stop_distance.is_finite() {
            risk_amount / (stop_distance * self.settings.point_value * self.settings.contract_size)
        } else {
            tracing::debug!("Zero stop distance, sizing at broker minimum");
            constraints.volume_min
        };

        let volume = constraints.clamp_volume(raw_volume);
        let clamped = !constraints.contains(raw_volume);

        tracing::debug!(
            "Sized {:.2} lots (raw {:.4}, risk {:.2}%, x{:.2}, booster x{:.2})",
            volume,
            raw_volume,
            risk_percent,
            multiplier,
            booster
        );

        SizingDecision {
            volume,
            risk_percent,
            multiplier,
            booster,
            raw_volume,
            clamped,
            fallback: false,
        }
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self::new(RiskSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn losses(n: u32) -> RiskState {
        RiskState {
            consecutive_losses: n,
            ..RiskState::new()
        }
    }

    #[test]
    fn test_basic_sizing() {
        let sizer = PositionSizer::default();
        let constraints = SymbolConstraints::default();
        // 10_000 * 5% = 500; 500 / (5.0 * 1.0 * 100) = 1.0
        let decision =
            sizer.size_position(1995.0, 2000.0, Some(10_000.0), &RiskState::new(), Some(&constraints));
        assert!((decision.volume - 1.0).abs() < 1e-9);
        assert_eq!(decision.risk_percent, 5.0);
        assert_eq!(decision.multiplier, 1.0);
        assert!(!decision.clamped);
        assert!(!decision.fallback);
    }

    #[test]
    fn test_progressive_kicks_in_above_threshold() {
        let sizer = PositionSizer::default();
        assert_eq!(sizer.effective_risk_percent(&losses(2)), 5.0);
        // 5 * (1 + 3 * 0.3) = 9.5
        assert!((sizer.effective_risk_percent(&losses(3)) - 9.5).abs() < 1e-9);
        // capped at 10
        assert_eq!(sizer.effective_risk_percent(&losses(6)), 10.0);
    }

    #[test]
    fn test_martingale_power() {
        let sizer = PositionSizer::new(RiskSettings {
            enable_martingale: true,
            martingale_multiplier: 2.0,
            ..RiskSettings::default()
        });
        assert_eq!(sizer.martingale_multiplier(&losses(0)), 1.0);
        assert_eq!(sizer.martingale_multiplier(&losses(3)), 8.0);
    }

    #[test]
    fn test_martingale_disabled_is_one() {
        let sizer = PositionSizer::default();
        assert_eq!(sizer.martingale_multiplier(&losses(5)), 1.0);
    }

    #[test]
    fn test_clamped_to_max() {
        let sizer = PositionSizer::default();
        let constraints = SymbolConstraints::default();
        let decision =
            sizer.size_position(1999.9, 2000.0, Some(1_000_000.0), &RiskState::new(), Some(&constraints));
        assert_eq!(decision.volume, 10.0);
        assert!(decision.clamped);
    }

    #[test]
    fn test_tiny_balance_clamped_to_min() {
        let sizer = PositionSizer::default();
        let constraints = SymbolConstraints::default();
        let decision =
            sizer.size_position(1900.0, 2000.0, Some(10.0), &RiskState::new(), Some(&constraints));
        assert_eq!(decision.volume, 0.01);
        assert!(decision.clamped);
    }

    #[test]
    fn test_zero_stop_distance_uses_broker_min() {
        let sizer = PositionSizer::default();
        let constraints = SymbolConstraints::new(0.05, 5.0, 0.01, 0.3).unwrap();
        let decision =
            sizer.size_position(2000.0, 2000.0, Some(10_000.0), &RiskState::new(), Some(&constraints));
        assert_eq!(decision.volume, 0.05);
        assert!(!decision.fallback);
    }

    #[test]
    fn test_missing_constraints_falls_back() {
        let sizer = PositionSizer::default();
        let decision = sizer.size_position(1995.0, 2000.0, Some(10_000.0), &RiskState::new(), None);
        assert_eq!(decision.volume, 0.01);
        assert!(decision.fallback);
    }

    #[test]
    fn test_missing_balance_falls_back() {
        let sizer = PositionSizer::default();
        let constraints = SymbolConstraints::default();
        let decision = sizer.size_position(1995.0, 2000.0, None, &RiskState::new(), Some(&constraints));
        assert_eq!(decision.volume, 0.01);
        assert!(decision.fallback);
    }

    #[test]
    fn test_booster_applies() {
        let sizer = PositionSizer::new(RiskSettings {
            enable_volume_booster: true,
            volume_multiplier: 1.5,
            ..RiskSettings::default()
        });
        let constraints = SymbolConstraints::default();
        let decision =
            sizer.size_position(1995.0, 2000.0, Some(10_000.0), &RiskState::new(), Some(&constraints));
        assert!((decision.volume - 1.5).abs() < 1e-9);
        assert_eq!(decision.booster, 1.5);
    }

    #[test]
    fn test_monotonic_in_losses() {
        let sizer = PositionSizer::new(RiskSettings {
            enable_martingale: true,
            martingale_multiplier: 1.5,
            ..RiskSettings::default()
        });
        let constraints = SymbolConstraints::default();
        let mut previous = 0.0;
        for n in 0..10 {
            let decision =
                sizer.size_position(1990.0, 2000.0, Some(5_000.0), &losses(n), Some(&constraints));
            assert!(decision.volume >= previous, "losses={}", n);
            assert!(constraints.contains(decision.volume));
            previous = decision.volume;
        }
    }

    #[test]
    fn test_monotonic_through_multiplier_overflow() {
        let sizer = PositionSizer::new(RiskSettings {
            enable_martingale: true,
            martingale_multiplier: 5.0,
            ..RiskSettings::default()
        });
        let constraints = SymbolConstraints::default();
        let mut previous = 0.0;
        for n in [0, 10, 100, 440, 10_000, u32::MAX] {
            let decision =
                sizer.size_position(1990.0, 2000.0, Some(5_000.0), &losses(n), Some(&constraints));
            assert!(decision.volume >= previous, "volume dropped at losses={}", n);
            previous = decision.volume;
        }
        assert_eq!(previous, constraints.volume_max);
        assert!(sizer.martingale_multiplier(&losses(u32::MAX)).is_infinite());
    }
}
