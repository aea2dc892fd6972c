use crate::domain::services::indicators::IndicatorBundle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trend regime; exactly one holds at any time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Range,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Up => write!(f, "UPTREND"),
            Trend::Down => write!(f, "DOWNTREND"),
            Trend::Range => write!(f, "RANGE"),
        }
    }
}

/// Derived market flags, overwritten once per analysis cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    trend: Trend,
    pub volatility: f64,
    pub momentum: f64,
    pub strength: f64,
    pub opportunity: f64,
}

impl MarketState {
    pub fn new() -> Self {
        Self {
            trend: Trend::Range,
            volatility: 0.0,
            momentum: 0.0,
            strength: 0.0,
            opportunity: 0.0,
        }
    }

    /// Overwrite every field from the latest indicator bundle
    pub fn update(&mut self, bundle: &IndicatorBundle) {
        let price = bundle.current_price;
        let ma20 = bundle.ma_medium;
        let ma50 = bundle.ma_slow;

        self.trend = if price > ma20 && ma20 > ma50 {
            Trend::Up
        } else if price < ma20 && ma20 < ma50 {
            Trend::Down
        } else {
            Trend::Range
        };

        self.volatility = bundle.atr;
        self.momentum = if ma20 != 0.0 {
            (price - ma20) / ma20 * 100.0
        } else {
            0.0
        };
        self.strength = self.momentum.abs();
        // Unbounded heuristic, display only
        self.opportunity = self.strength * (self.volatility * 1000.0);
    }

    pub fn trend(&self) -> Trend {
        self.trend
    }

    pub fn in_uptrend(&self) -> bool {
        self.trend == Trend::Up
    }

    pub fn in_downtrend(&self) -> bool {
        self.trend == Trend::Down
    }

    pub fn in_range(&self) -> bool {
        self.trend == Trend::Range
    }
}

impl Default for MarketState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(price: f64, ma20: f64, ma50: f64, atr: f64) -> IndicatorBundle {
        IndicatorBundle {
            current_price: price,
            ma_fast: price,
            ma_medium: ma20,
            ma_slow: ma50,
            rsi: 50.0,
            atr,
        }
    }

    fn exactly_one(state: &MarketState) -> bool {
        [state.in_uptrend(), state.in_downtrend(), state.in_range()]
            .iter()
            .filter(|flag| **flag)
            .count()
            == 1
    }

    #[test]
    fn test_uptrend() {
        let mut state = MarketState::new();
        state.update(&bundle(2010.0, 2000.0, 1990.0, 2.0));
        assert!(state.in_uptrend());
        assert!(exactly_one(&state));
        assert!((state.momentum - 0.5).abs() < 1e-9);
        assert!((state.opportunity - 0.5 * 2000.0).abs() < 1e-6);
    }

    #[test]
    fn test_downtrend() {
        let mut state = MarketState::new();
        state.update(&bundle(1990.0, 2000.0, 2010.0, 1.0));
        assert!(state.in_downtrend());
        assert!(exactly_one(&state));
        assert!(state.momentum < 0.0);
        assert_eq!(state.strength, state.momentum.abs());
    }

    #[test]
    fn test_range_when_mixed() {
        let mut state = MarketState::new();
        state.update(&bundle(2010.0, 2000.0, 2005.0, 1.0));
        assert!(state.in_range());
        assert!(exactly_one(&state));
    }

    #[test]
    fn test_exactly_one_flag_over_grid() {
        let mut state = MarketState::new();
        for price in [1990.0, 2000.0, 2010.0] {
            for ma20 in [1990.0, 2000.0, 2010.0] {
                for ma50 in [1990.0, 2000.0, 2010.0] {
                    state.update(&bundle(price, ma20, ma50, 1.0));
                    assert!(exactly_one(&state), "{} {} {}", price, ma20, ma50);
                }
            }
        }
    }

    #[test]
    fn test_zero_ma_has_zero_momentum() {
        let mut state = MarketState::new();
        state.update(&bundle(0.0, 0.0, 0.0, 0.001));
        assert_eq!(state.momentum, 0.0);
        assert!(state.in_range());
    }

    #[test]
    fn test_update_overwrites_previous() {
        let mut state = MarketState::new();
        state.update(&bundle(2010.0, 2000.0, 1990.0, 2.0));
        state.update(&bundle(2000.0, 2000.0, 2000.0, 0.0));
        assert!(state.in_range());
        assert_eq!(state.volatility, 0.0);
        assert_eq!(state.opportunity, 0.0);
    }
}
