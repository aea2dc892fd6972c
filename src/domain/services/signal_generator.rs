//! Confluence scoring of indicator readings into a directional signal
//!
//! Bullish and bearish scores are accumulated independently from RSI, trend
//! alignment, volatility and (optionally) momentum. The side with the strictly
//! higher score wins if it clears the profile's minimum confidence.
//!
//! Generation is split in two so callers can fetch sizing inputs only when
//! needed: [`SignalGenerator::evaluate`] is pure scoring, and
//! [`SignalCandidate::into_signal`] attaches the lot size.

use crate::domain::entities::market_state::MarketState;
use crate::domain::entities::signal::{Direction, Signal};
use crate::domain::services::indicators::IndicatorBundle;
use serde::{Deserialize, Serialize};

/// Scoring constants for one trading style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalProfile {
    pub name: String,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub rsi_midpoint: f64,
    /// Points for RSI beyond oversold/overbought
    pub rsi_extreme_points: f64,
    /// Points for RSI leaning away from the midpoint inside the band
    pub rsi_lean_points: f64,
    /// Require MA20 > MA50 in addition to price > MA5 > MA20
    pub trend_requires_slow_ma: bool,
    pub trend_points: f64,
    pub volatility_floor: f64,
    pub volatility_points: f64,
    /// Momentum percentage beyond which momentum points are awarded
    pub momentum_threshold: f64,
    /// Zero disables the momentum rule
    pub momentum_points: f64,
    pub min_confidence: f64,
    pub stop_atr_multiplier: f64,
    pub target_atr_multiplier: f64,
}

impl SignalProfile {
    /// Slower, higher-conviction scoring
    pub fn conservative() -> Self {
        Self {
            name: "conservative".to_string(),
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            rsi_midpoint: 50.0,
            rsi_extreme_points: 30.0,
            rsi_lean_points: 10.0,
            trend_requires_slow_ma: true,
            trend_points: 25.0,
            volatility_floor: 0.001,
            volatility_points: 10.0,
            momentum_threshold: 0.1,
            momentum_points: 0.0,
            min_confidence: 50.0,
            stop_atr_multiplier: 2.0,
            target_atr_multiplier: 4.0,
        }
    }

    /// Lower thresholds, tighter stops, momentum rule enabled
    pub fn aggressive() -> Self {
        Self {
            name: "aggressive".to_string(),
            rsi_oversold: 40.0,
            rsi_overbought: 60.0,
            rsi_midpoint: 50.0,
            rsi_extreme_points: 40.0,
            rsi_lean_points: 20.0,
            trend_requires_slow_ma: false,
            trend_points: 30.0,
            volatility_floor: 0.001,
            volatility_points: 20.0,
            momentum_threshold: 0.1,
            momentum_points: 15.0,
            min_confidence: 40.0,
            stop_atr_multiplier: 1.5,
            target_atr_multiplier: 3.0,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.rsi_oversold < self.rsi_midpoint && self.rsi_midpoint < self.rsi_overbought) {
            return Err("RSI thresholds must satisfy oversold < midpoint < overbought".to_string());
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err("min_confidence must be in range [0, 100]".to_string());
        }
        if self.stop_atr_multiplier <= 0.0 || self.target_atr_multiplier <= 0.0 {
            return Err("ATR multipliers must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for SignalProfile {
    fn default() -> Self {
        Self::conservative()
    }
}

/// Raw bull/bear score pair
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Scores {
    pub bullish: f64,
    pub bearish: f64,
}

/// A scored direction with levels but no volume yet
#[derive(Debug, Clone, PartialEq)]
pub struct SignalCandidate {
    pub direction: Direction,
    pub confidence: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub reason: String,
}

impl SignalCandidate {
    pub fn none(entry_price: f64) -> Self {
        Self {
            direction: Direction::None,
            confidence: 0.0,
            entry_price,
            stop_loss: 0.0,
            take_profit: 0.0,
            reason: "No signal".to_string(),
        }
    }

    /// Levels at `stop_mult`/`target_mult` ATR from the entry
    fn with_levels(
        direction: Direction,
        confidence: f64,
        entry_price: f64,
        atr: f64,
        stop_mult: f64,
        target_mult: f64,
        reason: String,
    ) -> Self {
        let (stop_loss, take_profit) = match direction {
            Direction::Buy => (entry_price - atr * stop_mult, entry_price + atr * target_mult),
            Direction::Sell => (entry_price + atr * stop_mult, entry_price - atr * target_mult),
            Direction::None => (0.0, 0.0),
        };
        Self {
            direction,
            confidence,
            entry_price,
            stop_loss,
            take_profit,
            reason,
        }
    }

    pub fn is_directional(&self) -> bool {
        self.direction != Direction::None
    }

    /// Attach a volume and build the immutable signal
    ///
    /// A candidate whose levels cannot form a valid order (e.g. zero ATR puts
    /// the stop on the entry) degrades to NONE.
    pub fn into_signal(self, lot_size: f64) -> Signal {
        if !self.is_directional() {
            return Signal::none_with_reason(self.entry_price, self.reason);
        }
        match Signal::directional(
            self.direction,
            self.confidence,
            self.entry_price,
            self.stop_loss,
            self.take_profit,
            lot_size,
            self.reason,
        ) {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!("Discarding {} candidate: {}", self.direction, e);
                Signal::none(self.entry_price)
            }
        }
    }
}

/// Scores indicator bundles according to a `SignalProfile`
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    profile: SignalProfile,
}

impl SignalGenerator {
    pub fn new(profile: SignalProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &SignalProfile {
        &self.profile
    }

    /// Accumulate bullish and bearish points
    pub fn score(&self, bundle: &IndicatorBundle, market: &MarketState) -> Scores {
        let p = &self.profile;
        let mut scores = Scores::default();
        let rsi = bundle.rsi;

        // RSI
        if rsi < p.rsi_oversold {
            scores.bullish += p.rsi_extreme_points;
        } else if rsi > p.rsi_overbought {
            scores.bearish += p.rsi_extreme_points;
        } else if rsi > p.rsi_midpoint {
            scores.bullish += p.rsi_lean_points;
        } else if rsi < p.rsi_midpoint {
            scores.bearish += p.rsi_lean_points;
        }

        // Trend alignment
        let price = bundle.current_price;
        let (fast, medium, slow) = (bundle.ma_fast, bundle.ma_medium, bundle.ma_slow);
        let bull_aligned = price > fast && fast > medium && (!p.trend_requires_slow_ma || medium > slow);
        let bear_aligned = price < fast && fast < medium && (!p.trend_requires_slow_ma || medium < slow);
        if bull_aligned {
            scores.bullish += p.trend_points;
        } else if bear_aligned {
            scores.bearish += p.trend_points;
        }

        // Volatility lifts both sides
        if bundle.atr > p.volatility_floor {
            scores.bullish += p.volatility_points;
            scores.bearish += p.volatility_points;
        }

        if p.momentum_points > 0.0 {
            if market.momentum > p.momentum_threshold {
                scores.bullish += p.momentum_points;
            } else if market.momentum < -p.momentum_threshold {
                scores.bearish += p.momentum_points;
            }
        }

        scores
    }

    /// Pick a direction and compute stop/target levels
    pub fn evaluate(&self, bundle: &IndicatorBundle, market: &MarketState) -> SignalCandidate {
        let scores = self.score(bundle, market);
        let p = &self.profile;
        let price = bundle.current_price;

        let (direction, score, label) = if scores.bullish > scores.bearish && scores.bullish >= p.min_confidence {
            (Direction::Buy, scores.bullish, "Bullish")
        } else if scores.bearish > scores.bullish && scores.bearish >= p.min_confidence {
            (Direction::Sell, scores.bearish, "Bearish")
        } else {
            tracing::debug!(
                "No signal: bull {:.1} / bear {:.1} (min {:.1})",
                scores.bullish,
                scores.bearish,
                p.min_confidence
            );
            return SignalCandidate::none(price);
        };

        let confidence = score.min(100.0);
        let reason = format!("{} signal (RSI: {:.1}, Score: {:.1})", label, bundle.rsi, score);
        SignalCandidate::with_levels(
            direction,
            confidence,
            price,
            bundle.atr,
            p.stop_atr_multiplier,
            p.target_atr_multiplier,
            reason,
        )
    }

    /// Score and size in one step
    ///
    /// `size` receives `(stop_loss, entry_price)` and is only called for a
    /// directional candidate.
    pub fn generate<F>(&self, bundle: &IndicatorBundle, market: &MarketState, size: F) -> Signal
    where
        F: FnOnce(f64, f64) -> f64,
    {
        let candidate = self.evaluate(bundle, market);
        if !candidate.is_directional() {
            return candidate.into_signal(0.0);
        }
        let lot = size(candidate.stop_loss, candidate.entry_price);
        candidate.into_signal(lot)
    }
}

/// Fixed-confidence fast signal checked on the turbo cadence
pub const TURBO_CONFIDENCE: f64 = 60.0;
pub const TURBO_RSI_BUY_BELOW: f64 = 45.0;
pub const TURBO_RSI_SELL_ABOVE: f64 = 55.0;

/// Evaluate the turbo rule: RSI lean confirmed by momentum sign
pub fn turbo_candidate(bundle: &IndicatorBundle, market: &MarketState) -> SignalCandidate {
    let price = bundle.current_price;
    if bundle.rsi < TURBO_RSI_BUY_BELOW && market.momentum > 0.0 {
        SignalCandidate::with_levels(
            Direction::Buy,
            TURBO_CONFIDENCE,
            price,
            bundle.atr,
            1.0,
            2.0,
            format!("Turbo buy (RSI: {:.1})", bundle.rsi),
        )
    } else if bundle.rsi > TURBO_RSI_SELL_ABOVE && market.momentum < 0.0 {
        SignalCandidate::with_levels(
            Direction::Sell,
            TURBO_CONFIDENCE,
            price,
            bundle.atr,
            1.0,
            2.0,
            format!("Turbo sell (RSI: {:.1})", bundle.rsi),
        )
    } else {
        SignalCandidate::none(price)
    }
}
