use crate::domain::entities::trade_record::TradeOutcome;
use serde::{Deserialize, Serialize};

/// Win/loss streak counters driving sizing escalation
///
/// Lives for the process lifetime only; a restart begins from zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    pub consecutive_wins: u32,
    pub consecutive_losses: u32,
    pub current_multiplier: f64,
    pub total_trades: u64,
    pub winning_trades: u64,
}

impl RiskState {
    pub fn new() -> Self {
        Self {
            consecutive_wins: 0,
            consecutive_losses: 0,
            current_multiplier: 1.0,
            total_trades: 0,
            winning_trades: 0,
        }
    }

    /// Count an acknowledged order
    pub fn record_execution(&mut self) {
        self.total_trades += 1;
    }

    /// Apply a settled outcome to the streak counters
    pub fn record_outcome(&mut self, outcome: TradeOutcome) {
        match outcome {
            TradeOutcome::Win => {
                self.winning_trades += 1;
                self.consecutive_wins += 1;
                self.consecutive_losses = 0;
            }
            TradeOutcome::Loss => {
                self.consecutive_losses += 1;
                self.consecutive_wins = 0;
            }
        }
    }

    /// Percentage of executed trades that settled as wins
    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            self.winning_trades as f64 / self.total_trades as f64 * 100.0
        }
    }
}

impl Default for RiskState {
    fn default() -> Self {
        Self::new()
    }
}
