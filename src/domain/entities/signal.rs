use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional call produced by a signal source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    None,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
            Direction::None => write!(f, "NONE"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Direction::Buy),
            "SELL" => Ok(Direction::Sell),
            "NONE" | "HOLD" | "" => Ok(Direction::None),
            other => Err(format!("Unknown direction: {}", other)),
        }
    }
}

/// A trade decision for one cycle
///
/// Fields are private so a `Signal` cannot be mutated after construction; a
/// NONE signal always carries a zero lot size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    direction: Direction,
    confidence: f64,
    entry_price: f64,
    stop_loss: f64,
    take_profit: f64,
    lot_size: f64,
    reason: String,
}

impl Signal {
    /// A "no trade" signal at the given price
    pub fn none(entry_price: f64) -> Self {
        Self::none_with_reason(entry_price, "No signal")
    }

    pub fn none_with_reason(entry_price: f64, reason: impl Into<String>) -> Self {
        Signal {
            direction: Direction::None,
            confidence: 0.0,
            entry_price,
            stop_loss: 0.0,
            take_profit: 0.0,
            lot_size: 0.0,
            reason: reason.into(),
        }
    }

    /// A directional signal
    ///
    /// # Errors
    /// Returns an error if direction is NONE, the lot size is not positive,
    /// confidence is outside 0-100, or the stop/target sit on the wrong side
    /// of the entry.
    pub fn directional(
        direction: Direction,
        confidence: f64,
        entry_price: f64,
        stop_loss: f64,
        take_profit: f64,
        lot_size: f64,
        reason: impl Into<String>,
    ) -> Result<Self, String> {
        if direction == Direction::None {
            return Err("Use Signal::none for a NONE direction".to_string());
        }
        if !(0.0..=100.0).contains(&confidence) {
            return Err(format!("Confidence {} outside 0-100", confidence));
        }
        if !(lot_size.is_finite() && lot_size > 0.0) {
            return Err(format!("Lot size must be positive, got {}", lot_size));
        }
        if entry_price <= 0.0 {
            return Err("Entry price must be positive".to_string());
        }
        let sides_ok = match direction {
            Direction::Buy => stop_loss < entry_price && take_profit > entry_price,
            Direction::Sell => stop_loss > entry_price && take_profit < entry_price,
            Direction::None => false,
        };
        if !sides_ok {
            return Err(format!(
                "{} stop {:.5} / target {:.5} inconsistent with entry {:.5}",
                direction, stop_loss, take_profit, entry_price
            ));
        }

        Ok(Signal {
            direction,
            confidence,
            entry_price,
            stop_loss,
            take_profit,
            lot_size,
            reason: reason.into(),
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn stop_loss(&self) -> f64 {
        self.stop_loss
    }

    pub fn take_profit(&self) -> f64 {
        self.take_profit
    }

    pub fn lot_size(&self) -> f64 {
        self.lot_size
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Whether this signal should reach the executor
    pub fn is_actionable(&self) -> bool {
        self.direction != Direction::None && self.lot_size > 0.0
    }
}
