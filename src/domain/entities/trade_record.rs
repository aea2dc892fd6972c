//! Trade records and the session's active-trade table

use crate::domain::entities::signal::Signal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Active,
    Closed,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::Active => write!(f, "ACTIVE"),
            TradeStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Settled result of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    Win,
    Loss,
}

impl TradeOutcome {
    /// Classify a realized profit; break-even counts as a loss
    pub fn from_profit(profit: f64) -> Self {
        if profit > 0.0 {
            TradeOutcome::Win
        } else {
            TradeOutcome::Loss
        }
    }
}

/// An executed order tracked until it settles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Broker-assigned order id
    pub id: String,
    pub signal: Signal,
    pub volume: f64,
    /// Fill price reported by the quote at submission
    pub fill_price: f64,
    pub timestamp: DateTime<Utc>,
    pub status: TradeStatus,
    pub result: Option<TradeOutcome>,
    pub profit: Option<f64>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl TradeRecord {
    pub fn open(
        id: String,
        signal: Signal,
        volume: f64,
        fill_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            signal,
            volume,
            fill_price,
            timestamp,
            status: TradeStatus::Active,
            result: None,
            profit: None,
            closed_at: None,
        }
    }

    /// Transition ACTIVE -> CLOSED
    ///
    /// # Errors
    /// Returns an error if the trade is already closed
    pub fn close(&mut self, profit: f64, closed_at: DateTime<Utc>) -> Result<TradeOutcome, String> {
        if self.status == TradeStatus::Closed {
            return Err(format!("Trade {} already closed", self.id));
        }
        let outcome = TradeOutcome::from_profit(profit);
        self.status = TradeStatus::Closed;
        self.result = Some(outcome);
        self.profit = Some(profit);
        self.closed_at = Some(closed_at);
        Ok(outcome)
    }
}

/// Trades awaiting settlement, keyed by order id
#[derive(Debug, Default, Clone)]
pub struct ActiveTrades {
    trades: BTreeMap<String, TradeRecord>,
}

impl ActiveTrades {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: TradeRecord) {
        self.trades.insert(record.id.clone(), record);
    }

    pub fn remove(&mut self, id: &str) -> Option<TradeRecord> {
        self.trades.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&TradeRecord> {
        self.trades.get(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.trades.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TradeRecord> {
        self.trades.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::signal::Direction;

    fn record(id: &str) -> TradeRecord {
        let signal =
            Signal::directional(Direction::Buy, 60.0, 2000.0, 1996.0, 2008.0, 0.1, "test").unwrap();
        TradeRecord::open(id.to_string(), signal, 0.1, 2000.5, Utc::now())
    }

    #[test]
    fn test_open_is_active() {
        let trade = record("1");
        assert_eq!(trade.status, TradeStatus::Active);
        assert!(trade.result.is_none());
    }

    #[test]
    fn test_close_transitions_once() {
        let mut trade = record("1");
        let outcome = trade.close(42.0, Utc::now()).unwrap();
        assert_eq!(outcome, TradeOutcome::Win);
        assert_eq!(trade.status, TradeStatus::Closed);
        assert!(trade.close(1.0, Utc::now()).is_err());
    }

    #[test]
    fn test_break_even_is_loss() {
        assert_eq!(TradeOutcome::from_profit(0.0), TradeOutcome::Loss);
        assert_eq!(TradeOutcome::from_profit(-5.0), TradeOutcome::Loss);
    }

    #[test]
    fn test_active_table() {
        let mut table = ActiveTrades::new();
        table.insert(record("b"));
        table.insert(record("a"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.ids(), vec!["a".to_string(), "b".to_string()]);
        assert!(table.remove("a").is_some());
        assert!(table.get("a").is_none());
        assert_eq!(table.len(), 1);
    }
}
