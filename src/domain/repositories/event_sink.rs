//! Append-only telemetry for trade and error events
//!
//! Sinks are fire-and-forget: `record` never returns an error to the caller.
//! Implementations log their own failures.

use crate::domain::entities::signal::Direction;
use crate::domain::entities::trade_record::TradeOutcome;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TradeEvent {
    TradeOpened {
        order_id: String,
        symbol: String,
        direction: Direction,
        volume: f64,
        price: f64,
        confidence: f64,
        at: DateTime<Utc>,
    },
    TradeClosed {
        order_id: String,
        outcome: TradeOutcome,
        profit: f64,
        at: DateTime<Utc>,
    },
    CycleError {
        code: String,
        severity: String,
        message: String,
        at: DateTime<Utc>,
    },
}

impl TradeEvent {
    /// Stable name used as the persisted event type
    pub fn kind(&self) -> &'static str {
        match self {
            TradeEvent::TradeOpened { .. } => "trade_opened",
            TradeEvent::TradeClosed { .. } => "trade_closed",
            TradeEvent::CycleError { .. } => "cycle_error",
        }
    }

    pub fn order_id(&self) -> Option<&str> {
        match self {
            TradeEvent::TradeOpened { order_id, .. } | TradeEvent::TradeClosed { order_id, .. } => {
                Some(order_id)
            }
            TradeEvent::CycleError { .. } => None,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            TradeEvent::TradeOpened { at, .. }
            | TradeEvent::TradeClosed { at, .. }
            | TradeEvent::CycleError { at, .. } => *at,
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, event: TradeEvent);
}

/// Sink that only writes events to the tracing log
#[derive(Debug, Default, Clone)]
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn record(&self, event: TradeEvent) {
        match &event {
            TradeEvent::TradeOpened {
                order_id,
                direction,
                volume,
                price,
                ..
            } => tracing::info!(
                "Trade opened: {} {} {:.2} @ {:.2}",
                order_id,
                direction,
                volume,
                price
            ),
            TradeEvent::TradeClosed {
                order_id,
                outcome,
                profit,
                ..
            } => tracing::info!("Trade closed: {} {:?} ({:.2})", order_id, outcome, profit),
            TradeEvent::CycleError {
                code,
                severity,
                message,
                ..
            } => tracing::warn!("[{}] {}: {}", severity, code, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_and_serde_tag() {
        let event = TradeEvent::TradeClosed {
            order_id: "42".to_string(),
            outcome: TradeOutcome::Win,
            profit: 12.5,
            at: Utc::now(),
        };
        assert_eq!(event.kind(), "trade_closed");
        assert_eq!(event.order_id(), Some("42"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "trade_closed");
        assert_eq!(json["outcome"], "win");
    }

    #[tokio::test]
    async fn test_log_sink_accepts_events() {
        let sink = LogEventSink;
        sink.record(TradeEvent::CycleError {
            code: "ERR_FATAL".to_string(),
            severity: "CRITICAL".to_string(),
            message: "boom".to_string(),
            at: Utc::now(),
        })
        .await;
    }
}
