//! Database Models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Trade event row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TradeEventRecord {
    pub id: i64,
    pub event_type: String,
    pub order_id: Option<String>,
    pub details: String, // JSON string
    pub timestamp: DateTime<Utc>,
}

/// Create trade event input
#[derive(Debug, Clone)]
pub struct CreateTradeEvent {
    pub event_type: String,
    pub order_id: Option<String>,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
