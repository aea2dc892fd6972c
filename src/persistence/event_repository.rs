//! Trade event repository and the SQLite-backed event sink

use super::models::{CreateTradeEvent, TradeEventRecord};
use super::{DatabaseError, DbPool};
use crate::domain::repositories::event_sink::{EventSink, TradeEvent};
use async_trait::async_trait;
use tracing::{debug, error};

/// Trade event repository
pub struct TradeEventRepository {
    pool: DbPool,
}

impl TradeEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append an event
    pub async fn create(&self, event: CreateTradeEvent) -> Result<TradeEventRecord, DatabaseError> {
        let details = serde_json::to_string(&event.details)
            .map_err(|e| DatabaseError::QueryError(format!("Failed to encode details: {}", e)))?;

        let record = sqlx::query_as::<_, TradeEventRecord>(
            r#"
            INSERT INTO trade_events (event_type, order_id, details, timestamp)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING *
            "#,
        )
        .bind(&event.event_type)
        .bind(&event.order_id)
        .bind(details)
        .bind(event.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create trade event: {}", e);
            DatabaseError::QueryError(format!("Failed to create trade event: {}", e))
        })?;

        debug!("Stored {} event #{}", record.event_type, record.id);
        Ok(record)
    }

    /// Most recent events, newest first
    pub async fn get_recent(&self, limit: i64) -> Result<Vec<TradeEventRecord>, DatabaseError> {
        sqlx::query_as::<_, TradeEventRecord>(
            "SELECT * FROM trade_events ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get recent trade events: {}", e);
            DatabaseError::QueryError(format!("Failed to get trade events: {}", e))
        })
    }

    /// All events for one order, oldest first
    pub async fn get_by_order(&self, order_id: &str) -> Result<Vec<TradeEventRecord>, DatabaseError> {
        sqlx::query_as::<_, TradeEventRecord>(
            "SELECT * FROM trade_events WHERE order_id = ?1 ORDER BY timestamp ASC, id ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get events for order {}: {}", order_id, e);
            DatabaseError::QueryError(format!("Failed to get trade events: {}", e))
        })
    }
}

/// Event sink writing every event to `trade_events`
pub struct SqliteEventSink {
    repository: TradeEventRepository,
}

impl SqliteEventSink {
    pub fn new(pool: DbPool) -> Self {
        Self {
            repository: TradeEventRepository::new(pool),
        }
    }

    pub fn repository(&self) -> &TradeEventRepository {
        &self.repository
    }
}

#[async_trait]
impl EventSink for SqliteEventSink {
    async fn record(&self, event: TradeEvent) {
        let details = match serde_json::to_value(&event) {
            Ok(details) => details,
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.kind(), e);
                return;
            }
        };

        let input = CreateTradeEvent {
            event_type: event.kind().to_string(),
            order_id: event.order_id().map(str::to_string),
            details,
            timestamp: event.at(),
        };

        if let Err(e) = self.repository.create(input).await {
            error!("Dropping {} event: {}", event.kind(), e);
        }
    }
}
