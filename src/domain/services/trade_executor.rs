//! TradeExecutor service - turns an actionable signal into a broker order
//!
//! The executor never retries: a failed submission is reported and the next
//! cycle re-evaluates from scratch.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::entities::order::{OrderRequest, OrderSide};
use crate::domain::entities::risk_state::RiskState;
use crate::domain::entities::signal::Signal;
use crate::domain::entities::trade_record::TradeRecord;
use crate::domain::errors::BotError;
use crate::domain::repositories::broker_client::{with_timeout, BrokerClient};

/// Order execution configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub symbol: String,
    pub magic: u64,
    pub comment: String,
    /// Open positions on the symbol at or above which new orders are skipped
    pub max_open_positions: usize,
    /// Zero disables the daily cap
    pub max_trades_per_day: u32,
    pub call_timeout: Duration,
}

/// Result of an execution attempt that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Executed(TradeRecord),
    Skipped(String),
}

#[derive(Debug, Clone, Default)]
struct DailyCounter {
    date: Option<NaiveDate>,
    count: u32,
}

impl DailyCounter {
    fn count_for(&mut self, now: DateTime<Utc>) -> u32 {
        let today = now.date_naive();
        if self.date != Some(today) {
            self.date = Some(today);
            self.count = 0;
        }
        self.count
    }

    fn increment(&mut self, now: DateTime<Utc>) {
        self.count_for(now);
        self.count += 1;
    }
}

/// Trade executor for submitting orders from signals
pub struct TradeExecutor {
    config: ExecutorConfig,
    broker: Arc<dyn BrokerClient>,
    daily: DailyCounter,
}

impl TradeExecutor {
    pub fn new(config: ExecutorConfig, broker: Arc<dyn BrokerClient>) -> Self {
        Self {
            config,
            broker,
            daily: DailyCounter::default(),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Trades executed so far on the day of `now`
    pub fn trades_today(&mut self, now: DateTime<Utc>) -> u32 {
        self.daily.count_for(now)
    }

    /// Execute a directional signal
    ///
    /// # Returns
    /// `Executed` with an ACTIVE record on acknowledgment, `Skipped` when a
    /// position or daily limit blocks the order.
    ///
    /// # Errors
    /// `InvalidOrder` for a non-actionable signal or inconsistent levels,
    /// `DataUnavailable` when no quote is available, `ExecutionFailure` when the
    /// broker rejects or never acknowledges the order.
    pub async fn execute(
        &mut self,
        signal: &Signal,
        risk_state: &mut RiskState,
        now: DateTime<Utc>,
    ) -> Result<ExecutionOutcome, BotError> {
        if !signal.is_actionable() {
            return Err(BotError::InvalidOrder {
                reason: format!(
                    "{} signal with volume {} is not executable",
                    signal.direction(),
                    signal.lot_size()
                ),
            });
        }
        let side = OrderSide::try_from(signal.direction())
            .map_err(|reason| BotError::InvalidOrder { reason })?;
        let symbol = self.config.symbol.clone();
        let limit = self.config.call_timeout;

        if self.config.max_trades_per_day > 0
            && self.daily.count_for(now) >= self.config.max_trades_per_day
        {
            tracing::info!("Daily trade limit reached ({})", self.config.max_trades_per_day);
            return Ok(ExecutionOutcome::Skipped("daily trade limit reached".to_string()));
        }

        let open = with_timeout(limit, "open_positions", self.broker.open_positions(&symbol))
            .await
            .map_err(|e| {
                BotError::from_broker(e, |e| BotError::ExecutionFailure {
                    reason: format!("position check failed: {}", e),
                })
            })?;
        if open >= self.config.max_open_positions {
            tracing::info!(
                "Maximum open positions reached ({}/{})",
                open,
                self.config.max_open_positions
            );
            return Ok(ExecutionOutcome::Skipped(format!(
                "{} open positions on {}",
                open, symbol
            )));
        }

        let quote = with_timeout(limit, "quote", self.broker.quote(&symbol))
            .await
            .map_err(|e| {
                BotError::from_broker(e, |e| BotError::data_unavailable(&symbol, e.to_string()))
            })?;

        let price = match side {
            OrderSide::Buy => quote.ask,
            OrderSide::Sell => quote.bid,
        };

        let request = OrderRequest::new(
            symbol.clone(),
            side,
            signal.lot_size(),
            price,
            signal.stop_loss(),
            signal.take_profit(),
            self.config.magic,
            self.config.comment.clone(),
        )
        .map_err(|reason| BotError::InvalidOrder { reason })?;

        tracing::info!(
            "Submitting {} {:.2} {} @ {:.2} (SL {:.2}, TP {:.2})",
            side,
            request.volume,
            symbol,
            price,
            request.stop_loss,
            request.take_profit
        );

        let ack = with_timeout(limit, "submit_order", self.broker.submit_order(&request))
            .await
            .map_err(|e| {
                BotError::from_broker(e, |e| BotError::ExecutionFailure {
                    reason: e.to_string(),
                })
            })?;

        if !ack.is_success() {
            return Err(BotError::ExecutionFailure {
                reason: format!("order not accepted (retcode {}): {}", ack.retcode, ack.message),
            });
        }

        risk_state.record_execution();
        self.daily.increment(now);

        tracing::info!("Order {} accepted: {} {:.2} lots", ack.order_id, side, request.volume);

        Ok(ExecutionOutcome::Executed(TradeRecord::open(
            ack.order_id,
            signal.clone(),
            request.volume,
            price,
            now,
        )))
    }
}
