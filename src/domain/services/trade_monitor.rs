//! Settles active trades by polling the broker for their outcome

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::domain::entities::risk_state::RiskState;
use crate::domain::entities::trade_record::{ActiveTrades, TradeRecord};
use crate::domain::repositories::broker_client::{with_timeout, BrokerClient};

/// Result of one monitoring pass
#[derive(Debug, Default)]
pub struct MonitorPoll {
    /// Records that closed during this poll
    pub closed: Vec<TradeRecord>,
    /// The broker dropped the login; remaining trades were not checked
    pub session_lost: bool,
}

/// Poll every active trade once
///
/// Settled trades are removed from `active`, closed, and applied to
/// `risk_state`. A failed lookup leaves the trade in place for the next poll.
/// A lost broker session stops the pass early.
pub async fn poll_outcomes(
    broker: &dyn BrokerClient,
    active: &mut ActiveTrades,
    risk_state: &mut RiskState,
    now: DateTime<Utc>,
    limit: Duration,
) -> MonitorPoll {
    let mut poll = MonitorPoll::default();

    for id in active.ids() {
        let profit = match with_timeout(limit, "trade_outcome", broker.trade_outcome(&id)).await {
            Ok(Some((_, profit))) => profit,
            Ok(None) => continue,
            Err(e) if e.is_session_lost() => {
                tracing::warn!("Broker session lost while checking {}: {}", id, e);
                poll.session_lost = true;
                break;
            }
            Err(e) => {
                tracing::warn!("Could not check outcome of {}: {}", id, e);
                continue;
            }
        };

        let Some(mut record) = active.remove(&id) else {
            continue;
        };
        match record.close(profit, now) {
            Ok(outcome) => {
                risk_state.record_outcome(outcome);
                tracing::info!(
                    "Trade {} closed {:?} ({:+.2}); streak W{} L{}",
                    id,
                    outcome,
                    profit,
                    risk_state.consecutive_wins,
                    risk_state.consecutive_losses
                );
                poll.closed.push(record);
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }

    poll
}
