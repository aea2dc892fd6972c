//! Broker Client Trait
//!
//! This module defines the `BrokerClient` trait, the narrow request/response
//! contract the session uses to reach a broker. Two implementations exist: an
//! HTTP bridge to a live terminal and a deterministic synthetic broker.
//!
//! ## Benefits
//! - Session logic never branches on "is this the real broker?"
//! - Enables scripted brokers for testing
//! - The adapter is chosen once at startup

use crate::domain::entities::order::OrderRequest;
use crate::domain::entities::trade_record::TradeOutcome;
use crate::domain::services::indicators::PriceBar;
use crate::domain::value_objects::symbol_constraints::SymbolConstraints;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use zeroize::Zeroizing;

/// Common result type for broker operations
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors that can occur during broker operations
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerError {
    /// Login or handshake failed
    AuthenticationError(String),
    /// Transport-level failure
    NetworkError(String),
    /// Operation attempted without an established session
    NotConnected,
    /// Requested data does not exist or came back empty
    DataUnavailable(String),
    /// Order rejected by the broker
    OrderRejected { retcode: u32, message: String },
    /// Call did not complete in time
    Timeout(String),
    /// Broker-specific error
    BrokerSpecific(String),
}

impl std::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrokerError::AuthenticationError(msg) => write!(f, "Authentication error: {}", msg),
            BrokerError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            BrokerError::NotConnected => write!(f, "Not connected to broker"),
            BrokerError::DataUnavailable(msg) => write!(f, "Data unavailable: {}", msg),
            BrokerError::OrderRejected { retcode, message } => {
                write!(f, "Order rejected (retcode {}): {}", retcode, message)
            }
            BrokerError::Timeout(op) => write!(f, "Broker call timed out: {}", op),
            BrokerError::BrokerSpecific(msg) => write!(f, "Broker error: {}", msg),
        }
    }
}

impl std::error::Error for BrokerError {}

impl BrokerError {
    /// Whether the broker no longer recognises the login and a new
    /// handshake is needed
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            BrokerError::NotConnected | BrokerError::AuthenticationError(_)
        )
    }
}

/// Login credentials; the password is wiped from memory on drop
#[derive(Clone)]
pub struct Credentials {
    pub login: u64,
    pub password: Zeroizing<String>,
    pub server: String,
}

impl Credentials {
    pub fn new(login: u64, password: String, server: String) -> Self {
        Self {
            login,
            password: Zeroizing::new(password),
            server,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

/// Current best bid/ask
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

/// Account snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub balance: f64,
    pub equity: f64,
}

/// Return code the terminal reports for a completed request
pub const RETCODE_DONE: u32 = 10009;

/// Broker acknowledgment of an order submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub accepted: bool,
    pub order_id: String,
    pub retcode: u32,
    pub message: String,
}

impl OrderAck {
    pub fn is_success(&self) -> bool {
        self.accepted && self.retcode == RETCODE_DONE
    }
}

/// Bar timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
}

impl Timeframe {
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timeframe::M1 => write!(f, "M1"),
            Timeframe::M5 => write!(f, "M5"),
            Timeframe::M15 => write!(f, "M15"),
            Timeframe::H1 => write!(f, "H1"),
            Timeframe::H4 => write!(f, "H4"),
        }
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            other => Err(format!("Unknown timeframe: {}", other)),
        }
    }
}

/// Broker client trait providing the session's view of a broker
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Get the name of this broker adapter
    fn name(&self) -> &str;

    /// Establish a session with the broker
    async fn connect(&self, credentials: &Credentials) -> BrokerResult<()>;

    /// Volume limits and spread for a symbol
    async fn symbol_constraints(&self, symbol: &str) -> BrokerResult<SymbolConstraints>;

    /// Current bid/ask
    async fn quote(&self, symbol: &str) -> BrokerResult<Quote>;

    /// Most recent `count` bars, oldest first
    async fn recent_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> BrokerResult<Vec<PriceBar>>;

    /// Submit a market order
    async fn submit_order(&self, request: &OrderRequest) -> BrokerResult<OrderAck>;

    /// Number of open positions on a symbol
    async fn open_positions(&self, symbol: &str) -> BrokerResult<usize>;

    /// Account balance and equity
    async fn account_info(&self) -> BrokerResult<AccountInfo>;

    /// Settled outcome of an order, `None` while the position is still open
    ///
    /// # Returns
    /// The outcome together with the realized profit
    async fn trade_outcome(&self, order_id: &str) -> BrokerResult<Option<(TradeOutcome, f64)>>;

    /// Release the broker session
    async fn disconnect(&self) -> BrokerResult<()> {
        // Default implementation - can be overridden
        Ok(())
    }
}

/// Await a broker call, failing with `BrokerError::Timeout` after `limit`
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, call: F) -> BrokerResult<T>
where
    F: Future<Output = BrokerResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BrokerError::Timeout(operation.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lost_errors() {
        assert!(BrokerError::NotConnected.is_session_lost());
        assert!(BrokerError::AuthenticationError("401".to_string()).is_session_lost());
        assert!(!BrokerError::Timeout("quote".to_string()).is_session_lost());
        assert!(!BrokerError::NetworkError("reset".to_string()).is_session_lost());
    }

    #[tokio::test]
    async fn test_with_timeout_maps_elapsed() {
        let result: BrokerResult<()> =
            with_timeout(Duration::from_millis(10), "quote", std::future::pending()).await;
        assert_eq!(result, Err(BrokerError::Timeout("quote".to_string())));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let result = with_timeout(Duration::from_secs(1), "quote", async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn test_broker_error_display() {
        let error = BrokerError::OrderRejected {
            retcode: 10006,
            message: "Request rejected".to_string(),
        };
        assert_eq!(error.to_string(), "Order rejected (retcode 10006): Request rejected");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new(12345, "hunter2".to_string(), "Demo".to_string());
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("12345"));
    }

    #[test]
    fn test_ack_success_requires_done_retcode() {
        let mut ack = OrderAck {
            accepted: true,
            order_id: "1".to_string(),
            retcode: RETCODE_DONE,
            message: String::new(),
        };
        assert!(ack.is_success());
        ack.retcode = 10004;
        assert!(!ack.is_success());
    }

    #[test]
    fn test_timeframe_minutes_and_parse() {
        assert_eq!(Timeframe::M15.minutes(), 15);
        assert_eq!(Timeframe::H4.minutes(), 240);
        assert_eq!("h1".parse::<Timeframe>().unwrap(), Timeframe::H1);
        assert!("D1".parse::<Timeframe>().is_err());
    }
}
