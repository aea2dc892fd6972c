//! Error taxonomy for the trading session
//!
//! Every failure the loop can observe maps onto one of these variants. None of
//! them is fatal to the session: the loop logs the error with its severity and
//! carries on with the next cycle.

use std::fmt;
use thiserror::Error;

use crate::domain::repositories::broker_client::BrokerError;

/// Errors raised while running an analysis-and-trade cycle
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BotError {
    /// Broker handshake or login failed; the session keeps running read-only
    #[error("Broker connection failed: {reason}")]
    ConnectionFailure { reason: String },

    /// Quote or bar history missing; the cycle ends without a signal
    #[error("Market data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Broker constraints or balance unavailable; sizing used the platform minimum
    #[error("Sizing fell back to minimum volume {volume}: {reason}")]
    SizingFallback { volume: f64, reason: String },

    /// Order rejected or never acknowledged
    #[error("Order execution failed: {reason}")]
    ExecutionFailure { reason: String },

    /// Order request failed local validation and was never sent
    #[error("Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// Configuration could not be loaded or is inconsistent
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Anything else that escaped a cycle
    #[error("Unexpected loop error: {0}")]
    Fatal(String),
}

impl BotError {
    /// Get the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BotError::SizingFallback { .. } => ErrorSeverity::Minor,
            BotError::DataUnavailable { .. } => ErrorSeverity::Moderate,
            BotError::InvalidOrder { .. } => ErrorSeverity::Moderate,
            BotError::ExecutionFailure { .. } => ErrorSeverity::Moderate,
            BotError::ConnectionFailure { .. } => ErrorSeverity::Critical,
            BotError::Configuration(_) => ErrorSeverity::Critical,
            BotError::Fatal(_) => ErrorSeverity::Critical,
        }
    }

    /// Whether the next cycle may succeed without operator action
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, BotError::Configuration(_))
    }

    /// Get a short error code for logging/monitoring
    pub fn error_code(&self) -> &'static str {
        match self {
            BotError::ConnectionFailure { .. } => "ERR_CONNECTION",
            BotError::DataUnavailable { .. } => "ERR_DATA_UNAVAILABLE",
            BotError::SizingFallback { .. } => "ERR_SIZING_FALLBACK",
            BotError::ExecutionFailure { .. } => "ERR_EXECUTION",
            BotError::InvalidOrder { .. } => "ERR_INVALID_ORDER",
            BotError::Configuration(_) => "ERR_CONFIGURATION",
            BotError::Fatal(_) => "ERR_FATAL",
        }
    }

    pub fn data_unavailable(symbol: &str, reason: impl Into<String>) -> Self {
        BotError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    /// Map a broker failure, turning a lost login into `ConnectionFailure`
    pub fn from_broker(error: BrokerError, otherwise: impl FnOnce(BrokerError) -> BotError) -> Self {
        if error.is_session_lost() {
            BotError::ConnectionFailure {
                reason: error.to_string(),
            }
        } else {
            otherwise(error)
        }
    }
}

/// Severity levels attached to every logged failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Expected to occur occasionally
    Minor,
    /// Indicates a problem worth looking at
    Moderate,
    /// Requires attention; trading is impaired
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Minor => write!(f, "MINOR"),
            ErrorSeverity::Moderate => write!(f, "MODERATE"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl From<BotError> for String {
    fn from(error: BotError) -> Self {
        error.to_string()
    }
}
