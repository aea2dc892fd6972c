//! Collaborator Factory
//!
//! Builds the broker, analyst and event sink once at startup from the
//! configuration. The session only ever sees the trait objects.

use crate::config::{BotConfig, BrokerKind};
use crate::domain::errors::BotError;
use crate::domain::repositories::broker_client::{BrokerClient, Credentials};
use crate::domain::repositories::event_sink::{EventSink, LogEventSink};
use crate::domain::repositories::market_analyst::MarketAnalyst;
use crate::infrastructure::bridge_broker::BridgeBroker;
use crate::infrastructure::claude_analyst::{ClaudeAnalyst, ClaudeConfig};
use crate::infrastructure::synthetic_broker::SyntheticBroker;
use crate::persistence::event_repository::SqliteEventSink;
use crate::persistence::init_database;
use crate::secrets::{analyst_api_key, broker_credentials, SecretConfig};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Factory for session collaborators
pub struct BrokerFactory;

impl BrokerFactory {
    /// Create the configured broker and the credentials to log in with
    ///
    /// # Errors
    /// `Configuration` when the bridge URL is invalid or the bridge
    /// credentials cannot be loaded
    pub fn create_broker(
        config: &BotConfig,
        secrets: &SecretConfig,
    ) -> Result<(Arc<dyn BrokerClient>, Credentials), BotError> {
        match config.broker {
            BrokerKind::Synthetic => {
                let broker = SyntheticBroker::new(config.synthetic_seed)
                    .with_auto_settle(config.synthetic_win_rate);
                info!(
                    "✓ Synthetic broker created (seed {}, win rate {:.0}%)",
                    config.synthetic_seed,
                    config.synthetic_win_rate * 100.0
                );
                let credentials = Credentials::new(0, String::new(), "synthetic".to_string());
                Ok((Arc::new(broker) as Arc<dyn BrokerClient>, credentials))
            }
            BrokerKind::Bridge => {
                let client = Self::http_client(config)?;
                let broker = BridgeBroker::new(&config.bridge_url, client)
                    .map_err(BotError::Configuration)?;
                let credentials =
                    broker_credentials(config.broker_login, &config.broker_server, secrets)
                        .map_err(|e| BotError::Configuration(e.to_string()))?;
                info!("✓ Bridge broker created for {}", config.bridge_url);
                Ok((Arc::new(broker) as Arc<dyn BrokerClient>, credentials))
            }
        }
    }

    /// Create the analyst when AI analysis is enabled
    ///
    /// A missing API key disables analysis rather than failing startup.
    pub fn create_analyst(
        config: &BotConfig,
        secrets: &SecretConfig,
    ) -> Option<Arc<dyn MarketAnalyst>> {
        if !config.ai_enabled {
            return None;
        }

        let key = match analyst_api_key(secrets) {
            Ok(key) => key,
            Err(e) => {
                warn!("AI analysis disabled: {}", e);
                return None;
            }
        };

        match Self::http_client(config) {
            Ok(client) => {
                info!("✓ AI analyst enabled ({})", config.ai_model);
                let analyst = ClaudeAnalyst::new(ClaudeConfig::new(key, &config.ai_model), client);
                Some(Arc::new(analyst) as Arc<dyn MarketAnalyst>)
            }
            Err(e) => {
                error!("✗ Failed to create AI analyst: {}", e);
                None
            }
        }
    }

    /// SQLite sink when a database is configured, log sink otherwise
    ///
    /// A database that cannot be opened falls back to the log sink.
    pub async fn create_sink(config: &BotConfig) -> Arc<dyn EventSink> {
        let Some(url) = &config.database_url else {
            return Arc::new(LogEventSink);
        };

        match init_database(url).await {
            Ok(pool) => Arc::new(SqliteEventSink::new(pool)),
            Err(e) => {
                error!("✗ Event database unavailable, logging events only: {}", e);
                Arc::new(LogEventSink)
            }
        }
    }

    fn http_client(config: &BotConfig) -> Result<reqwest::Client, BotError> {
        reqwest::Client::builder()
            .timeout(config.collaborator_timeout)
            .build()
            .map_err(|e| BotError::Configuration(format!("HTTP client: {}", e)))
    }
}
