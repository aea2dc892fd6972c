//! AI market analyst collaborator

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalystError {
    #[error("Analyst request failed: {0}")]
    Request(String),

    #[error("Analyst returned an empty reply")]
    EmptyReply,

    #[error("Analyst not configured: {0}")]
    NotConfigured(String),
}

/// Free-text analysis service; replies are expected to embed one JSON object
#[async_trait]
pub trait MarketAnalyst: Send + Sync {
    async fn analyze(&self, prompt: &str) -> Result<String, AnalystError>;
}
