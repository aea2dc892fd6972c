//! Anthropic messages API client used as the market analyst

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::domain::repositories::market_analyst::{AnalystError, MarketAnalyst};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1500;

#[derive(Clone)]
pub struct ClaudeConfig {
    pub api_base: String,
    pub api_key: Zeroizing<String>,
    pub model: String,
    pub max_tokens: u32,
}

impl ClaudeConfig {
    pub fn new(api_key: Zeroizing<String>, model: &str) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key,
            model: model.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl std::fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Concatenate the text blocks of a reply
fn reply_text(response: MessagesResponse) -> Result<String, AnalystError> {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("\n");
    if text.trim().is_empty() {
        Err(AnalystError::EmptyReply)
    } else {
        Ok(text)
    }
}

pub struct ClaudeAnalyst {
    client: Client,
    config: ClaudeConfig,
}

impl ClaudeAnalyst {
    pub fn new(config: ClaudeConfig, client: Client) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl MarketAnalyst for ClaudeAnalyst {
    async fn analyze(&self, prompt: &str) -> Result<String, AnalystError> {
        let url = format!("{}/v1/messages", self.config.api_base.trim_end_matches('/'));
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!("Requesting analysis from {}", self.config.model);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.config.api_key.as_str())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalystError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AnalystError::Request(format!("{} - {}", status, error_text)));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AnalystError::Request(format!("Failed to parse reply: {}", e)))?;

        reply_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_text_joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content": [{"type": "text", "text": "{\"signal\":"}, {"type": "tool_use"}, {"type": "text", "text": "\"BUY\"}"}]}"#,
        )
        .unwrap();
        assert_eq!(reply_text(response).unwrap(), "{\"signal\":\n\"BUY\"}");
    }

    #[test]
    fn test_empty_reply_is_error() {
        let response: MessagesResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert_eq!(reply_text(response), Err(AnalystError::EmptyReply));
    }

    #[test]
    fn test_request_serializes_expected_shape() {
        let body = MessagesRequest {
            model: "claude-test",
            max_tokens: 10,
            messages: vec![Message {
                role: "user",
                content: "hi",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 10);
    }
}
