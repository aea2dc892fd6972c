//! HTTP adapter for the terminal signal bridge
//!
//! The bridge exposes the terminal's account, market data and order routing
//! as JSON endpoints. Every request after login carries the session token.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;
use zeroize::Zeroizing;

use crate::domain::entities::order::OrderRequest;
use crate::domain::entities::trade_record::TradeOutcome;
use crate::domain::repositories::broker_client::{
    AccountInfo, BrokerClient, BrokerError, BrokerResult, Credentials, OrderAck, Quote, Timeframe,
    RETCODE_DONE,
};
use crate::domain::services::indicators::PriceBar;
use crate::domain::value_objects::symbol_constraints::SymbolConstraints;

const SESSION_HEADER: &str = "X-Session-Token";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    login: u64,
    password: &'a str,
    server: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfoResponse {
    volume_min: f64,
    volume_max: f64,
    volume_step: f64,
    #[serde(default)]
    spread: f64,
}

/// One bar as the terminal reports it; `time` is unix seconds
#[derive(Debug, Clone, Deserialize)]
pub struct RateDto {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub tick_volume: f64,
}

impl RateDto {
    pub fn into_bar(self) -> Result<PriceBar, String> {
        let time = Utc
            .timestamp_opt(self.time, 0)
            .single()
            .ok_or_else(|| format!("invalid bar timestamp {}", self.time))?;
        PriceBar::new(time, self.open, self.high, self.low, self.close, self.tick_volume)
    }
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    retcode: u32,
    #[serde(default)]
    order: Option<u64>,
    #[serde(default)]
    comment: String,
}

#[derive(Debug, Deserialize)]
struct PositionsResponse {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct DealResponse {
    closed: bool,
    #[serde(default)]
    profit: f64,
}

/// Broker adapter speaking JSON over HTTP to the bridge
pub struct BridgeBroker {
    client: Client,
    base: Url,
    token: RwLock<Option<Zeroizing<String>>>,
}

impl BridgeBroker {
    /// Create a new bridge adapter
    ///
    /// # Errors
    /// Returns an error if the base URL does not parse
    pub fn new(base_url: &str, client: Client) -> Result<Self, String> {
        let mut base = Url::parse(base_url).map_err(|e| format!("Invalid bridge URL: {}", e))?;
        // Url::join drops the last segment without a trailing slash
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client,
            base,
            token: RwLock::new(None),
        })
    }

    pub fn endpoint(&self, path: &str) -> BrokerResult<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| BrokerError::BrokerSpecific(format!("bad endpoint {}: {}", path, e)))
    }

    async fn session_token(&self) -> BrokerResult<String> {
        self.token
            .read()
            .await
            .as_ref()
            .map(|t| t.as_str().to_owned())
            .ok_or(BrokerError::NotConnected)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> BrokerResult<Option<T>> {
        let url = self.endpoint(path)?;
        let token = self.session_token().await?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(SESSION_HEADER, token)
            .send()
            .await
            .map_err(|e| BrokerError::NetworkError(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, error_text));
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| BrokerError::BrokerSpecific(format!("Failed to parse {}: {}", path, e)))
    }

    fn status_error(status: StatusCode, body: String) -> BrokerError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BrokerError::NotConnected,
            StatusCode::SERVICE_UNAVAILABLE => {
                BrokerError::NetworkError(format!("terminal unavailable: {}", body))
            }
            _ => BrokerError::BrokerSpecific(format!("{} - {}", status, body)),
        }
    }

    fn required<T>(value: Option<T>, what: &str) -> BrokerResult<T> {
        value.ok_or_else(|| BrokerError::DataUnavailable(what.to_string()))
    }
}

#[async_trait]
impl BrokerClient for BridgeBroker {
    fn name(&self) -> &str {
        "bridge"
    }

    async fn connect(&self, credentials: &Credentials) -> BrokerResult<()> {
        let url = self.endpoint("api/login")?;
        let body = LoginRequest {
            login: credentials.login,
            password: credentials.password.as_str(),
            server: &credentials.server,
        };

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BrokerError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(BrokerError::AuthenticationError(format!("{} - {}", status, error_text)));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::AuthenticationError(format!("bad login reply: {}", e)))?;

        match (login.success, login.token) {
            (true, Some(token)) => {
                *self.token.write().await = Some(Zeroizing::new(token));
                info!("Connected to bridge as {} on {}", credentials.login, credentials.server);
                Ok(())
            }
            _ => Err(BrokerError::AuthenticationError(
                login.message.unwrap_or_else(|| "login refused".to_string()),
            )),
        }
    }

    async fn symbol_constraints(&self, symbol: &str) -> BrokerResult<SymbolConstraints> {
        let info: SymbolInfoResponse =
            Self::required(self.get_json(&format!("api/symbol/{}", symbol)).await?, symbol)?;
        SymbolConstraints::new(info.volume_min, info.volume_max, info.volume_step, info.spread)
            .map_err(BrokerError::DataUnavailable)
    }

    async fn quote(&self, symbol: &str) -> BrokerResult<Quote> {
        let quote: Quote =
            Self::required(self.get_json(&format!("api/quote/{}", symbol)).await?, symbol)?;
        if quote.bid <= 0.0 || quote.ask < quote.bid {
            return Err(BrokerError::DataUnavailable(format!(
                "bad quote for {}: {}/{}",
                symbol, quote.bid, quote.ask
            )));
        }
        Ok(quote)
    }

    async fn recent_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> BrokerResult<Vec<PriceBar>> {
        let path = format!("api/rates/{}?timeframe={}&count={}", symbol, timeframe, count);
        let rates: Vec<RateDto> = Self::required(self.get_json(&path).await?, symbol)?;
        if rates.is_empty() {
            return Err(BrokerError::DataUnavailable(format!("no rates for {}", symbol)));
        }

        let mut bars = Vec::with_capacity(rates.len());
        for rate in rates {
            match rate.into_bar() {
                Ok(bar) => bars.push(bar),
                Err(e) => warn!("Skipping malformed bar for {}: {}", symbol, e),
            }
        }
        bars.sort_by_key(|b| b.time);
        Ok(bars)
    }

    async fn submit_order(&self, request: &OrderRequest) -> BrokerResult<OrderAck> {
        let url = self.endpoint("api/order")?;
        let token = self.session_token().await?;

        let response = self
            .client
            .post(url)
            .header(SESSION_HEADER, token)
            .json(request)
            .send()
            .await
            .map_err(|e| BrokerError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, error_text));
        }

        let reply: OrderResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::BrokerSpecific(format!("Failed to parse order reply: {}", e)))?;

        Ok(OrderAck {
            accepted: reply.retcode == RETCODE_DONE && reply.order.is_some(),
            order_id: reply.order.map(|id| id.to_string()).unwrap_or_default(),
            retcode: reply.retcode,
            message: reply.comment,
        })
    }

    async fn open_positions(&self, symbol: &str) -> BrokerResult<usize> {
        let reply: Option<PositionsResponse> =
            self.get_json(&format!("api/positions/{}", symbol)).await?;
        Ok(reply.map(|r| r.count).unwrap_or(0))
    }

    async fn account_info(&self) -> BrokerResult<AccountInfo> {
        Self::required(self.get_json("api/account").await?, "account info")
    }

    async fn trade_outcome(&self, order_id: &str) -> BrokerResult<Option<(TradeOutcome, f64)>> {
        let deal: Option<DealResponse> = self.get_json(&format!("api/deals/{}", order_id)).await?;
        Ok(deal
            .filter(|d| d.closed)
            .map(|d| (TradeOutcome::from_profit(d.profit), d.profit)))
    }

    async fn disconnect(&self) -> BrokerResult<()> {
        *self.token.write().await = None;
        info!("Bridge session released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker(base: &str) -> BridgeBroker {
        BridgeBroker::new(base, Client::new()).unwrap()
    }

    #[test]
    fn test_endpoint_joins_under_base_path() {
        let b = broker("http://localhost:8080/bridge");
        assert_eq!(
            b.endpoint("/api/quote/XAUUSD").unwrap().as_str(),
            "http://localhost:8080/bridge/api/quote/XAUUSD"
        );
    }

    #[test]
    fn test_endpoint_keeps_query() {
        let b = broker("http://localhost:8080");
        let url = b.endpoint("api/rates/XAUUSD?timeframe=M15&count=100").unwrap();
        assert_eq!(url.path(), "/api/rates/XAUUSD");
        assert_eq!(url.query(), Some("timeframe=M15&count=100"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(BridgeBroker::new("not a url", Client::new()).is_err());
    }

    #[test]
    fn test_rate_into_bar() {
        let rate: RateDto = serde_json::from_str(
            r#"{"time": 1700000000, "open": 2000.0, "high": 2003.0, "low": 1998.5, "close": 2001.0, "tick_volume": 420}"#,
        )
        .unwrap();
        let bar = rate.into_bar().unwrap();
        assert_eq!(bar.time.timestamp(), 1_700_000_000);
        assert_eq!(bar.close, 2001.0);
        assert_eq!(bar.volume, 420.0);
    }

    #[test]
    fn test_rate_with_inverted_range_rejected() {
        let rate = RateDto {
            time: 1_700_000_000,
            open: 2000.0,
            high: 1990.0,
            low: 2010.0,
            close: 2000.0,
            tick_volume: 1.0,
        };
        assert!(rate.into_bar().is_err());
    }

    #[tokio::test]
    async fn test_calls_before_login_are_not_connected() {
        let b = broker("http://127.0.0.1:9");
        assert_eq!(b.quote("XAUUSD").await, Err(BrokerError::NotConnected));
    }
}
