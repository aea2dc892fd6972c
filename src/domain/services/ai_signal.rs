//! Prompt building and tolerant parsing for AI-generated signals
//!
//! The analyst's reply is free text that is expected to embed one JSON object.
//! Anything that does not parse cleanly is treated as "no signal".

use crate::domain::entities::market_state::MarketState;
use crate::domain::entities::signal::Direction;
use crate::domain::services::indicators::IndicatorBundle;
use crate::domain::services::signal_generator::SignalCandidate;
use serde::Deserialize;

/// JSON shape requested from the analyst
#[derive(Debug, Clone, Deserialize)]
pub struct AiSignalPayload {
    pub signal: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub entry_price: Option<f64>,
    #[serde(default)]
    pub stop_loss: f64,
    #[serde(default)]
    pub take_profit: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Slice from the first `{` to the last `}`, if both exist in that order
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse an analyst reply into a candidate
///
/// `entry_fallback` is used when the reply omits an entry price. A reply below
/// `min_confidence`, with an unknown direction, or without valid JSON yields NONE.
pub fn parse_ai_signal(text: &str, entry_fallback: f64, min_confidence: f64) -> SignalCandidate {
    let payload = match extract_json_object(text) {
        Some(json) => match serde_json::from_str::<AiSignalPayload>(json) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("AI reply JSON did not parse: {}", e);
                return SignalCandidate::none(entry_fallback);
            }
        },
        None => {
            tracing::warn!("AI reply contained no JSON object");
            return SignalCandidate::none(entry_fallback);
        }
    };

    let direction = match payload.signal.parse::<Direction>() {
        Ok(direction) => direction,
        Err(e) => {
            tracing::warn!("AI reply has {}", e);
            return SignalCandidate::none(entry_fallback);
        }
    };
    if direction == Direction::None {
        return SignalCandidate::none(entry_fallback);
    }

    let confidence = payload.confidence.clamp(0.0, 100.0);
    if confidence < min_confidence {
        tracing::info!(
            "AI {} signal below minimum confidence ({:.0} < {:.0})",
            direction,
            confidence,
            min_confidence
        );
        return SignalCandidate::none(entry_fallback);
    }

    let entry_price = payload
        .entry_price
        .filter(|p| p.is_finite() && *p > 0.0)
        .unwrap_or(entry_fallback);

    let reasoning = if payload.reasoning.is_empty() {
        "AI analysis".to_string()
    } else {
        payload.reasoning
    };

    SignalCandidate {
        direction,
        confidence,
        entry_price,
        stop_loss: payload.stop_loss,
        take_profit: payload.take_profit,
        reason: format!("AI: {}", reasoning),
    }
}

/// Build the analysis prompt sent to the analyst
pub fn build_analysis_prompt(
    symbol: &str,
    bundle: &IndicatorBundle,
    market: &MarketState,
    min_confidence: f64,
) -> String {
    let market_data = serde_json::json!({
        "symbol": symbol,
        "current_price": bundle.current_price,
        "ma_5": bundle.ma_fast,
        "ma_20": bundle.ma_medium,
        "ma_50": bundle.ma_slow,
        "rsi": bundle.rsi,
        "atr": bundle.atr,
        "trend": market.trend().to_string(),
        "momentum": market.momentum,
        "volatility": market.volatility,
    });

    format!(
        "Analyze this {symbol} market data for a trade opportunity.\n\n\
         MARKET DATA:\n{data}\n\n\
         RESPOND WITH JSON ONLY:\n\
         {{\"signal\": \"BUY\" | \"SELL\" | \"NONE\", \"confidence\": 0-100, \
         \"entry_price\": 0.0, \"stop_loss\": 0.0, \"take_profit\": 0.0, \
         \"reasoning\": \"short explanation\"}}\n\n\
         Only recommend trades with {min:.0}%+ confidence.",
        symbol = symbol,
        data = serde_json::to_string_pretty(&market_data).unwrap_or_default(),
        min = min_confidence,
    )
}
