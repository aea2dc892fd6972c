//! Stateless indicator functions over bar history
//!
//! Every indicator has a defined fallback for short history instead of an
//! error: downstream scoring treats the fallback as a neutral reading.

use crate::domain::errors::BotError;
use crate::domain::value_objects::price::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// RSI returned when there is not enough history
pub const NEUTRAL_RSI: f64 = 50.0;

/// ATR returned when there is not enough history; keeps divisions safe
pub const MIN_ATR: f64 = 0.001;

pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_ATR_PERIOD: usize = 14;

pub const MA_FAST_PERIOD: usize = 5;
pub const MA_MEDIUM_PERIOD: usize = 20;
pub const MA_SLOW_PERIOD: usize = 50;

/// One OHLCV bar as delivered by the broker, oldest first in any sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn new(
        time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, String> {
        let open = Price::new(open)?;
        let high = Price::new(high)?;
        let low = Price::new(low)?;
        let close = Price::new(close)?;

        if high < low {
            return Err("Bar high must be >= low".to_string());
        }
        if volume < 0.0 {
            return Err("Bar volume must be non-negative".to_string());
        }

        Ok(PriceBar {
            time,
            open: open.value(),
            high: high.value(),
            low: low.value(),
            close: close.value(),
            volume,
        })
    }
}

/// Arithmetic mean of the last `period` prices
///
/// With fewer than `period` samples the last price is returned, or 0.0 for an
/// empty slice.
pub fn moving_average(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period {
        return prices.last().copied().unwrap_or(0.0);
    }
    let window = &prices[prices.len() - period..];
    window.iter().sum::<f64>() / period as f64
}

/// Relative strength index over the last `period` deltas
pub fn rsi(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period + 1 {
        return NEUTRAL_RSI;
    }

    let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let recent = &deltas[deltas.len() - period..];

    let avg_gain = recent.iter().map(|d| d.max(0.0)).sum::<f64>() / period as f64;
    let avg_loss = recent.iter().map(|d| (-d).max(0.0)).sum::<f64>() / period as f64;

    if avg_loss == 0.0 {
        // No movement at all reads as neutral rather than overbought
        return if avg_gain == 0.0 { NEUTRAL_RSI } else { 100.0 };
    }

    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// Average true range over the last `period` bars
///
/// The slices must be aligned; the shortest one bounds the usable history.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> f64 {
    let len = highs.len().min(lows.len()).min(closes.len());
    if period == 0 || len < period + 1 {
        return MIN_ATR;
    }

    let true_ranges: Vec<f64> = (1..len)
        .map(|i| {
            let high_low = highs[i] - lows[i];
            let high_close = (highs[i] - closes[i - 1]).abs();
            let low_close = (lows[i] - closes[i - 1]).abs();
            high_low.max(high_close).max(low_close)
        })
        .collect();

    let recent = &true_ranges[true_ranges.len() - period..];
    recent.iter().sum::<f64>() / period as f64
}

/// Indicator values computed from the latest bar window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorBundle {
    pub current_price: f64,
    pub ma_fast: f64,
    pub ma_medium: f64,
    pub ma_slow: f64,
    pub rsi: f64,
    pub atr: f64,
}

impl IndicatorBundle {
    /// Compute the full bundle from a bar window
    ///
    /// # Errors
    /// `DataUnavailable` when the window is empty
    pub fn from_bars(symbol: &str, bars: &[PriceBar]) -> Result<Self, BotError> {
        let last = bars
            .last()
            .ok_or_else(|| BotError::data_unavailable(symbol, "empty bar history"))?;

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();

        Ok(IndicatorBundle {
            current_price: last.close,
            ma_fast: moving_average(&closes, MA_FAST_PERIOD),
            ma_medium: moving_average(&closes, MA_MEDIUM_PERIOD),
            ma_slow: moving_average(&closes, MA_SLOW_PERIOD),
            rsi: rsi(&closes, DEFAULT_RSI_PERIOD),
            atr: atr(&highs, &lows, &closes, DEFAULT_ATR_PERIOD),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_bars(count: usize, price: f64) -> Vec<PriceBar> {
        (0..count)
            .map(|_| PriceBar::new(Utc::now(), price, price, price, price, 100.0).unwrap())
            .collect()
    }

    #[test]
    fn test_price_bar_rejects_inverted_range() {
        let bar = PriceBar::new(Utc::now(), 100.0, 99.0, 101.0, 100.0, 10.0);
        assert!(bar.is_err());
    }

    #[test]
    fn test_moving_average_full_window() {
        let prices = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(moving_average(&prices, 3), 5.0);
    }

    #[test]
    fn test_moving_average_short_history_returns_last() {
        let prices = [10.0, 12.0];
        assert_eq!(moving_average(&prices, 5), 12.0);
    }

    #[test]
    fn test_moving_average_empty() {
        assert_eq!(moving_average(&[], 5), 0.0);
    }

    #[test]
    fn test_rsi_short_history_neutral() {
        let prices: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&prices, 14), NEUTRAL_RSI);
        assert_eq!(rsi(&[], 14), NEUTRAL_RSI);
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&prices, 14), 100.0);
    }

    #[test]
    fn test_rsi_flat_prices_is_neutral() {
        let prices = vec![2000.0; 30];
        assert_eq!(rsi(&prices, 14), NEUTRAL_RSI);
    }

    #[test]
    fn test_rsi_balanced_moves() {
        let prices: Vec<f64> = (0..30)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let value = rsi(&prices, 14);
        assert!((value - 50.0).abs() < 1e-9, "rsi was {}", value);
    }

    #[test]
    fn test_rsi_all_losses_is_0() {
        let prices: Vec<f64> = (0..20).map(|i| 200.0 - i as f64).collect();
        assert_eq!(rsi(&prices, 14), 0.0);
    }

    #[test]
    fn test_atr_short_history_default() {
        let highs = [101.0, 102.0];
        let lows = [99.0, 100.0];
        let closes = [100.0, 101.0];
        assert_eq!(atr(&highs, &lows, &closes, 14), MIN_ATR);
    }

    #[test]
    fn test_atr_uses_gap_from_previous_close() {
        // Gap up: |high - prev_close| dominates high - low
        let highs = [100.0, 110.0, 111.0];
        let lows = [100.0, 109.0, 110.0];
        let closes = [100.0, 110.0, 111.0];
        let value = atr(&highs, &lows, &closes, 2);
        // TR1 = max(1, 10, 9) = 10, TR2 = max(1, 1, 0) = 1
        assert_eq!(value, 5.5);
    }

    #[test]
    fn test_bundle_from_flat_bars() {
        let bars = flat_bars(60, 2000.0);
        let bundle = IndicatorBundle::from_bars("XAUUSD", &bars).unwrap();
        assert_eq!(bundle.current_price, 2000.0);
        assert_eq!(bundle.ma_fast, 2000.0);
        assert_eq!(bundle.ma_medium, 2000.0);
        assert_eq!(bundle.ma_slow, 2000.0);
        assert_eq!(bundle.atr, 0.0);
    }

    #[test]
    fn test_bundle_from_empty_bars_is_data_unavailable() {
        let result = IndicatorBundle::from_bars("XAUUSD", &[]);
        assert!(matches!(result, Err(BotError::DataUnavailable { .. })));
    }
}
