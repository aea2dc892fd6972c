use crate::domain::entities::signal::Direction;
use serde::{Deserialize, Serialize};

/// Slippage tolerance in points sent with every market order
pub const DEFAULT_DEVIATION: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

impl TryFrom<Direction> for OrderSide {
    type Error = String;

    fn try_from(direction: Direction) -> Result<Self, Self::Error> {
        match direction {
            Direction::Buy => Ok(OrderSide::Buy),
            Direction::Sell => Ok(OrderSide::Sell),
            Direction::None => Err("NONE signals cannot become orders".to_string()),
        }
    }
}

/// Market order with attached stop and target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub volume: f64,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub deviation: u32,
    /// Broker-side tag identifying this bot's orders
    pub magic: u64,
    pub comment: String,
}

impl OrderRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: String,
        side: OrderSide,
        volume: f64,
        price: f64,
        stop_loss: f64,
        take_profit: f64,
        magic: u64,
        comment: String,
    ) -> Result<Self, String> {
        let order = OrderRequest {
            symbol,
            side,
            volume,
            price,
            stop_loss,
            take_profit,
            deviation: DEFAULT_DEVIATION,
            magic,
            comment,
        };
        order.validate()?;
        Ok(order)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.trim().is_empty() {
            return Err("symbol cannot be empty".to_string());
        }
        if !(self.volume.is_finite() && self.volume > 0.0) {
            return Err(format!("volume must be positive, got {}", self.volume));
        }
        if !(self.price.is_finite() && self.price > 0.0) {
            return Err(format!("price must be positive, got {}", self.price));
        }
        let sides_ok = match self.side {
            OrderSide::Buy => self.stop_loss < self.price && self.take_profit > self.price,
            OrderSide::Sell => self.stop_loss > self.price && self.take_profit < self.price,
        };
        if !sides_ok {
            return Err(format!(
                "{} order at {:.5} has stop {:.5} / target {:.5} on the wrong side",
                self.side, self.price, self.stop_loss, self.take_profit
            ));
        }
        Ok(())
    }
}
