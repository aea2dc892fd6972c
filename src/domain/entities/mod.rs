pub mod market_state;
pub mod order;
pub mod risk_state;
pub mod signal;
pub mod trade_record;
