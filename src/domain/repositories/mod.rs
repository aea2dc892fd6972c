pub mod broker_client;
pub mod event_sink;
pub mod market_analyst;
