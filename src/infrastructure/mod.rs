pub mod bridge_broker;
pub mod broker_factory;
pub mod claude_analyst;
pub mod synthetic_broker;
