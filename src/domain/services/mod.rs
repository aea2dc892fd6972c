pub mod ai_signal;
pub mod indicators;
pub mod position_sizer;
pub mod signal_generator;
pub mod trade_executor;
pub mod trade_monitor;
