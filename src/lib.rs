//! GOLDEX Trading Bot Library
//!
//! Signal generation, position sizing and order execution for a single
//! instrument, driven by a scheduled session loop.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod secrets;
pub mod task_runner;
