//! Core domain types and logic.

pub mod ohlcv;
pub mod position;
pub mod execution;
pub mod portfolio;
pub mod signal;
pub mod indicator;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod timeframe;
pub mod config_validation;
pub mod error;
