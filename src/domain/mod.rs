//! Core domain types and logic.

pub mod account;
pub mod config_validation;
pub mod cycle;
pub mod decision;
pub mod error;
pub mod indicator;
pub mod ohlcv;
pub mod order;
pub mod position;
pub mod reconcile;
pub mod runner;
pub mod schedule;
pub mod signal;
pub mod sizing;
pub mod trader_config;
