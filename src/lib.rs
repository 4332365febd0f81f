//! Single-instrument RSI/MACD signal trader.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. Each evaluation cycle turns a bar
//! series into a signal, sizes a target position and reconciles the broker
//! position towards it.

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
