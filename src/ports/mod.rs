//! Port traits for the collaborators a cycle talks to.
//!
//! The core only ever sees these traits; concrete implementations live in
//! [`crate::adapters`] and are injected through [`crate::domain::cycle::CycleContext`].

pub mod broker_port;
pub mod clock_port;
pub mod config_port;
pub mod decision_log_port;
pub mod market_data_port;
