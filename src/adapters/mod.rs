//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_decision_log;
pub mod file_config_adapter;
pub mod paper_broker;
#[cfg(feature = "sqlite")]
pub mod sqlite_decision_log;
pub mod system_clock;
