//! Typed trader configuration, built from a `ConfigPort` at startup.

use std::path::PathBuf;

use super::config_validation::{
    parse_indicator_params, parse_log_backend, parse_rule_set, parse_run_at,
    parse_sizing_policy, parse_time_in_force, validate_trader_config,
};
use super::cycle::CycleConfig;
use super::error::TraderError;
use super::schedule::Schedule;
use super::signal::RuleSet;
use super::sizing::SizingPolicy;
use crate::ports::config_port::ConfigPort;

/// Where decision records are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogBackend {
    #[default]
    Csv,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraderConfig {
    pub symbol: String,
    pub rule_set: RuleSet,
    pub sizing: SizingPolicy,
    pub cycle: CycleConfig,
    pub bars_dir: PathBuf,
    pub log_backend: LogBackend,
    pub decisions_csv: PathBuf,
    /// Database file for the sqlite backend.
    pub sqlite_path: Option<PathBuf>,
    pub sqlite_pool_size: u32,
    pub paper_initial_cash: f64,
    pub paper_initial_position: i64,
    pub schedule: Schedule,
    pub log_level: String,
}

impl TraderConfig {
    /// Validate, then read every section into typed values.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        validate_trader_config(config)?;

        let defaults = CycleConfig::default();
        let cycle = CycleConfig {
            indicator_params: parse_indicator_params(config)?,
            interval: config
                .get_string("trader", "interval")
                .map(|s| s.trim().to_string())
                .unwrap_or(defaults.interval),
            lookback_days: config.get_int("trader", "lookback_days", defaults.lookback_days),
            time_in_force: parse_time_in_force(config)?,
            execute: config.get_bool("trader", "execute", defaults.execute),
            require_market_open: config.get_bool(
                "trader",
                "require_market_open",
                defaults.require_market_open,
            ),
            daily_loss_limit_pct: config.get_double("risk", "daily_loss_limit_pct", 0.0),
        };

        let default_schedule = Schedule::default();
        let schedule = Schedule {
            run_at: parse_run_at(config)?.unwrap_or(default_schedule.run_at),
            weekdays_only: config.get_bool(
                "schedule",
                "weekdays_only",
                default_schedule.weekdays_only,
            ),
        };

        Ok(TraderConfig {
            symbol: config.require_string("trader", "symbol")?.to_ascii_uppercase(),
            rule_set: parse_rule_set(config)?,
            sizing: parse_sizing_policy(config)?,
            cycle,
            bars_dir: PathBuf::from(config.require_string("data", "bars_dir")?),
            log_backend: parse_log_backend(config)?,
            decisions_csv: PathBuf::from(
                config
                    .get_string("log", "decisions_csv")
                    .unwrap_or_else(|| "decisions.csv".to_string()),
            ),
            sqlite_path: config
                .get_string("sqlite", "path")
                .map(|p| PathBuf::from(p.trim())),
            sqlite_pool_size: config.get_int("sqlite", "pool_size", 2).clamp(1, 16) as u32,
            paper_initial_cash: config.get_double("paper", "initial_cash", 100_000.0),
            paper_initial_position: config.get_int("paper", "initial_position", 0),
            schedule,
            log_level: config
                .get_string("logging", "level")
                .unwrap_or_else(|| "info".to_string()),
        })
    }
}
