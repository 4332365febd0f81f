//! Configuration validation.
//!
//! Everything is checked up front so configuration errors surface at startup
//! and never in the middle of a run. The `parse_*` helpers are shared with
//! `cli::build_trader_config`.

use chrono::NaiveTime;

use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorParams;
use crate::domain::order::TimeInForce;
use crate::domain::signal::RuleSet;
use crate::domain::sizing::SizingPolicy;
use crate::domain::trader_config::LogBackend;
use crate::ports::config_port::ConfigPort;

/// Upper bound on `lookback_days`, about a century of calendar days.
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

pub fn validate_trader_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    config.require_string("trader", "symbol")?;
    parse_rule_set(config)?;
    parse_time_in_force(config)?;
    validate_lookback(config)?;
    validate_interval(config)?;
    parse_indicator_params(config)?;
    parse_sizing_policy(config)?;
    validate_loss_limit(config)?;
    parse_run_at(config)?;
    validate_paper(config)?;
    config.require_string("data", "bars_dir")?;
    if parse_log_backend(config)? == LogBackend::Sqlite {
        config.require_string("sqlite", "path")?;
    }
    Ok(())
}

pub fn parse_log_backend(config: &dyn ConfigPort) -> Result<LogBackend, TraderError> {
    let name = config
        .get_string("log", "backend")
        .unwrap_or_else(|| "csv".to_string());
    match name.trim().to_ascii_lowercase().as_str() {
        "csv" => Ok(LogBackend::Csv),
        "sqlite" if cfg!(feature = "sqlite") => Ok(LogBackend::Sqlite),
        "sqlite" => Err(TraderError::invalid(
            "log",
            "backend",
            "built without sqlite support",
        )),
        other => Err(TraderError::invalid(
            "log",
            "backend",
            format!("unknown decision log backend '{}' (expected csv or sqlite)", other),
        )),
    }
}

pub fn parse_rule_set(config: &dyn ConfigPort) -> Result<RuleSet, TraderError> {
    config
        .get_string("trader", "rule_set")
        .unwrap_or_else(|| "conservative".to_string())
        .parse()
}

pub fn parse_time_in_force(config: &dyn ConfigPort) -> Result<TimeInForce, TraderError> {
    match config.get_string("trader", "time_in_force") {
        Some(s) => s.parse(),
        None => Ok(TimeInForce::default()),
    }
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let days = config.get_int("trader", "lookback_days", 180);
    if !(1..=MAX_LOOKBACK_DAYS).contains(&days) {
        return Err(TraderError::invalid(
            "trader",
            "lookback_days",
            format!("lookback_days must be between 1 and {}", MAX_LOOKBACK_DAYS),
        ));
    }
    Ok(())
}

fn validate_interval(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match config.get_string("trader", "interval") {
        Some(s) if s.trim().is_empty() => Err(TraderError::invalid(
            "trader",
            "interval",
            "interval must not be empty",
        )),
        _ => Ok(()),
    }
}

fn period(config: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, TraderError> {
    let value = config.get_int("indicators", key, default as i64);
    if value < 1 {
        return Err(TraderError::invalid(
            "indicators",
            key,
            format!("{} must be at least 1", key),
        ));
    }
    Ok(value as usize)
}

pub fn parse_indicator_params(config: &dyn ConfigPort) -> Result<IndicatorParams, TraderError> {
    let defaults = IndicatorParams::default();
    let params = IndicatorParams {
        rsi_period: period(config, "rsi_period", defaults.rsi_period)?,
        macd_fast: period(config, "macd_fast", defaults.macd_fast)?,
        macd_slow: period(config, "macd_slow", defaults.macd_slow)?,
        macd_signal: period(config, "macd_signal", defaults.macd_signal)?,
    };
    if params.macd_fast >= params.macd_slow {
        return Err(TraderError::invalid(
            "indicators",
            "macd_fast",
            "macd_fast must be less than macd_slow",
        ));
    }
    Ok(params)
}

pub fn parse_sizing_policy(config: &dyn ConfigPort) -> Result<SizingPolicy, TraderError> {
    let policy_name = config
        .get_string("sizing", "policy")
        .unwrap_or_else(|| "percent".to_string());

    let policy = match policy_name.trim().to_ascii_lowercase().as_str() {
        "percent" => {
            let minimum = config.get_int("sizing", "minimum_shares", 1);
            if minimum < 1 {
                return Err(TraderError::invalid(
                    "sizing",
                    "minimum_shares",
                    "minimum_shares must be at least 1",
                ));
            }
            SizingPolicy::PercentOfBuyingPower {
                allocation_fraction: config.get_double("sizing", "allocation_fraction", 0.1),
                minimum_shares: minimum as u64,
                fallback_price_per_share: config.get_double(
                    "sizing",
                    "fallback_price_per_share",
                    0.0,
                ),
            }
        }
        "fixed" => {
            let shares = config.get_int("sizing", "fixed_shares", 1);
            if shares < 1 {
                return Err(TraderError::invalid(
                    "sizing",
                    "fixed_shares",
                    "fixed_shares must be at least 1",
                ));
            }
            SizingPolicy::FixedQuantity {
                shares: shares as u64,
            }
        }
        other => {
            return Err(TraderError::invalid(
                "sizing",
                "policy",
                format!("unknown sizing policy '{}' (expected percent or fixed)", other),
            ));
        }
    };
    policy.validate()?;
    Ok(policy)
}

fn validate_loss_limit(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = config.get_double("risk", "daily_loss_limit_pct", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(TraderError::invalid(
            "risk",
            "daily_loss_limit_pct",
            "daily_loss_limit_pct must be between 0 and 1",
        ));
    }
    Ok(())
}

pub fn parse_run_at(config: &dyn ConfigPort) -> Result<Option<NaiveTime>, TraderError> {
    match config.get_string("schedule", "run_at") {
        None => Ok(None),
        Some(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Some)
            .map_err(|_| {
                TraderError::invalid("schedule", "run_at", "invalid run_at format, expected HH:MM")
            }),
    }
}

fn validate_paper(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let cash = config.get_double("paper", "initial_cash", 100_000.0);
    if cash <= 0.0 {
        return Err(TraderError::invalid(
            "paper",
            "initial_cash",
            "initial_cash must be positive",
        ));
    }
    Ok(())
}
