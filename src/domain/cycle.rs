//! One evaluation cycle: bars → indicators → signal → sizing → reconciliation.
//!
//! `evaluate_cycle` always returns a `DecisionRecord`. Data problems end the
//! cycle early with a `Skipped` outcome; they are never turned into a HOLD or
//! a flat position.

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use super::decision::{CycleOutcome, DecisionRecord};
use super::error::TraderError;
use super::indicator::{latest_indicator_set, IndicatorParams};
use super::ohlcv::{bars_as_of, is_strictly_increasing};
use super::order::TimeInForce;
use super::reconcile::{execute_plan, hold_plan, plan_legs, target_quantity};
use super::signal::{generate_signal, RuleSet, Signal};
use super::sizing::{size_position, PriceSource, SizingPolicy};
use crate::ports::broker_port::BrokerPort;
use crate::ports::clock_port::Clock;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct CycleConfig {
    pub indicator_params: IndicatorParams,
    pub interval: String,
    pub lookback_days: i64,
    pub time_in_force: TimeInForce,
    /// Submit planned legs; when false the cycle only records them.
    pub execute: bool,
    pub require_market_open: bool,
    /// 0 disables the guard.
    pub daily_loss_limit_pct: f64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        CycleConfig {
            indicator_params: IndicatorParams::default(),
            interval: "1d".to_string(),
            lookback_days: 180,
            time_in_force: TimeInForce::Day,
            execute: true,
            require_market_open: true,
            daily_loss_limit_pct: 0.0,
        }
    }
}

impl CycleConfig {
    /// First date of the bar window ending at `end`.
    pub fn window_start(&self, end: NaiveDate) -> Result<NaiveDate, TraderError> {
        Duration::try_days(self.lookback_days)
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| {
                TraderError::data_unavailable(format!(
                    "lookback of {} days reaches before the earliest date",
                    self.lookback_days
                ))
            })
    }
}

/// Collaborators for a cycle, passed in explicitly rather than held globally.
pub struct CycleContext<'a> {
    pub market_data: &'a dyn MarketDataPort,
    pub broker: &'a dyn BrokerPort,
    pub clock: &'a dyn Clock,
    pub config: &'a CycleConfig,
}

fn skip(mut record: DecisionRecord, err: TraderError) -> DecisionRecord {
    warn!(symbol = %record.symbol, error = %err, "cycle skipped");
    record.outcome = CycleOutcome::Skipped {
        reason: err.to_string(),
    };
    record
}

fn unavailable(what: &str, err: TraderError) -> TraderError {
    match err {
        TraderError::DataUnavailable { .. } => err,
        other => TraderError::data_unavailable(format!("{} failed: {}", what, other)),
    }
}

pub fn evaluate_cycle(
    ctx: &CycleContext<'_>,
    symbol: &str,
    rule_set: RuleSet,
    sizing_policy: &SizingPolicy,
) -> DecisionRecord {
    let now = ctx.clock.now();
    let config = ctx.config;
    let mut record = DecisionRecord::new(now, symbol);
    info!(%symbol, %rule_set, "cycle started");

    let end = now.date_naive();
    let start = match config.window_start(end) {
        Ok(start) => start,
        Err(e) => return skip(record, e),
    };
    let bars = match ctx
        .market_data
        .fetch_bars(symbol, start, end, &config.interval)
    {
        Ok(bars) => bars,
        Err(e) => return skip(record, unavailable("bar fetch", e)),
    };
    if !is_strictly_increasing(&bars) {
        return skip(
            record,
            TraderError::data_unavailable("bar timestamps are not strictly increasing"),
        );
    }
    let bars = bars_as_of(&bars, now.naive_utc());

    let params = &config.indicator_params;
    let Some(indicators) = latest_indicator_set(bars, params) else {
        return skip(
            record,
            TraderError::data_unavailable(format!(
                "insufficient history: have {} bars, need {}",
                bars.len(),
                params.warmup_bars()
            )),
        );
    };
    let close = bars.last().map(|b| b.close);
    record.close_price = close;
    record.indicators = Some(indicators);
    debug!(
        rsi = indicators.rsi,
        macd = indicators.macd,
        macd_signal = indicators.macd_signal,
        "{} / {}",
        params.rsi_type(),
        params.macd_type()
    );

    let decision = generate_signal(&indicators, rule_set);
    record.signal = Some(decision.signal);
    record.ambiguous_signal = decision.ambiguous;

    let account = match ctx.broker.fetch_account() {
        Ok(a) => a,
        Err(e) => return skip(record, unavailable("account lookup", e)),
    };
    record.account = Some(account);

    let position = match ctx.broker.fetch_position(symbol) {
        Ok(p) => p,
        Err(e) => return skip(record, unavailable("position lookup", e)),
    };
    record.current_quantity = Some(position.quantity);

    let mut signal = decision.signal;
    if signal != Signal::Hold && account.daily_loss_limit_breached(config.daily_loss_limit_pct) {
        warn!(
            portfolio_value = account.portfolio_value,
            last_equity = account.last_equity,
            "daily loss limit reached; holding"
        );
        record.loss_limit_hit = true;
        signal = Signal::Hold;
    }

    let live_price = match ctx.market_data.fetch_latest_price(symbol) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "latest price unavailable; sizing from fallback price");
            None
        }
    };
    let sizing = size_position(account.buying_power, live_price, sizing_policy);
    record.target_quantity = Some(target_quantity(&position, signal, sizing.shares));
    record.price_source = Some(sizing.price_source);
    if sizing.price_source == PriceSource::Fallback {
        warn!(%symbol, shares = sizing.shares, "sized from fallback_price_per_share");
    }

    let plan = plan_legs(&position, signal, sizing.shares, config.time_in_force);
    info!(
        %symbol,
        signal = %signal,
        position = position.quantity,
        sized = sizing.shares,
        legs = plan.len(),
        "reconciliation planned"
    );

    if plan.is_empty() {
        record.outcome = CycleOutcome::NoAction;
        return record;
    }

    if !config.execute {
        record.legs = hold_plan(plan);
        record.outcome = CycleOutcome::AnalyzeOnly;
        return record;
    }

    if config.require_market_open {
        match ctx.broker.is_market_open() {
            Ok(true) => {}
            Ok(false) => {
                info!(%symbol, "market closed; legs not submitted");
                record.legs = hold_plan(plan);
                record.outcome = CycleOutcome::MarketClosed;
                return record;
            }
            Err(e) => return skip(record, unavailable("market clock lookup", e)),
        }
    }

    record.legs = execute_plan(plan, ctx.broker);
    record.outcome = CycleOutcome::from_legs(&record.legs);
    info!(%symbol, outcome = %record.outcome, "cycle finished");
    record
}
