//! CLI definition and dispatch.

use chrono::{Datelike, Weekday};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_decision_log::CsvDecisionLog;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_broker::PaperBroker;
#[cfg(feature = "sqlite")]
use crate::adapters::sqlite_decision_log::SqliteDecisionLog;
use crate::adapters::system_clock::SystemClock;
use crate::domain::config_validation::validate_trader_config;
use crate::domain::cycle::CycleContext;
use crate::domain::decision::DecisionRecord;
use crate::domain::error::TraderError;
use crate::domain::indicator::{latest_indicator_set, IndicatorSet};
use crate::domain::ohlcv::bars_as_of;
use crate::domain::runner::{CycleRunner, StopHandle};
use crate::domain::signal::{generate_signal, SignalDecision};
use crate::domain::trader_config::{LogBackend, TraderConfig};
use crate::ports::clock_port::Clock;
use crate::ports::config_port::ConfigPort;
use crate::ports::decision_log_port::DecisionLogPort;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "dailytrade", about = "Single-instrument RSI/MACD daily trader")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one cycle now and append its decision record
    Once {
        #[arg(short, long)]
        config: PathBuf,
        /// Trade this symbol instead of the configured one
        #[arg(long)]
        symbol: Option<String>,
        /// Plan orders but do not submit them
        #[arg(long)]
        dry_run: bool,
    },
    /// Run cycles on the configured schedule
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Stop after this many cycles
        #[arg(long)]
        max_cycles: Option<u64>,
        /// Run the first cycle immediately instead of waiting for the schedule
        #[arg(long)]
        immediate: bool,
    },
    /// Validate a trader configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the latest indicator values and signal without trading
    Indicators {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Once {
            config,
            symbol,
            dry_run,
        } => run_once(&config, symbol.as_deref(), dry_run),
        Command::Run {
            config,
            max_cycles,
            immediate,
        } => run_scheduled(&config, max_cycles, immediate),
        Command::Validate { config } => run_validate(&config),
        Command::Indicators { config } => run_indicators(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

pub fn build_trader_config(adapter: &dyn ConfigPort) -> Result<TraderConfig, TraderError> {
    TraderConfig::from_config(adapter)
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_trader_config(path: &PathBuf) -> Result<TraderConfig, ExitCode> {
    let adapter = load_config(path)?;
    build_trader_config(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

/// Open the configured decision log backend.
pub fn open_decision_log(trader: &TraderConfig) -> Result<Box<dyn DecisionLogPort>, TraderError> {
    match trader.log_backend {
        LogBackend::Csv => Ok(Box::new(CsvDecisionLog::new(trader.decisions_csv.clone()))),
        #[cfg(feature = "sqlite")]
        LogBackend::Sqlite => {
            let path = trader
                .sqlite_path
                .as_ref()
                .ok_or_else(|| TraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;
            Ok(Box::new(SqliteDecisionLog::open(path, trader.sqlite_pool_size)?))
        }
        #[cfg(not(feature = "sqlite"))]
        LogBackend::Sqlite => Err(TraderError::invalid(
            "log",
            "backend",
            "built without sqlite support",
        )),
    }
}

fn is_trading_day(day: Weekday) -> bool {
    !matches!(day, Weekday::Sat | Weekday::Sun)
}

/// Bring the paper account up to date before a cycle: mark the holding to
/// the latest price, roll the session and open the market on weekdays.
pub fn prepare_paper_session(
    broker: &PaperBroker,
    market_data: &dyn MarketDataPort,
    symbol: &str,
    clock: &dyn Clock,
) {
    match market_data.fetch_latest_price(symbol) {
        Ok(Some(price)) => broker.mark_to(price),
        Ok(None) => {}
        Err(e) => error!(%symbol, error = %e, "could not mark paper account"),
    }
    broker.roll_session();
    broker.set_market_open(is_trading_day(clock.now().weekday()));
}

/// Run one cycle through `runner` and append the record. `Ok(None)` when the
/// runner was busy.
pub fn run_cycle_and_log(
    ctx: &CycleContext<'_>,
    runner: &CycleRunner,
    trader: &TraderConfig,
    log: &dyn DecisionLogPort,
) -> Result<Option<DecisionRecord>, TraderError> {
    let Some(record) = runner.run_cycle(ctx, &trader.symbol, trader.rule_set, &trader.sizing)
    else {
        return Ok(None);
    };
    log.append(&record)?;
    Ok(Some(record))
}

fn print_record(record: &DecisionRecord) {
    let signal = record
        .signal
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{} {} signal={} outcome={}",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.symbol,
        signal,
        record.outcome
    );
    for leg in &record.legs {
        println!("  {}", leg);
    }
}

fn run_once(config_path: &PathBuf, symbol: Option<&str>, dry_run: bool) -> ExitCode {
    let mut trader = match load_trader_config(config_path) {
        Ok(t) => t,
        Err(code) => return code,
    };
    if let Some(symbol) = symbol {
        trader.symbol = symbol.trim().to_ascii_uppercase();
    }
    if dry_run {
        trader.cycle.execute = false;
    }
    init_logging(&trader.log_level);

    let market_data = CsvAdapter::new(trader.bars_dir.clone());
    let broker = PaperBroker::new(&trader.symbol, trader.paper_initial_cash)
        .with_position(trader.paper_initial_position);
    let clock = SystemClock;
    let log = match open_decision_log(&trader) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    prepare_paper_session(&broker, &market_data, &trader.symbol, &clock);

    let ctx = CycleContext {
        market_data: &market_data,
        broker: &broker,
        clock: &clock,
        config: &trader.cycle,
    };
    match run_cycle_and_log(&ctx, &CycleRunner::new(), &trader, log.as_ref()) {
        Ok(Some(record)) => {
            print_record(&record);
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Route Ctrl-C and SIGTERM to `handle` so the scheduler stops between
/// cycles instead of dying mid-cycle.
pub fn install_stop_handler(handle: StopHandle) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        handle.request_stop();
    })
}

fn run_scheduled(config_path: &PathBuf, max_cycles: Option<u64>, immediate: bool) -> ExitCode {
    let trader = match load_trader_config(config_path) {
        Ok(t) => t,
        Err(code) => return code,
    };
    init_logging(&trader.log_level);

    let market_data = CsvAdapter::new(trader.bars_dir.clone());
    let broker = PaperBroker::new(&trader.symbol, trader.paper_initial_cash)
        .with_position(trader.paper_initial_position);
    let clock = SystemClock;
    let log = match open_decision_log(&trader) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let runner = CycleRunner::new();
    if let Err(e) = install_stop_handler(runner.stop_handle()) {
        warn!(error = %e, "could not install signal handler");
    }
    let ctx = CycleContext {
        market_data: &market_data,
        broker: &broker,
        clock: &clock,
        config: &trader.cycle,
    };

    info!(
        symbol = %trader.symbol,
        rule_set = %trader.rule_set,
        run_at = %trader.schedule.run_at,
        "scheduler started"
    );

    let mut completed: u64 = 0;
    let mut wait_first = !immediate;
    while !runner.stop_requested() {
        if wait_first {
            let next = trader.schedule.next_run_after(clock.now().naive_utc());
            info!(next_run = %next, "waiting for next cycle");
            if !runner.wait_until(&clock, next) {
                break;
            }
        }
        wait_first = true;

        prepare_paper_session(&broker, &market_data, &trader.symbol, &clock);
        match run_cycle_and_log(&ctx, &runner, &trader, log.as_ref()) {
            Ok(Some(record)) => print_record(&record),
            Ok(None) => {}
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        }

        completed += 1;
        if max_cycles.is_some_and(|max| completed >= max) {
            runner.request_stop();
        }
    }

    info!(cycles = completed, "scheduler stopped");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_trader_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    let trader = match build_trader_config(&adapter) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let params = &trader.cycle.indicator_params;
    eprintln!("\nSymbol:     {}", trader.symbol);
    eprintln!("Rule set:   {}", trader.rule_set);
    eprintln!("Indicators: {}, {}", params.rsi_type(), params.macd_type());
    eprintln!("Warm-up:    {} bars", params.warmup_bars());
    eprintln!("Sizing:     {:?}", trader.sizing);
    eprintln!(
        "Schedule:   {} UTC{}",
        trader.schedule.run_at.format("%H:%M"),
        if trader.schedule.weekdays_only {
            ", weekdays only"
        } else {
            ""
        }
    );
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

/// Latest indicator set and signal for `symbol`, without touching a broker.
pub fn latest_indicators(
    market_data: &dyn MarketDataPort,
    clock: &dyn Clock,
    trader: &TraderConfig,
) -> Result<(IndicatorSet, SignalDecision), TraderError> {
    let config = &trader.cycle;
    let now = clock.now();
    let end = now.date_naive();
    let start = config.window_start(end)?;
    let bars = market_data.fetch_bars(&trader.symbol, start, end, &config.interval)?;
    let bars = bars_as_of(&bars, now.naive_utc());
    let params = &config.indicator_params;
    let set = latest_indicator_set(bars, params).ok_or_else(|| {
        TraderError::data_unavailable(format!(
            "insufficient history: have {} bars, need {}",
            bars.len(),
            params.warmup_bars()
        ))
    })?;
    Ok((set, generate_signal(&set, trader.rule_set)))
}

fn run_indicators(config_path: &PathBuf) -> ExitCode {
    let trader = match load_trader_config(config_path) {
        Ok(t) => t,
        Err(code) => return code,
    };
    init_logging(&trader.log_level);

    let market_data = CsvAdapter::new(trader.bars_dir.clone());
    match latest_indicators(&market_data, &SystemClock, &trader) {
        Ok((set, decision)) => {
            let params = &trader.cycle.indicator_params;
            println!("{}", trader.symbol);
            println!("  {:<14} {:>10.2}", params.rsi_type().to_string(), set.rsi);
            println!("  {:<14} {:>10.4}", params.macd_type().to_string(), set.macd);
            println!("  {:<14} {:>10.4}", "MACD signal", set.macd_signal);
            println!("  {:<14} {:>10.4}", "MACD histogram", set.macd_histogram);
            println!(
                "  Signal ({}): {}{}",
                trader.rule_set,
                decision.signal,
                if decision.ambiguous { " (ambiguous)" } else { "" }
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}
