//! End-to-end cycle tests against mock ports.
//!
//! Tests cover:
//! - Signal → reconciliation for every position/signal combination
//! - Partial failure: a failed or pending close leg blocks the open leg
//! - Data unavailability: skipped cycles never submit orders
//! - Idempotence across repeated cycles
//! - Market-hours gate, analyze-only mode and the daily loss limit
//! - No look-ahead past the clock
//! - The re-entrancy guard

mod common;

use approx::assert_relative_eq;
use chrono::NaiveDate;
use common::*;
use dailytrade::domain::account::Account;
use dailytrade::domain::cycle::{evaluate_cycle, CycleConfig, CycleContext};
use dailytrade::domain::decision::{CycleOutcome, DecisionRecord};
use dailytrade::domain::order::{OrderSide, OrderStatus};
use dailytrade::domain::reconcile::{LegKind, LegStatus};
use dailytrade::domain::runner::CycleRunner;
use dailytrade::domain::signal::{RuleSet, Signal};
use dailytrade::domain::sizing::{PriceSource, SizingPolicy};

const SYMBOL: &str = "SPY";

fn policy() -> SizingPolicy {
    SizingPolicy::PercentOfBuyingPower {
        allocation_fraction: 0.1,
        minimum_shares: 1,
        fallback_price_per_share: 50.0,
    }
}

fn cycle_with(
    market: &MockMarketData,
    broker: &MockBroker,
    config: &CycleConfig,
    rule_set: RuleSet,
) -> DecisionRecord {
    let clock = default_clock();
    let ctx = CycleContext {
        market_data: market,
        broker,
        clock: &clock,
        config,
    };
    evaluate_cycle(&ctx, SYMBOL, rule_set, &policy())
}

fn cycle(market: &MockMarketData, broker: &MockBroker) -> DecisionRecord {
    cycle_with(market, broker, &CycleConfig::default(), RuleSet::Conservative)
}

fn overbought() -> MockMarketData {
    MockMarketData::new().with_bars(SYMBOL, bars_from_closes(SYMBOL, &overbought_closes()))
}

fn oversold() -> MockMarketData {
    MockMarketData::new().with_bars(SYMBOL, bars_from_closes(SYMBOL, &oversold_closes()))
}

mod reconciliation {
    use super::*;

    #[test]
    fn flat_and_hold_submits_nothing() {
        let market = MockMarketData::new().with_bars(SYMBOL, bars_from_closes(SYMBOL, &flat_closes(40)));
        let broker = MockBroker::new(0);

        let record = cycle(&market, &broker);

        assert_eq!(record.signal, Some(Signal::Hold));
        assert_eq!(record.outcome, CycleOutcome::NoAction);
        assert!(record.legs.is_empty());
        assert_eq!(record.current_quantity, Some(0));
        assert_eq!(record.target_quantity, Some(0));
        assert!(broker.submitted().is_empty());
        let ind = record.indicators.unwrap();
        assert_relative_eq!(ind.rsi, 50.0);
        assert_relative_eq!(ind.macd, 0.0);
    }

    #[test]
    fn long_on_sell_closes_then_opens_short() {
        let market = overbought();
        let broker = MockBroker::new(10);

        let record = cycle(&market, &broker);

        assert_eq!(record.signal, Some(Signal::Sell));
        assert_eq!(record.close_price, Some(157.0));
        // 10% of 100k at 157 → 63 shares
        assert_eq!(record.target_quantity, Some(-63));
        assert_eq!(record.outcome, CycleOutcome::Executed);

        let submitted = broker.submitted();
        assert_eq!(submitted.len(), 2);
        assert_eq!((submitted[0].side, submitted[0].quantity), (OrderSide::Sell, 10));
        assert_eq!((submitted[1].side, submitted[1].quantity), (OrderSide::Sell, 63));
        assert_eq!(record.legs[0].leg.kind, LegKind::Close);
        assert_eq!(record.legs[1].leg.kind, LegKind::Open);
        assert_eq!(broker.quantity.get(), -63);
    }

    #[test]
    fn short_on_buy_closes_then_opens_long() {
        let market = oversold();
        let broker = MockBroker::new(-5);

        let record = cycle(&market, &broker);

        assert_eq!(record.signal, Some(Signal::Buy));
        let submitted = broker.submitted();
        assert_eq!(submitted.len(), 2);
        assert_eq!((submitted[0].side, submitted[0].quantity), (OrderSide::Buy, 5));
        // 10% of 100k at 143 → 69 shares
        assert_eq!((submitted[1].side, submitted[1].quantity), (OrderSide::Buy, 69));
        assert_eq!(record.target_quantity, Some(69));
        assert_eq!(broker.quantity.get(), 69);
    }

    #[test]
    fn flat_on_sell_opens_short_only() {
        let market = overbought();
        let broker = MockBroker::new(0);

        let record = cycle(&market, &broker);

        let submitted = broker.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].side, OrderSide::Sell);
        assert_eq!(record.legs[0].leg.kind, LegKind::Open);
    }

    #[test]
    fn already_positioned_is_no_action() {
        let broker = MockBroker::new(-20);
        let record = cycle(&overbought(), &broker);
        assert_eq!(record.outcome, CycleOutcome::NoAction);
        assert_eq!(record.target_quantity, Some(-20));
        assert!(broker.submitted().is_empty());

        let broker = MockBroker::new(20);
        let record = cycle(&oversold(), &broker);
        assert_eq!(record.outcome, CycleOutcome::NoAction);
        assert!(broker.submitted().is_empty());
    }

    #[test]
    fn hold_keeps_existing_position() {
        let market = MockMarketData::new().with_bars(SYMBOL, bars_from_closes(SYMBOL, &flat_closes(40)));
        let broker = MockBroker::new(12);
        let record = cycle(&market, &broker);
        assert_eq!(record.target_quantity, Some(12));
        assert!(broker.submitted().is_empty());
    }

    #[test]
    fn aggressive_rule_set_agrees_on_extremes() {
        let config = CycleConfig::default();
        let broker = MockBroker::new(0);
        let record = cycle_with(&overbought(), &broker, &config, RuleSet::Aggressive);
        assert_eq!(record.signal, Some(Signal::Sell));

        let broker = MockBroker::new(0);
        let record = cycle_with(&oversold(), &broker, &config, RuleSet::Aggressive);
        assert_eq!(record.signal, Some(Signal::Buy));
    }

    #[test]
    fn huge_buying_power_still_buys() {
        let market = oversold();
        let broker = MockBroker::new(0).with_account(Account {
            buying_power: 1e30,
            portfolio_value: 1e30,
            cash: 1e30,
            last_equity: 1e30,
        });

        let record = cycle(&market, &broker);

        assert_eq!(record.signal, Some(Signal::Buy));
        assert_eq!(record.target_quantity, Some(i64::MAX));
        assert_eq!(broker.submitted()[0].side, OrderSide::Buy);
        assert_eq!(broker.submitted()[0].quantity, i64::MAX as u64);
    }

    #[test]
    fn fixed_quantity_policy() {
        let clock = default_clock();
        let market = oversold();
        let broker = MockBroker::new(0);
        let config = CycleConfig::default();
        let ctx = CycleContext {
            market_data: &market,
            broker: &broker,
            clock: &clock,
            config: &config,
        };
        let record = evaluate_cycle(
            &ctx,
            SYMBOL,
            RuleSet::Conservative,
            &SizingPolicy::FixedQuantity { shares: 1 },
        );
        assert_eq!(record.target_quantity, Some(1));
        assert_eq!(broker.submitted()[0].quantity, 1);
    }
}

mod partial_failure {
    use super::*;

    #[test]
    fn rejected_close_blocks_open() {
        let market = overbought();
        let broker = MockBroker::new(10).rejecting(&[0]);

        let record = cycle(&market, &broker);

        assert_eq!(record.outcome, CycleOutcome::CloseRejected);
        assert_eq!(broker.submitted().len(), 1);
        assert!(matches!(record.legs[0].status, LegStatus::Rejected { .. }));
        assert_eq!(record.legs[1].status, LegStatus::NotAttempted);
        assert_eq!(broker.quantity.get(), 10);
        assert_eq!(record.submitted_intents().count(), 1);
    }

    #[test]
    fn rejected_open_after_close_leaves_flat() {
        let market = overbought();
        let broker = MockBroker::new(10).rejecting(&[1]);

        let record = cycle(&market, &broker);

        assert_eq!(record.outcome, CycleOutcome::OpenRejected);
        assert_eq!(broker.submitted().len(), 2);
        assert_eq!(broker.quantity.get(), 0);
    }

    #[test]
    fn cancelled_close_counts_as_failure() {
        let market = overbought();
        let mut broker = MockBroker::new(10);
        broker.status = OrderStatus::Cancelled;

        let record = cycle(&market, &broker);

        assert_eq!(record.outcome, CycleOutcome::CloseRejected);
        assert_eq!(broker.submitted().len(), 1);
    }

    #[test]
    fn pending_close_defers_open_to_next_cycle() {
        let market = overbought();
        let mut broker = MockBroker::new(10);
        broker.status = OrderStatus::Pending;

        let first = cycle(&market, &broker);
        assert_eq!(first.outcome, CycleOutcome::ClosePending);
        assert_eq!(broker.submitted().len(), 1);
        assert_eq!(broker.submitted()[0].side, OrderSide::Sell);
        assert_eq!(broker.submitted()[0].quantity, 10);
        assert_eq!(first.legs[1].status, LegStatus::NotAttempted);
        assert_eq!(broker.quantity.get(), 10);

        // the next cycle starts from a fresh position snapshot
        broker.status = OrderStatus::Filled;
        let second = cycle(&market, &broker);
        assert_eq!(second.outcome, CycleOutcome::Executed);
        assert_eq!(broker.quantity.get(), -63);
    }

    #[test]
    fn retry_after_close_failure_does_not_duplicate() {
        let market = overbought();
        let mut broker = MockBroker::new(10).rejecting(&[0]);
        let first = cycle(&market, &broker);
        assert_eq!(first.outcome, CycleOutcome::CloseRejected);

        broker.reject_at.clear();
        let second = cycle(&market, &broker);
        assert_eq!(second.outcome, CycleOutcome::Executed);
        // one rejected attempt plus the retried close and the open
        assert_eq!(broker.submitted().len(), 3);
        assert_eq!(broker.quantity.get(), -63);
    }
}

mod data_unavailable {
    use super::*;

    #[test]
    fn position_lookup_failure_skips_without_orders() {
        let market = overbought();
        let broker = MockBroker::new(10).with_position_error("timeout");

        let record = cycle(&market, &broker);

        assert!(record.is_skipped());
        assert_eq!(record.signal, Some(Signal::Sell));
        assert_eq!(record.current_quantity, None);
        assert!(record.legs.is_empty());
        assert!(broker.submitted().is_empty());
        assert!(record.outcome.to_string().contains("timeout"));
    }

    #[test]
    fn account_lookup_failure_skips() {
        let broker = MockBroker::new(0).with_account_error("503");
        let record = cycle(&overbought(), &broker);
        assert!(record.is_skipped());
        assert!(record.account.is_none());
        assert!(broker.submitted().is_empty());
    }

    #[test]
    fn bar_fetch_failure_skips() {
        let market = MockMarketData::new().with_bar_error("feed down");
        let broker = MockBroker::new(0);
        let record = cycle(&market, &broker);
        assert_eq!(
            record.outcome,
            CycleOutcome::Skipped {
                reason: "data unavailable: feed down".into()
            }
        );
        assert_eq!(record.signal, None);
    }

    #[test]
    fn insufficient_history_skips() {
        let market = MockMarketData::new().with_bars(SYMBOL, bars_from_closes(SYMBOL, &flat_closes(20)));
        let broker = MockBroker::new(0);

        let record = cycle(&market, &broker);

        assert!(record.is_skipped());
        assert!(record.outcome.to_string().contains("have 20 bars, need 34"));
        assert!(record.indicators.is_none());
        assert!(broker.submitted().is_empty());
    }

    #[test]
    fn exactly_warmup_bars_is_enough() {
        let market = MockMarketData::new().with_bars(SYMBOL, bars_from_closes(SYMBOL, &flat_closes(34)));
        let record = cycle(&market, &MockBroker::new(0));
        assert!(!record.is_skipped());
        assert_eq!(record.signal, Some(Signal::Hold));
    }

    #[test]
    fn no_bars_skips() {
        let record = cycle(&MockMarketData::new(), &MockBroker::new(0));
        assert!(record.is_skipped());
    }

    #[test]
    fn unordered_bars_skip() {
        let mut bars = bars_from_closes(SYMBOL, &overbought_closes());
        bars.swap(10, 11);
        let market = MockMarketData::new().with_bars(SYMBOL, bars);
        let broker = MockBroker::new(0);
        let record = cycle(&market, &broker);
        assert!(record.is_skipped());
        assert!(broker.submitted().is_empty());
    }

    #[test]
    fn market_clock_failure_skips() {
        let broker = MockBroker::new(10).with_clock_error("clock endpoint down");
        let record = cycle(&overbought(), &broker);
        assert!(record.is_skipped());
        assert!(broker.submitted().is_empty());
    }

    #[test]
    fn latest_price_failure_uses_fallback() {
        let market = oversold().with_price_error("no quote");
        let broker = MockBroker::new(0);
        let record = cycle(&market, &broker);
        // 10% of 100k at the 50.0 fallback
        assert_eq!(record.target_quantity, Some(200));
        assert_eq!(record.price_source, Some(PriceSource::Fallback));
        assert_eq!(broker.submitted()[0].quantity, 200);
    }
}

mod idempotence {
    use super::*;

    #[test]
    fn repeated_cycle_submits_nothing_new() {
        let market = oversold();
        let broker = MockBroker::new(0);

        let first = cycle(&market, &broker);
        assert_eq!(first.outcome, CycleOutcome::Executed);
        assert_eq!(broker.submitted().len(), 1);

        let second = cycle(&market, &broker);
        assert_eq!(second.outcome, CycleOutcome::NoAction);
        assert_eq!(second.current_quantity, Some(69));
        assert_eq!(broker.submitted().len(), 1);
    }

    #[test]
    fn identical_inputs_give_identical_records() {
        let a = cycle(&overbought(), &MockBroker::new(0).with_market_closed());
        let b = cycle(&overbought(), &MockBroker::new(0).with_market_closed());
        assert_eq!(a, b);
    }

    #[test]
    fn later_bars_after_clock_are_ignored() {
        let mut bars = bars_from_closes(SYMBOL, &overbought_closes());
        let mut future = make_bar(SYMBOL, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), 10_000.0);
        future.timestamp = future.timestamp + chrono::Duration::hours(18);
        bars.push(future);
        let with_future = MockMarketData::new()
            .with_bars(SYMBOL, bars)
            .with_latest_price(157.0);

        let a = cycle(&with_future, &MockBroker::new(0).with_market_closed());
        let b = cycle(&overbought(), &MockBroker::new(0).with_market_closed());
        assert_eq!(a.indicators, b.indicators);
        assert_eq!(a.close_price, Some(157.0));
        assert_eq!(a.signal, Some(Signal::Sell));
    }
}

mod gates {
    use super::*;

    #[test]
    fn market_closed_plans_but_does_not_submit() {
        let broker = MockBroker::new(10).with_market_closed();
        let record = cycle(&overbought(), &broker);

        assert_eq!(record.outcome, CycleOutcome::MarketClosed);
        assert_eq!(record.legs.len(), 2);
        assert!(record.legs.iter().all(|l| !l.was_attempted()));
        assert!(broker.submitted().is_empty());
    }

    #[test]
    fn market_hours_ignored_when_not_required() {
        let config = CycleConfig {
            require_market_open: false,
            ..CycleConfig::default()
        };
        let broker = MockBroker::new(0).with_market_closed();
        let record = cycle_with(&overbought(), &broker, &config, RuleSet::Conservative);
        assert_eq!(record.outcome, CycleOutcome::Executed);
        assert_eq!(broker.submitted().len(), 1);
    }

    #[test]
    fn analyze_only_records_plan() {
        let config = CycleConfig {
            execute: false,
            ..CycleConfig::default()
        };
        let broker = MockBroker::new(10);
        let record = cycle_with(&overbought(), &broker, &config, RuleSet::Conservative);

        assert_eq!(record.outcome, CycleOutcome::AnalyzeOnly);
        assert_eq!(record.legs.len(), 2);
        assert!(broker.submitted().is_empty());
        assert_eq!(
            record.orders_summary(),
            "SELL 10 close [not attempted]; SELL 63 open [not attempted]"
        );
    }

    #[test]
    fn loss_limit_forces_hold() {
        let config = CycleConfig {
            daily_loss_limit_pct: 0.05,
            ..CycleConfig::default()
        };
        let broker = MockBroker::new(10).with_account(Account {
            buying_power: 90_000.0,
            portfolio_value: 90_000.0,
            cash: 90_000.0,
            last_equity: 100_000.0,
        });

        let record = cycle_with(&overbought(), &broker, &config, RuleSet::Conservative);

        assert!(record.loss_limit_hit);
        assert_eq!(record.signal, Some(Signal::Sell));
        assert_eq!(record.outcome, CycleOutcome::NoAction);
        assert_eq!(record.target_quantity, Some(10));
        assert!(broker.submitted().is_empty());
    }

    #[test]
    fn loss_within_limit_trades() {
        let config = CycleConfig {
            daily_loss_limit_pct: 0.05,
            ..CycleConfig::default()
        };
        let broker = MockBroker::new(10).with_account(Account {
            buying_power: 97_000.0,
            portfolio_value: 97_000.0,
            cash: 97_000.0,
            last_equity: 100_000.0,
        });
        let record = cycle_with(&overbought(), &broker, &config, RuleSet::Conservative);
        assert!(!record.loss_limit_hit);
        assert_eq!(record.outcome, CycleOutcome::Executed);
    }
}

mod runner {
    use super::*;
    use dailytrade::domain::error::TraderError;
    use dailytrade::domain::order::{OrderConfirmation, OrderIntent};
    use dailytrade::domain::position::Position;
    use dailytrade::domain::runner::StopHandle;
    use dailytrade::ports::broker_port::BrokerPort;

    /// Requests a stop as soon as the first order goes out.
    struct StopOnSubmit {
        inner: MockBroker,
        stop: StopHandle,
    }

    impl BrokerPort for StopOnSubmit {
        fn fetch_account(&self) -> Result<Account, TraderError> {
            self.inner.fetch_account()
        }

        fn fetch_position(&self, symbol: &str) -> Result<Position, TraderError> {
            self.inner.fetch_position(symbol)
        }

        fn submit_order(&self, intent: &OrderIntent) -> Result<OrderConfirmation, TraderError> {
            self.stop.request_stop();
            self.inner.submit_order(intent)
        }

        fn is_market_open(&self) -> Result<bool, TraderError> {
            self.inner.is_market_open()
        }
    }

    #[test]
    fn stop_during_cycle_lets_it_finish() {
        let clock = default_clock();
        let market = overbought();
        let runner = CycleRunner::new();
        let broker = StopOnSubmit {
            inner: MockBroker::new(10),
            stop: runner.stop_handle(),
        };
        let config = CycleConfig::default();
        let ctx = CycleContext {
            market_data: &market,
            broker: &broker,
            clock: &clock,
            config: &config,
        };

        let record = runner
            .run_cycle(&ctx, SYMBOL, RuleSet::Conservative, &policy())
            .unwrap();

        assert!(runner.stop_requested());
        assert_eq!(record.outcome, CycleOutcome::Executed);
        assert_eq!(broker.inner.submitted().len(), 2);
        assert_eq!(broker.inner.quantity.get(), -63);
        assert!(!runner.is_in_flight());
    }

    #[test]
    fn trigger_while_in_flight_is_dropped() {
        let clock = default_clock();
        let market = overbought();
        let broker = MockBroker::new(10);
        let config = CycleConfig::default();
        let ctx = CycleContext {
            market_data: &market,
            broker: &broker,
            clock: &clock,
            config: &config,
        };
        let runner = CycleRunner::new();

        let guard = runner.try_begin();
        assert!(runner
            .run_cycle(&ctx, SYMBOL, RuleSet::Conservative, &policy())
            .is_none());
        assert_eq!(market.bar_calls.get(), 0);
        assert!(broker.submitted().is_empty());

        drop(guard);
        let record = runner
            .run_cycle(&ctx, SYMBOL, RuleSet::Conservative, &policy())
            .unwrap();
        assert_eq!(record.outcome, CycleOutcome::Executed);
        assert!(!runner.is_in_flight());
    }
}
