//! Serialises cycles: at most one reconciliation in flight at a time.
//!
//! A trigger that arrives while a cycle is still running is dropped, not
//! queued. Stop requests are only honoured between cycles: a cycle that has
//! started always runs to its record.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use chrono::NaiveDateTime;
use tracing::warn;

use crate::ports::clock_port::Clock;

use super::cycle::{evaluate_cycle, CycleContext};
use super::decision::DecisionRecord;
use super::signal::RuleSet;
use super::sizing::SizingPolicy;

/// Longest single sleep while waiting for the next trigger.
const WAIT_TICK: StdDuration = StdDuration::from_secs(1);

#[derive(Debug, Default)]
pub struct CycleRunner {
    in_flight: AtomicBool,
    stop_requested: Arc<AtomicBool>,
}

/// Cloneable handle that can request a stop from another thread, such as a
/// signal handler.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Held for the duration of a cycle; releases the runner on drop.
#[derive(Debug)]
pub struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl CycleRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the runner, or `None` if a cycle is already in progress.
    pub fn try_begin(&self) -> Option<CycleGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard {
                flag: &self.in_flight,
            })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one cycle unless another is in flight.
    pub fn run_cycle(
        &self,
        ctx: &CycleContext<'_>,
        symbol: &str,
        rule_set: RuleSet,
        sizing_policy: &SizingPolicy,
    ) -> Option<DecisionRecord> {
        let Some(_guard) = self.try_begin() else {
            warn!(%symbol, "previous cycle still in flight; trigger skipped");
            return None;
        };
        Some(evaluate_cycle(ctx, symbol, rule_set, sizing_policy))
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop_requested))
    }

    /// Sleep until `deadline` on `clock`, waking at least once a second to
    /// check for a stop. Returns false if a stop was requested.
    pub fn wait_until(&self, clock: &dyn Clock, deadline: NaiveDateTime) -> bool {
        loop {
            if self.stop_requested() {
                return false;
            }
            let remaining = deadline - clock.now().naive_utc();
            let Ok(remaining) = remaining.to_std() else {
                return true;
            };
            if remaining.is_zero() {
                return true;
            }
            std::thread::sleep(remaining.min(WAIT_TICK));
        }
    }
}
