//! Reconciliation of the broker position towards the signal.
//!
//! Planning is pure: given the current position, the signal and a sized share
//! count it returns the legs to submit. Execution submits the legs one at a
//! time, in order. The open leg only runs once its close leg is filled: a
//! rejected or still-pending close stops the plan.
//!
//! | Current | Signal | Legs                                  |
//! |---------|--------|---------------------------------------|
//! | FLAT    | BUY    | open long `sized`                     |
//! | FLAT    | SELL   | open short `sized`                    |
//! | LONG    | SELL   | close long `abs(qty)`, open short     |
//! | SHORT   | BUY    | close short `abs(qty)`, open long     |
//! | any     | other  | none                                  |

use std::fmt;

use tracing::{error, info, warn};

use super::order::{OrderConfirmation, OrderIntent, OrderSide, OrderStatus, TimeInForce};
use super::position::{Position, PositionState};
use super::signal::Signal;
use crate::ports::broker_port::BrokerPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegKind {
    Close,
    Open,
}

impl fmt::Display for LegKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegKind::Close => write!(f, "close"),
            LegKind::Open => write!(f, "open"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLeg {
    pub kind: LegKind,
    pub intent: OrderIntent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegStatus {
    Confirmed(OrderConfirmation),
    Rejected { reason: String },
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegOutcome {
    pub leg: PlannedLeg,
    pub status: LegStatus,
}

impl LegOutcome {
    pub fn was_attempted(&self) -> bool {
        !matches!(self.status, LegStatus::NotAttempted)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.status, LegStatus::Rejected { .. })
    }

    /// Accepted by the broker but not yet filled.
    pub fn is_pending(&self) -> bool {
        matches!(&self.status, LegStatus::Confirmed(c) if c.status == OrderStatus::Pending)
    }
}

impl fmt::Display for LegOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &self.status {
            LegStatus::Confirmed(c) => format!("{} {}", c.status, c.order_id),
            LegStatus::Rejected { reason } => format!("rejected: {}", reason),
            LegStatus::NotAttempted => "not attempted".to_string(),
        };
        write!(
            f,
            "{} {} {} [{}]",
            self.leg.intent.side, self.leg.intent.quantity, self.leg.kind, status
        )
    }
}

fn leg(kind: LegKind, symbol: &str, quantity: u64, side: OrderSide, tif: TimeInForce) -> PlannedLeg {
    PlannedLeg {
        kind,
        intent: OrderIntent {
            symbol: symbol.to_string(),
            quantity,
            side,
            time_in_force: tif,
        },
    }
}

/// Legs needed to move `position` to the state `signal` asks for.
///
/// Empty whenever the current state already matches the desired one, so
/// repeating a cycle with unchanged inputs never duplicates orders.
pub fn plan_legs(
    position: &Position,
    signal: Signal,
    sized_shares: u64,
    time_in_force: TimeInForce,
) -> Vec<PlannedLeg> {
    let current = position.state();
    let desired = current.desired_for(signal);
    if current == desired || sized_shares == 0 {
        return Vec::new();
    }

    let symbol = position.symbol.as_str();
    let mut legs = Vec::with_capacity(2);
    match current {
        PositionState::Long => legs.push(leg(
            LegKind::Close,
            symbol,
            position.abs_quantity(),
            OrderSide::Sell,
            time_in_force,
        )),
        PositionState::Short => legs.push(leg(
            LegKind::Close,
            symbol,
            position.abs_quantity(),
            OrderSide::Buy,
            time_in_force,
        )),
        PositionState::Flat => {}
    }
    let open_side = match desired {
        PositionState::Long => OrderSide::Buy,
        PositionState::Short => OrderSide::Sell,
        PositionState::Flat => return legs,
    };
    legs.push(leg(LegKind::Open, symbol, sized_shares, open_side, time_in_force));
    legs
}

/// Signed quantity the account should hold once `plan_legs` has run.
/// Share counts beyond `i64::MAX` saturate.
pub fn target_quantity(position: &Position, signal: Signal, sized_shares: u64) -> i64 {
    let current = position.state();
    let sized = i64::try_from(sized_shares).unwrap_or(i64::MAX);
    match current.desired_for(signal) {
        desired if desired == current => position.quantity,
        PositionState::Long => sized,
        PositionState::Short => -sized,
        PositionState::Flat => 0,
    }
}

/// Submit legs in order. Each leg is confirmed before the next is sent; after
/// a rejection, or a close leg that is not yet filled, the remaining legs are
/// reported as `NotAttempted`.
pub fn execute_plan(plan: Vec<PlannedLeg>, broker: &dyn BrokerPort) -> Vec<LegOutcome> {
    let mut outcomes = Vec::with_capacity(plan.len());
    let mut halted = false;

    for leg in plan {
        if halted {
            warn!(kind = %leg.kind, order = %leg.intent, "leg skipped; earlier leg not filled");
            outcomes.push(LegOutcome {
                leg,
                status: LegStatus::NotAttempted,
            });
            continue;
        }

        let status = match broker.submit_order(&leg.intent) {
            Ok(conf) if matches!(conf.status, OrderStatus::Rejected | OrderStatus::Cancelled) => {
                LegStatus::Rejected {
                    reason: format!("broker reported order {} {}", conf.order_id, conf.status),
                }
            }
            Ok(conf) => {
                info!(kind = %leg.kind, order = %leg.intent, id = %conf.order_id, status = %conf.status, "leg submitted");
                LegStatus::Confirmed(conf)
            }
            Err(e) => LegStatus::Rejected {
                reason: e.to_string(),
            },
        };

        let outcome = LegOutcome { leg, status };
        if let LegStatus::Rejected { reason } = &outcome.status {
            error!(kind = %outcome.leg.kind, order = %outcome.leg.intent, %reason, "leg rejected");
            halted = true;
        } else if outcome.leg.kind == LegKind::Close && outcome.is_pending() {
            warn!(order = %outcome.leg.intent, "close leg pending; open leg deferred to next cycle");
            halted = true;
        }
        outcomes.push(outcome);
    }

    outcomes
}

/// Report every leg as not attempted, e.g. when execution is disabled.
pub fn hold_plan(plan: Vec<PlannedLeg>) -> Vec<LegOutcome> {
    plan.into_iter()
        .map(|leg| LegOutcome {
            leg,
            status: LegStatus::NotAttempted,
        })
        .collect()
}
