//! The per-cycle decision record.

use std::fmt;

use chrono::{DateTime, Utc};

use super::account::Account;
use super::indicator::IndicatorSet;
use super::order::OrderIntent;
use super::reconcile::{LegKind, LegOutcome};
use super::signal::Signal;
use super::sizing::PriceSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Already positioned, or HOLD.
    NoAction,
    /// Every planned leg was accepted by the broker.
    Executed,
    /// Data was unavailable; nothing was planned or submitted.
    Skipped { reason: String },
    /// The close leg failed; the open leg was not attempted.
    CloseRejected,
    /// The close leg was accepted but not filled; the open leg waits for a
    /// later cycle.
    ClosePending,
    /// The close leg (if any) went through but the open leg failed.
    OpenRejected,
    /// Legs were planned but the market was closed.
    MarketClosed,
    /// Legs were planned but execution is disabled.
    AnalyzeOnly,
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::NoAction => "no_action",
            CycleOutcome::Executed => "executed",
            CycleOutcome::Skipped { .. } => "skipped",
            CycleOutcome::CloseRejected => "close_rejected",
            CycleOutcome::ClosePending => "close_pending",
            CycleOutcome::OpenRejected => "open_rejected",
            CycleOutcome::MarketClosed => "market_closed",
            CycleOutcome::AnalyzeOnly => "analyze_only",
        }
    }

    /// Outcome of a cycle that submitted `legs`.
    pub fn from_legs(legs: &[LegOutcome]) -> Self {
        if legs
            .iter()
            .any(|l| l.leg.kind == LegKind::Close && l.is_pending())
        {
            return CycleOutcome::ClosePending;
        }
        match legs.iter().find(|l| l.is_rejected()).map(|l| l.leg.kind) {
            Some(LegKind::Close) => CycleOutcome::CloseRejected,
            Some(LegKind::Open) => CycleOutcome::OpenRejected,
            None if legs.is_empty() => CycleOutcome::NoAction,
            None => CycleOutcome::Executed,
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Skipped { reason } => write!(f, "skipped ({})", reason),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Everything one cycle saw and did. Built once, then only read.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    /// Signal produced by the rule set, before any risk override.
    pub signal: Option<Signal>,
    pub ambiguous_signal: bool,
    /// The daily loss limit forced the signal to HOLD.
    pub loss_limit_hit: bool,
    pub close_price: Option<f64>,
    pub indicators: Option<IndicatorSet>,
    pub current_quantity: Option<i64>,
    pub target_quantity: Option<i64>,
    /// Which price the target was sized from.
    pub price_source: Option<PriceSource>,
    pub legs: Vec<LegOutcome>,
    pub account: Option<Account>,
    pub outcome: CycleOutcome,
}

impl DecisionRecord {
    pub fn new(timestamp: DateTime<Utc>, symbol: &str) -> Self {
        DecisionRecord {
            timestamp,
            symbol: symbol.to_string(),
            signal: None,
            ambiguous_signal: false,
            loss_limit_hit: false,
            close_price: None,
            indicators: None,
            current_quantity: None,
            target_quantity: None,
            price_source: None,
            legs: Vec::new(),
            account: None,
            outcome: CycleOutcome::NoAction,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Skipped { .. })
    }

    /// Intents actually handed to the broker this cycle.
    pub fn submitted_intents(&self) -> impl Iterator<Item = &OrderIntent> {
        self.legs
            .iter()
            .filter(|l| l.was_attempted())
            .map(|l| &l.leg.intent)
    }

    /// One-line summary of the legs, `;`-separated; empty when none.
    pub fn orders_summary(&self) -> String {
        self.legs
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}
