//! Technical indicator engine.
//!
//! Every calculator takes a close-price series and returns one `Option` per
//! input bar: `None` marks the warm-up window where the indicator is
//! undefined. Undefined is a distinct state, never zero.
//!
//! - `IndicatorType`: indicator identity + parameters, used for labelling
//! - `IndicatorParams`: the RSI/MACD parameter block of a trader config
//! - `IndicatorSet`: the combined RSI/MACD reading at a single bar

pub mod ema;
pub mod macd;
pub mod rsi;

pub use ema::calculate_ema;
pub use macd::{calculate_macd, MacdPoint};
pub use rsi::calculate_rsi;

use crate::domain::ohlcv::{closes, OhlcvBar};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            rsi_period: 14,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
        }
    }
}

impl IndicatorParams {
    pub fn rsi_type(&self) -> IndicatorType {
        IndicatorType::Rsi(self.rsi_period)
    }

    pub fn macd_type(&self) -> IndicatorType {
        IndicatorType::Macd {
            fast: self.macd_fast,
            slow: self.macd_slow,
            signal: self.macd_signal,
        }
    }

    /// Number of bars needed before the first `IndicatorSet` is defined.
    pub fn warmup_bars(&self) -> usize {
        rsi::warmup_bars(self.rsi_period).max(macd::warmup_bars(
            self.macd_fast,
            self.macd_slow,
            self.macd_signal,
        ))
    }
}

/// RSI and MACD readings at one bar. Only built when both are defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSet {
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
}

impl IndicatorSet {
    fn combine(rsi: Option<f64>, macd: Option<MacdPoint>) -> Option<Self> {
        let (rsi, macd) = (rsi?, macd?);
        let set = IndicatorSet {
            rsi,
            macd: macd.line,
            macd_signal: macd.signal,
            macd_histogram: macd.histogram,
        };
        set.is_finite().then_some(set)
    }

    fn is_finite(&self) -> bool {
        self.rsi.is_finite()
            && self.macd.is_finite()
            && self.macd_signal.is_finite()
            && self.macd_histogram.is_finite()
    }
}

/// One entry per bar; `None` wherever either indicator is still warming up.
///
/// Entry `i` depends only on `bars[..=i]`.
pub fn compute_indicator_sets(bars: &[OhlcvBar], params: &IndicatorParams) -> Vec<Option<IndicatorSet>> {
    let prices = closes(bars);
    let rsi = calculate_rsi(&prices, params.rsi_period);
    let macd = calculate_macd(
        &prices,
        params.macd_fast,
        params.macd_slow,
        params.macd_signal,
    );

    rsi.into_iter()
        .zip(macd)
        .map(|(r, m)| IndicatorSet::combine(r, m))
        .collect()
}

/// The indicator set at the final bar, if defined there.
pub fn latest_indicator_set(bars: &[OhlcvBar], params: &IndicatorParams) -> Option<IndicatorSet> {
    compute_indicator_sets(bars, params).pop().flatten()
}
