//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of the defined part of the MACD line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Defined from bar max(fast, slow) + signal - 1 onwards (34 bars for defaults).

use super::ema::calculate_ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

pub fn warmup_bars(fast: usize, slow: usize, signal_period: usize) -> usize {
    (fast.max(slow) + signal_period).saturating_sub(1)
}

pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Vec<Option<MacdPoint>> {
    let mut out = vec![None; closes.len()];
    if fast == 0 || slow == 0 || signal_period == 0 {
        return out;
    }

    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);

    // Both EMAs stay defined once they start, so the line is one contiguous run.
    let Some(first) = ema_fast
        .iter()
        .zip(&ema_slow)
        .position(|(f, s)| f.is_some() && s.is_some())
    else {
        return out;
    };
    let line: Vec<f64> = ema_fast[first..]
        .iter()
        .zip(&ema_slow[first..])
        .filter_map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let signal = calculate_ema(&line, signal_period);
    for (offset, signal) in signal.into_iter().enumerate() {
        if let Some(signal) = signal {
            let line = line[offset];
            out[first + offset] = Some(MacdPoint {
                line,
                signal,
                histogram: line - signal,
            });
        }
    }

    out
}
