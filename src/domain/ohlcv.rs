//! OHLCV bar representation.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// True when every bar is strictly later than the one before it.
pub fn is_strictly_increasing(bars: &[OhlcvBar]) -> bool {
    bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}

/// Bars at or before `as_of`, preserving order.
pub fn bars_as_of(bars: &[OhlcvBar], as_of: NaiveDateTime) -> &[OhlcvBar] {
    let end = bars.partition_point(|b| b.timestamp <= as_of);
    &bars[..end]
}

pub fn closes(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}
