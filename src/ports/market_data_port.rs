//! Market data port trait.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait MarketDataPort {
    /// Bars for `symbol` between `start_date` and `end_date` inclusive, oldest
    /// first. An empty vector is a valid answer.
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        interval: &str,
    ) -> Result<Vec<OhlcvBar>, TraderError>;

    /// Latest traded price, `None` when no quote is available.
    fn fetch_latest_price(&self, symbol: &str) -> Result<Option<f64>, TraderError>;
}
