//! CSV file market data adapter.
//!
//! One file per symbol, `<base_path>/<SYMBOL>.csv`, with the columns
//! `timestamp,open,high,low,close,volume`. The timestamp is either a date
//! (`2024-01-15`, read as midnight) or a date and time. Rows are returned in
//! file order; ordering is checked by the cycle, not here.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::market_data_port::MarketDataPort;
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

const SUPPORTED_INTERVAL: &str = "1d";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    fn read_all(&self, symbol: &str) -> Result<Vec<OhlcvBar>, TraderError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| {
            TraderError::data_unavailable(format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| {
                TraderError::data_unavailable(format!("CSV parse error in {}: {}", path.display(), e))
            })?;
            bars.push(parse_bar(symbol, &record).map_err(|reason| {
                TraderError::data_unavailable(format!("{} row {}: {}", path.display(), row + 1, reason))
            })?);
        }
        Ok(bars)
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

fn field<T: FromStr>(record: &StringRecord, index: usize, name: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    record
        .get(index)
        .ok_or_else(|| format!("missing {} column", name))?
        .parse()
        .map_err(|e| format!("invalid {} value: {}", name, e))
}

fn parse_bar(symbol: &str, record: &StringRecord) -> Result<OhlcvBar, String> {
    let raw = record.get(0).ok_or("missing timestamp column")?;
    let timestamp =
        parse_timestamp(raw).ok_or_else(|| format!("invalid timestamp '{}'", raw))?;
    Ok(OhlcvBar {
        symbol: symbol.to_string(),
        timestamp,
        open: field(record, 1, "open")?,
        high: field(record, 2, "high")?,
        low: field(record, 3, "low")?,
        close: field(record, 4, "close")?,
        volume: field(record, 5, "volume")?,
    })
}

impl MarketDataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        interval: &str,
    ) -> Result<Vec<OhlcvBar>, TraderError> {
        if interval != SUPPORTED_INTERVAL {
            return Err(TraderError::data_unavailable(format!(
                "interval '{}' not available from CSV files (only {})",
                interval, SUPPORTED_INTERVAL
            )));
        }
        let mut bars = self.read_all(symbol)?;
        bars.retain(|b| {
            let date = b.timestamp.date();
            date >= start_date && date <= end_date
        });
        Ok(bars)
    }

    fn fetch_latest_price(&self, symbol: &str) -> Result<Option<f64>, TraderError> {
        Ok(self.read_all(symbol)?.last().map(|b| b.close))
    }
}
