//! Append-only CSV decision log.
//!
//! The header is written when the file is new or empty; later appends add one
//! row per cycle. Values that were never computed are left blank.

use std::fs::OpenOptions;
use std::path::PathBuf;

use crate::domain::decision::DecisionRecord;
use crate::domain::error::TraderError;
use crate::ports::decision_log_port::DecisionLogPort;

pub const HEADER: [&str; 15] = [
    "timestamp",
    "signal",
    "close",
    "rsi",
    "macd",
    "macd_signal",
    "orders",
    "symbol",
    "outcome",
    "current_quantity",
    "target_quantity",
    "buying_power",
    "portfolio_value",
    "cash",
    "price_source",
];

pub struct CsvDecisionLog {
    path: PathBuf,
}

impl CsvDecisionLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

fn opt<T>(value: Option<T>, f: impl FnOnce(T) -> String) -> String {
    value.map(f).unwrap_or_default()
}

fn row(record: &DecisionRecord) -> Vec<String> {
    let ind = record.indicators;
    let account = record.account;
    let signal = match (record.signal, record.loss_limit_hit) {
        (Some(s), true) => format!("{} (loss limit)", s),
        (Some(s), false) => s.to_string(),
        (None, _) => String::new(),
    };
    vec![
        record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        signal,
        opt(record.close_price, |v| format!("{:.2}", v)),
        opt(ind, |i| format!("{:.2}", i.rsi)),
        opt(ind, |i| format!("{:.4}", i.macd)),
        opt(ind, |i| format!("{:.4}", i.macd_signal)),
        record.orders_summary(),
        record.symbol.clone(),
        record.outcome.to_string(),
        opt(record.current_quantity, |q| q.to_string()),
        opt(record.target_quantity, |q| q.to_string()),
        opt(account, |a| format!("{:.2}", a.buying_power)),
        opt(account, |a| format!("{:.2}", a.portfolio_value)),
        opt(account, |a| format!("{:.2}", a.cash)),
        opt(record.price_source, |p| p.to_string()),
    ]
}

impl DecisionLogPort for CsvDecisionLog {
    fn append(&self, record: &DecisionRecord) -> Result<(), TraderError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_empty {
            writer.write_record(HEADER)?;
        }
        writer.write_record(row(record))?;
        writer.flush()?;
        Ok(())
    }
}
