//! SQLite decision log.
//!
//! One `decisions` row per cycle plus one `decision_legs` row per planned leg,
//! written in a single transaction.

use crate::domain::decision::DecisionRecord;
use crate::domain::error::TraderError;
use crate::domain::reconcile::LegStatus;
use crate::ports::decision_log_port::DecisionLogPort;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

pub struct SqliteDecisionLog {
    pool: Pool<SqliteConnectionManager>,
}

/// A decision row as read back from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDecision {
    pub timestamp: String,
    pub symbol: String,
    pub signal: Option<String>,
    pub outcome: String,
    pub target_quantity: Option<i64>,
    pub price_source: Option<String>,
    pub legs: Vec<String>,
}

impl SqliteDecisionLog {
    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(TraderError::storage)?;
        let log = Self { pool };
        log.initialize_schema()?;
        Ok(log)
    }

    pub fn in_memory() -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(TraderError::storage)?;
        let log = Self { pool };
        log.initialize_schema()?;
        Ok(log)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TraderError> {
        self.pool.get().map_err(TraderError::storage)
    }

    pub fn initialize_schema(&self) -> Result<(), TraderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS decisions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp TEXT NOT NULL,
                    symbol TEXT NOT NULL,
                    signal TEXT,
                    ambiguous_signal INTEGER NOT NULL,
                    loss_limit_hit INTEGER NOT NULL,
                    close REAL,
                    rsi REAL,
                    macd REAL,
                    macd_signal REAL,
                    macd_histogram REAL,
                    current_quantity INTEGER,
                    target_quantity INTEGER,
                    buying_power REAL,
                    portfolio_value REAL,
                    cash REAL,
                    price_source TEXT,
                    outcome TEXT NOT NULL,
                    reason TEXT
                );
                CREATE TABLE IF NOT EXISTS decision_legs (
                    decision_id INTEGER NOT NULL REFERENCES decisions(id),
                    leg_index INTEGER NOT NULL,
                    kind TEXT NOT NULL,
                    side TEXT NOT NULL,
                    quantity INTEGER NOT NULL,
                    status TEXT NOT NULL,
                    order_id TEXT,
                    reason TEXT,
                    PRIMARY KEY (decision_id, leg_index)
                );
                CREATE INDEX IF NOT EXISTS idx_decisions_symbol ON decisions(symbol, timestamp);",
            )
            .map_err(TraderError::storage)
    }

    /// Most recent decisions for `symbol`, newest first.
    pub fn recent(&self, symbol: &str, limit: usize) -> Result<Vec<StoredDecision>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, timestamp, symbol, signal, outcome, target_quantity, price_source
                 FROM decisions WHERE symbol = ?1
                 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(TraderError::storage)?;
        let rows = stmt
            .query_map(params![symbol, limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    StoredDecision {
                        timestamp: row.get(1)?,
                        symbol: row.get(2)?,
                        signal: row.get(3)?,
                        outcome: row.get(4)?,
                        target_quantity: row.get(5)?,
                        price_source: row.get(6)?,
                        legs: Vec::new(),
                    },
                ))
            })
            .map_err(TraderError::storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(TraderError::storage)?;

        let mut leg_stmt = conn
            .prepare(
                "SELECT side, quantity, kind, status FROM decision_legs
                 WHERE decision_id = ?1 ORDER BY leg_index",
            )
            .map_err(TraderError::storage)?;
        let mut decisions = Vec::with_capacity(rows.len());
        for (id, mut decision) in rows {
            decision.legs = leg_stmt
                .query_map(params![id], |row| {
                    Ok(format!(
                        "{} {} {} [{}]",
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?
                    ))
                })
                .map_err(TraderError::storage)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(TraderError::storage)?;
            decisions.push(decision);
        }
        Ok(decisions)
    }
}

fn leg_status(status: &LegStatus) -> (String, Option<String>, Option<String>) {
    match status {
        LegStatus::Confirmed(c) => (c.status.to_string(), Some(c.order_id.clone()), None),
        LegStatus::Rejected { reason } => ("rejected".to_string(), None, Some(reason.clone())),
        LegStatus::NotAttempted => ("not attempted".to_string(), None, None),
    }
}

impl DecisionLogPort for SqliteDecisionLog {
    fn append(&self, record: &DecisionRecord) -> Result<(), TraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(TraderError::storage)?;

        let ind = record.indicators;
        let account = record.account;
        let reason = match &record.outcome {
            crate::domain::decision::CycleOutcome::Skipped { reason } => Some(reason.clone()),
            _ => None,
        };
        tx.execute(
            "INSERT INTO decisions (timestamp, symbol, signal, ambiguous_signal, loss_limit_hit,
                close, rsi, macd, macd_signal, macd_histogram, current_quantity, target_quantity,
                buying_power, portfolio_value, cash, price_source, outcome, reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                record.symbol,
                record.signal.map(|s| s.to_string()),
                record.ambiguous_signal,
                record.loss_limit_hit,
                record.close_price,
                ind.map(|i| i.rsi),
                ind.map(|i| i.macd),
                ind.map(|i| i.macd_signal),
                ind.map(|i| i.macd_histogram),
                record.current_quantity,
                record.target_quantity,
                account.map(|a| a.buying_power),
                account.map(|a| a.portfolio_value),
                account.map(|a| a.cash),
                record.price_source.map(|p| p.to_string()),
                record.outcome.label(),
                reason,
            ],
        )
        .map_err(TraderError::storage)?;
        let decision_id = tx.last_insert_rowid();

        for (index, leg) in record.legs.iter().enumerate() {
            let (status, order_id, reason) = leg_status(&leg.status);
            let quantity = i64::try_from(leg.leg.intent.quantity).map_err(TraderError::storage)?;
            tx.execute(
                "INSERT INTO decision_legs (decision_id, leg_index, kind, side, quantity, status, order_id, reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    decision_id,
                    index as i64,
                    leg.leg.kind.to_string(),
                    leg.leg.intent.side.to_string(),
                    quantity,
                    status,
                    order_id,
                    reason,
                ],
            )
            .map_err(TraderError::storage)?;
        }

        tx.commit().map_err(TraderError::storage)
    }
}
