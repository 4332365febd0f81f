//! Account snapshot, read once per cycle.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Account {
    pub buying_power: f64,
    pub portfolio_value: f64,
    pub cash: f64,
    /// Equity at the previous session close; 0 when the broker does not report it.
    pub last_equity: f64,
}

impl Account {
    /// True when the portfolio has fallen more than `limit_pct` below the
    /// previous close. A zero limit or unknown `last_equity` disables the check.
    pub fn daily_loss_limit_breached(&self, limit_pct: f64) -> bool {
        if limit_pct <= 0.0 || self.last_equity <= 0.0 {
            return false;
        }
        self.portfolio_value < self.last_equity * (1.0 - limit_pct)
    }
}
