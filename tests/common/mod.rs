#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use dailytrade::domain::account::Account;
use dailytrade::domain::error::TraderError;
pub use dailytrade::domain::ohlcv::OhlcvBar;
use dailytrade::domain::order::{OrderConfirmation, OrderIntent, OrderSide, OrderStatus};
use dailytrade::domain::position::Position;
use dailytrade::ports::broker_port::BrokerPort;
use dailytrade::ports::clock_port::Clock;
use dailytrade::ports::market_data_port::MarketDataPort;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

pub struct MockMarketData {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub bar_error: Option<String>,
    pub price_error: Option<String>,
    pub latest_price: Option<f64>,
    pub bar_calls: Cell<usize>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            bar_error: None,
            price_error: None,
            latest_price: None,
            bar_calls: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_bar_error(mut self, reason: &str) -> Self {
        self.bar_error = Some(reason.to_string());
        self
    }

    pub fn with_price_error(mut self, reason: &str) -> Self {
        self.price_error = Some(reason.to_string());
        self
    }

    pub fn with_latest_price(mut self, price: f64) -> Self {
        self.latest_price = Some(price);
        self
    }
}

impl MarketDataPort for MockMarketData {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        _interval: &str,
    ) -> Result<Vec<OhlcvBar>, TraderError> {
        self.bar_calls.set(self.bar_calls.get() + 1);
        if let Some(reason) = &self.bar_error {
            return Err(TraderError::data_unavailable(reason.clone()));
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| {
                        let d = b.timestamp.date();
                        d >= start_date && d <= end_date
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_latest_price(&self, symbol: &str) -> Result<Option<f64>, TraderError> {
        if let Some(reason) = &self.price_error {
            return Err(TraderError::data_unavailable(reason.clone()));
        }
        if self.latest_price.is_some() {
            return Ok(self.latest_price);
        }
        Ok(self
            .data
            .get(symbol)
            .and_then(|bars| bars.last())
            .map(|b| b.close))
    }
}

/// Broker double. Filled orders move the held quantity, so a second cycle
/// sees the result of the first.
pub struct MockBroker {
    pub account: Account,
    pub quantity: Cell<i64>,
    pub account_error: Option<String>,
    pub position_error: Option<String>,
    pub clock_error: Option<String>,
    pub market_open: bool,
    /// Zero-based submission indices to reject.
    pub reject_at: Vec<usize>,
    pub status: OrderStatus,
    pub submitted: RefCell<Vec<OrderIntent>>,
}

impl MockBroker {
    pub fn new(quantity: i64) -> Self {
        Self {
            account: Account {
                buying_power: 100_000.0,
                portfolio_value: 100_000.0,
                cash: 100_000.0,
                last_equity: 100_000.0,
            },
            quantity: Cell::new(quantity),
            account_error: None,
            position_error: None,
            clock_error: None,
            market_open: true,
            reject_at: Vec::new(),
            status: OrderStatus::Filled,
            submitted: RefCell::new(Vec::new()),
        }
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.account = account;
        self
    }

    pub fn with_position_error(mut self, reason: &str) -> Self {
        self.position_error = Some(reason.to_string());
        self
    }

    pub fn with_account_error(mut self, reason: &str) -> Self {
        self.account_error = Some(reason.to_string());
        self
    }

    pub fn with_clock_error(mut self, reason: &str) -> Self {
        self.clock_error = Some(reason.to_string());
        self
    }

    pub fn with_market_closed(mut self) -> Self {
        self.market_open = false;
        self
    }

    pub fn rejecting(mut self, indices: &[usize]) -> Self {
        self.reject_at = indices.to_vec();
        self
    }

    pub fn submitted(&self) -> Vec<OrderIntent> {
        self.submitted.borrow().clone()
    }
}

impl BrokerPort for MockBroker {
    fn fetch_account(&self) -> Result<Account, TraderError> {
        match &self.account_error {
            Some(reason) => Err(TraderError::data_unavailable(reason.clone())),
            None => Ok(self.account),
        }
    }

    fn fetch_position(&self, symbol: &str) -> Result<Position, TraderError> {
        if let Some(reason) = &self.position_error {
            return Err(TraderError::data_unavailable(reason.clone()));
        }
        Ok(Position {
            symbol: symbol.to_string(),
            quantity: self.quantity.get(),
        })
    }

    fn submit_order(&self, intent: &OrderIntent) -> Result<OrderConfirmation, TraderError> {
        let index = self.submitted.borrow().len();
        self.submitted.borrow_mut().push(intent.clone());
        if self.reject_at.contains(&index) {
            return Err(TraderError::order_rejected("insufficient buying power"));
        }
        if self.status == OrderStatus::Filled {
            let delta = i64::try_from(intent.quantity).unwrap();
            let q = self.quantity.get();
            self.quantity.set(match intent.side {
                OrderSide::Buy => q + delta,
                OrderSide::Sell => q - delta,
            });
        }
        Ok(OrderConfirmation {
            order_id: format!("order-{}", index + 1),
            status: self.status,
        })
    }

    fn is_market_open(&self) -> Result<bool, TraderError> {
        match &self.clock_error {
            Some(reason) => Err(TraderError::data_unavailable(reason.clone())),
            None => Ok(self.market_open),
        }
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// 2024-06-01 12:00 UTC.
pub fn default_clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
}

pub fn make_bar(symbol: &str, date: NaiveDate, close: f64) -> OhlcvBar {
    OhlcvBar {
        symbol: symbol.to_string(),
        timestamp: date.and_hms_opt(0, 0, 0).unwrap(),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1_000,
    }
}

/// Daily bars starting 2024-03-01.
pub fn bars_from_closes(symbol: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(symbol, start + Duration::days(i as i64), c))
        .collect()
}

/// 60-bar +1 ramp from 100 then a 2 point drop. RSI ~86.7, MACD just below
/// its signal line: SELL under both rule sets.
pub fn overbought_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
    closes.push(157.0);
    closes
}

/// Mirror of `overbought_closes`: RSI ~13.3, MACD just above its signal.
pub fn oversold_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
    closes.push(143.0);
    closes
}

/// Constant price: RSI 50, MACD 0 = signal. HOLD.
pub fn flat_closes(n: usize) -> Vec<f64> {
    vec![100.0; n]
}
