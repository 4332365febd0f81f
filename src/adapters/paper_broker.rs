//! In-memory simulated broker.
//!
//! Market orders fill immediately at the current mark price. Buying power is
//! equity not already committed to the open position, and opening orders
//! larger than that are rejected. Single-threaded: state sits in a `RefCell`.

use std::cell::{Cell, RefCell};

use tracing::debug;

use crate::domain::account::Account;
use crate::domain::error::TraderError;
use crate::domain::order::{OrderConfirmation, OrderIntent, OrderSide, OrderStatus};
use crate::domain::position::Position;
use crate::ports::broker_port::BrokerPort;

#[derive(Debug)]
struct PaperState {
    cash: f64,
    quantity: i64,
    mark: Option<f64>,
    last_equity: f64,
    next_order_id: u64,
}

impl PaperState {
    fn equity(&self) -> Option<f64> {
        match (self.quantity, self.mark) {
            (0, _) => Some(self.cash),
            (q, Some(p)) => Some(self.cash + q as f64 * p),
            (_, None) => None,
        }
    }
}

#[derive(Debug)]
pub struct PaperBroker {
    symbol: String,
    market_open: Cell<bool>,
    state: RefCell<PaperState>,
}

impl PaperBroker {
    pub fn new(symbol: &str, initial_cash: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            market_open: Cell::new(true),
            state: RefCell::new(PaperState {
                cash: initial_cash,
                quantity: 0,
                mark: None,
                last_equity: 0.0,
                next_order_id: 1,
            }),
        }
    }

    /// Start with an existing holding; `quantity` < 0 is a short.
    pub fn with_position(self, quantity: i64) -> Self {
        self.state.borrow_mut().quantity = quantity;
        self
    }

    pub fn with_market_open(self, open: bool) -> Self {
        self.set_market_open(open);
        self
    }

    pub fn set_market_open(&self, open: bool) {
        self.market_open.set(open);
    }

    pub fn mark_to(&self, price: f64) {
        self.state.borrow_mut().mark = Some(price);
    }

    /// Record the current equity as the previous session close.
    pub fn roll_session(&self) {
        let mut state = self.state.borrow_mut();
        if let Some(equity) = state.equity() {
            state.last_equity = equity;
        }
    }

    pub fn cash(&self) -> f64 {
        self.state.borrow().cash
    }

    pub fn quantity(&self) -> i64 {
        self.state.borrow().quantity
    }
}

fn buying_power(state: &PaperState, equity: f64) -> f64 {
    let committed = state.quantity.unsigned_abs() as f64 * state.mark.unwrap_or(0.0);
    (equity - committed).max(0.0)
}

impl BrokerPort for PaperBroker {
    fn fetch_account(&self) -> Result<Account, TraderError> {
        let state = self.state.borrow();
        let equity = state
            .equity()
            .ok_or_else(|| TraderError::data_unavailable("paper broker has no mark price"))?;
        Ok(Account {
            buying_power: buying_power(&state, equity),
            portfolio_value: equity,
            cash: state.cash,
            last_equity: state.last_equity,
        })
    }

    fn fetch_position(&self, symbol: &str) -> Result<Position, TraderError> {
        if symbol != self.symbol {
            return Ok(Position::flat(symbol));
        }
        Ok(Position {
            symbol: symbol.to_string(),
            quantity: self.state.borrow().quantity,
        })
    }

    fn submit_order(&self, intent: &OrderIntent) -> Result<OrderConfirmation, TraderError> {
        if intent.symbol != self.symbol {
            return Err(TraderError::order_rejected(format!(
                "paper broker only trades {}",
                self.symbol
            )));
        }
        let mut state = self.state.borrow_mut();
        let price = state
            .mark
            .ok_or_else(|| TraderError::order_rejected("no mark price"))?;
        let qty = i64::try_from(intent.quantity)
            .map_err(|_| TraderError::order_rejected("order quantity out of range"))?;
        let delta = match intent.side {
            OrderSide::Buy => qty,
            OrderSide::Sell => -qty,
        };
        let new_quantity = state
            .quantity
            .checked_add(delta)
            .ok_or_else(|| TraderError::order_rejected("resulting position out of range"))?;

        // Orders that only reduce the position are always allowed.
        let reduces = state.quantity != 0
            && state.quantity.signum() != delta.signum()
            && qty <= state.quantity.abs();
        if !reduces {
            let equity = state.equity().unwrap_or(state.cash);
            let available = buying_power(&state, equity);
            let cost = intent.quantity as f64 * price;
            if cost > available {
                return Err(TraderError::order_rejected(format!(
                    "insufficient buying power: need {:.2}, have {:.2}",
                    cost, available
                )));
            }
        }

        state.cash -= delta as f64 * price;
        state.quantity = new_quantity;
        let order_id = format!("paper-{}", state.next_order_id);
        state.next_order_id += 1;
        debug!(%order_id, %intent, price, position = state.quantity, "paper fill");
        Ok(OrderConfirmation {
            order_id,
            status: OrderStatus::Filled,
        })
    }

    fn is_market_open(&self) -> Result<bool, TraderError> {
        Ok(self.market_open.get())
    }
}
