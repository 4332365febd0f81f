//! Brokerage port trait.
//!
//! Every call may block on I/O. Implementations must not cache position or
//! account data between calls.

use crate::domain::account::Account;
use crate::domain::error::TraderError;
use crate::domain::order::{OrderConfirmation, OrderIntent};
use crate::domain::position::Position;

pub trait BrokerPort {
    fn fetch_account(&self) -> Result<Account, TraderError>;

    /// Current position. A symbol with no holding is `Ok` with quantity 0;
    /// `Err` means the lookup itself failed.
    fn fetch_position(&self, symbol: &str) -> Result<Position, TraderError>;

    /// Submit one market order and wait for the broker's answer.
    fn submit_order(&self, intent: &OrderIntent) -> Result<OrderConfirmation, TraderError>;

    fn is_market_open(&self) -> Result<bool, TraderError>;
}
