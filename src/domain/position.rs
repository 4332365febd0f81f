//! Broker-side position snapshot.

use std::fmt;

use super::signal::Signal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub symbol: String,
    /// >0 long, <0 short, 0 flat.
    pub quantity: i64,
}

impl Position {
    pub fn flat(symbol: &str) -> Self {
        Position {
            symbol: symbol.to_string(),
            quantity: 0,
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    pub fn abs_quantity(&self) -> u64 {
        self.quantity.unsigned_abs()
    }

    pub fn state(&self) -> PositionState {
        if self.is_long() {
            PositionState::Long
        } else if self.is_short() {
            PositionState::Short
        } else {
            PositionState::Flat
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
    Short,
}

impl PositionState {
    /// BUY wants long, SELL wants short, HOLD keeps whatever we have.
    pub fn desired_for(self, signal: Signal) -> PositionState {
        match signal {
            Signal::Buy => PositionState::Long,
            Signal::Sell => PositionState::Short,
            Signal::Hold => self,
        }
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionState::Flat => write!(f, "FLAT"),
            PositionState::Long => write!(f, "LONG"),
            PositionState::Short => write!(f, "SHORT"),
        }
    }
}
